//! Improvement emitter: a CMA-ES search distribution ranked by archive gains.
//!
//! Candidates are ranked by `(status, value)` after insertion, so new cells
//! rank ahead of improvements, which rank ahead of rejected candidates. The
//! ranked batch updates a [`SepCmaEs`]; the distribution restarts from a random
//! elite when it stagnates or stops producing archive gains.

use std::cmp::Ordering;

use log::debug;

use crate::compute::{AddStatus, ElitePool, Evaluation};
use crate::schema::{Pulse, RestartRule, SelectionRule, StopCriteria, WeightRule};

use super::{Emitter, EmitterBase, EmitterError, SepCmaEs, SolutionBounds};

/// Selection, weighting, restart and stagnation settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImprovementOptions {
    /// How many ranked candidates become parents.
    pub selection: SelectionRule,
    /// Recombination weights.
    pub weights: WeightRule,
    /// When to restart from a random elite.
    pub restart: RestartRule,
    /// Stagnation thresholds of the search distribution.
    pub stop: StopCriteria,
}

/// Emitter that climbs toward archive improvement with CMA-ES.
#[derive(Debug, Clone)]
pub struct ImprovementEmitter {
    base: EmitterBase,
    x0: Vec<f64>,
    options: ImprovementOptions,
    bounds: SolutionBounds,
    opt: SepCmaEs,
    no_improvement: usize,
    restarts: usize,
}

impl ImprovementEmitter {
    /// Create an emitter whose distribution starts at `x0`.
    pub fn new(
        base: EmitterBase,
        x0: Vec<f64>,
        sigma0: f64,
        options: ImprovementOptions,
        bounds: SolutionBounds,
    ) -> Self {
        let opt = SepCmaEs::new(sigma0, options.weights, x0.clone());
        Self {
            base,
            x0,
            options,
            bounds,
            opt,
            no_improvement: 0,
            restarts: 0,
        }
    }

    /// The search distribution.
    pub fn optimizer(&self) -> &SepCmaEs {
        &self.opt
    }

    /// Consecutive tells without an added or improved cell.
    pub fn no_improvement_count(&self) -> usize {
        self.no_improvement
    }

    /// Parent count for a batch with `successes` gains.
    fn num_parents(&self, successes: usize) -> usize {
        let batch = self.base.batch_size();
        match self.options.selection {
            SelectionRule::Filter => successes,
            SelectionRule::Mu { num_parents } => num_parents.unwrap_or(batch / 2).clamp(1, batch),
        }
    }

    fn restart<M, A: ElitePool<Vec<f64>, M>>(&mut self, archive: &A) {
        let x0 = match archive.sample_random_elite(&mut self.base.rng) {
            Ok(elite) => elite.solution,
            Err(_) => self.x0.clone(),
        };
        self.opt.reset(x0);
        self.no_improvement = 0;
        self.restarts += 1;
        debug!(
            "Emitter '{}' restarted ({} restarts)",
            self.base.name(),
            self.restarts
        );
    }
}

/// Best-first order over `(status, value, batch index)`; equal keys keep batch order.
fn rank(a: &(AddStatus, f64, usize), b: &(AddStatus, f64, usize)) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| b.1.total_cmp(&a.1))
        .then_with(|| a.2.cmp(&b.2))
}

impl<M, A> Emitter<Vec<f64>, M, A> for ImprovementEmitter
where
    M: Clone + Send + 'static,
    A: ElitePool<Vec<f64>, M>,
{
    fn name(&self) -> &str {
        self.base.name()
    }

    fn batch_size(&self) -> usize {
        self.base.batch_size()
    }

    fn ask(&mut self, _archive: &A) -> Result<Vec<Vec<f64>>, EmitterError> {
        self.base.check_idle()?;
        let batch = self
            .opt
            .ask(self.base.batch_size(), &self.bounds, &mut self.base.rng);
        self.base.mark_asked(batch.len());
        Ok(batch)
    }

    fn tell(
        &mut self,
        archive: &mut A,
        solutions: Vec<Vec<f64>>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Pulse, EmitterError> {
        self.base.accept_tell(solutions.len(), evaluations.len())?;

        let (pulse, outcomes) = self
            .base
            .insert_batch(&mut *archive, solutions.clone(), evaluations);

        let mut ranking: Vec<(AddStatus, f64, usize)> = outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| (o.status, o.value, i))
            .collect();
        ranking.sort_by(rank);

        let ranked: Vec<Vec<f64>> = ranking.iter().map(|r| solutions[r.2].clone()).collect();
        let values: Vec<f64> = ranking.iter().map(|r| r.1).collect();

        let successes = pulse.successes();
        self.opt.tell(&ranked, self.num_parents(successes));

        if successes == 0 {
            self.no_improvement += 1;
        } else {
            self.no_improvement = 0;
        }

        let stagnated = self.opt.check_stop(&values, &self.options.stop);
        let exhausted = match self.options.restart {
            RestartRule::NoImprovement { patience } => self.no_improvement >= patience,
            RestartRule::Basic => false,
        };
        if stagnated || exhausted {
            self.restart::<M, A>(archive);
        }

        Ok(pulse)
    }

    fn abandon(&mut self) {
        self.base.clear_pending();
    }

    fn last_pulse(&self) -> Option<Pulse> {
        self.base.last_pulse()
    }

    fn restarts(&self) -> usize {
        self.restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Archive;
    use crate::schema::ArchiveConfig;

    fn emitter(restart: RestartRule, batch: usize) -> ImprovementEmitter {
        emitter_with(
            ImprovementOptions {
                restart,
                ..ImprovementOptions::default()
            },
            batch,
        )
    }

    fn emitter_with(options: ImprovementOptions, batch: usize) -> ImprovementEmitter {
        ImprovementEmitter::new(
            EmitterBase::new("imp", batch, 17),
            vec![0.0, 0.0],
            0.5,
            options,
            SolutionBounds::unbounded(2),
        )
    }

    /// One cell holding an elite no candidate can beat.
    fn saturated_archive() -> Archive<Vec<f64>> {
        let mut archive = Archive::new(ArchiveConfig::grid(vec![1], vec![(0.0, 1.0)])).unwrap();
        archive.insert(vec![5.0, 5.0], 100.0, vec![0.5], None);
        archive
    }

    fn sphere_evaluations(batch: &[Vec<f64>]) -> Vec<Evaluation<()>> {
        batch
            .iter()
            .map(|x| Evaluation::new(-x.iter().map(|v| v * v).sum::<f64>(), vec![0.5]))
            .collect()
    }

    #[test]
    fn test_rank_order() {
        let mut keys = vec![
            (AddStatus::NotAdded, -0.1, 0),
            (AddStatus::New, 0.3, 1),
            (AddStatus::ImproveExisting, 5.0, 2),
            (AddStatus::New, 0.3, 3),
            (AddStatus::New, 0.9, 4),
        ];
        keys.sort_by(rank);
        let order: Vec<usize> = keys.iter().map(|k| k.2).collect();
        assert_eq!(order, vec![4, 1, 3, 2, 0]);
    }

    #[test]
    fn test_restart_after_patience() {
        // One cell holding an elite no candidate can beat.
        let mut archive: Archive<Vec<f64>> =
            Archive::new(ArchiveConfig::grid(vec![1], vec![(0.0, 1.0)])).unwrap();
        archive.insert(vec![5.0, 5.0], 100.0, vec![0.5], None);

        let patience = 3;
        let mut e = emitter(RestartRule::NoImprovement { patience }, 4);

        for call in 1..=patience {
            let batch = e.ask(&archive).unwrap();
            let evaluations = sphere_evaluations(&batch);
            let pulse = e.tell(&mut archive, batch, evaluations).unwrap();
            assert_eq!(pulse.successes(), 0);

            if call < patience {
                assert_eq!(e.no_improvement_count(), call);
                assert_eq!(Emitter::<Vec<f64>, ()>::restarts(&e), 0);
                // Filter selection with no gains leaves the mean untouched.
                assert_eq!(e.optimizer().mean(), &[0.0, 0.0]);
            }
        }

        assert_eq!(e.no_improvement_count(), 0);
        assert_eq!(Emitter::<Vec<f64>, ()>::restarts(&e), 1);
        assert_eq!(e.optimizer().mean(), &[5.0, 5.0]);
    }

    #[test]
    fn test_basic_rule_ignores_patience() {
        let mut archive: Archive<Vec<f64>> =
            Archive::new(ArchiveConfig::grid(vec![1], vec![(0.0, 1.0)])).unwrap();
        archive.insert(vec![5.0, 5.0], 100.0, vec![0.5], None);
        let mut e = emitter(RestartRule::Basic, 4);

        for _ in 0..5 {
            let batch = e.ask(&archive).unwrap();
            let evaluations = sphere_evaluations(&batch);
            e.tell(&mut archive, batch, evaluations).unwrap();
        }
        assert_eq!(e.no_improvement_count(), 5);
        assert_eq!(Emitter::<Vec<f64>, ()>::restarts(&e), 0);
    }

    #[test]
    fn test_gains_move_mean() {
        let mut archive: Archive<Vec<f64>> =
            Archive::new(ArchiveConfig::grid(vec![20], vec![(-3.0, 3.0)])).unwrap();
        let mut e = emitter(RestartRule::default(), 8);

        let batch = e.ask(&archive).unwrap();
        let evaluations: Vec<Evaluation<()>> = batch
            .iter()
            .map(|x| Evaluation::new(-x[0].abs(), vec![x[0]]))
            .collect();
        let pulse = e.tell(&mut archive, batch, evaluations).unwrap();

        assert!(pulse.new > 0);
        assert_eq!(e.no_improvement_count(), 0);
        assert_ne!(e.optimizer().mean(), &[0.0, 0.0]);
        assert_eq!(e.optimizer().generation(), 1);
    }

    #[test]
    fn test_mu_parent_count() {
        let mu = |num_parents| {
            emitter_with(
                ImprovementOptions {
                    selection: SelectionRule::Mu { num_parents },
                    ..ImprovementOptions::default()
                },
                8,
            )
        };
        assert_eq!(mu(None).num_parents(0), 4);
        assert_eq!(mu(None).num_parents(7), 4);
        assert_eq!(mu(Some(3)).num_parents(0), 3);
        assert_eq!(mu(Some(100)).num_parents(0), 8);
        assert_eq!(mu(Some(0)).num_parents(0), 1);
        assert_eq!(emitter(RestartRule::Basic, 8).num_parents(2), 2);
    }

    #[test]
    fn test_mu_selection_moves_mean_without_gains() {
        let mut archive = saturated_archive();
        let mut e = emitter_with(
            ImprovementOptions {
                selection: SelectionRule::Mu { num_parents: None },
                restart: RestartRule::Basic,
                ..ImprovementOptions::default()
            },
            8,
        );

        let batch = e.ask(&archive).unwrap();
        let evaluations = sphere_evaluations(&batch);
        let pulse = e.tell(&mut archive, batch, evaluations).unwrap();

        assert_eq!(pulse.successes(), 0);
        assert_eq!(Emitter::<Vec<f64>, ()>::restarts(&e), 0);
        assert_ne!(e.optimizer().mean(), &[0.0, 0.0]);
        assert_eq!(e.optimizer().generation(), 1);
    }

    #[test]
    fn test_active_weights_shape_covariance() {
        let options = |weights| ImprovementOptions {
            selection: SelectionRule::Mu { num_parents: None },
            weights,
            restart: RestartRule::Basic,
            ..ImprovementOptions::default()
        };
        let mut active = emitter_with(options(WeightRule::Active), 8);
        let mut truncation = emitter_with(options(WeightRule::Truncation), 8);
        let mut active_archive = saturated_archive();
        let mut truncation_archive = saturated_archive();

        let batch = active.ask(&active_archive).unwrap();
        assert_eq!(batch, truncation.ask(&truncation_archive).unwrap());
        let evaluations = sphere_evaluations(&batch);
        active
            .tell(&mut active_archive, batch.clone(), evaluations.clone())
            .unwrap();
        truncation
            .tell(&mut truncation_archive, batch, evaluations)
            .unwrap();

        // Negative weights only enter the covariance update.
        assert_eq!(active.optimizer().mean(), truncation.optimizer().mean());
        assert_ne!(active.optimizer().covariance(), truncation.optimizer().covariance());
        assert!(
            active
                .optimizer()
                .covariance()
                .iter()
                .all(|c| c.is_finite() && *c > 0.0)
        );
    }
}
