//! Gaussian emitter: isotropic noise around random elites.

use crate::compute::{ElitePool, Evaluation};
use crate::schema::Pulse;

use super::{Emitter, EmitterBase, EmitterError, SolutionBounds};

/// Perturbs uniformly sampled elites with `N(0, sigma0)` noise.
///
/// While the archive is empty, every candidate is a perturbation of `x0`.
#[derive(Debug, Clone)]
pub struct GaussianEmitter {
    base: EmitterBase,
    x0: Vec<f64>,
    sigma0: Vec<f64>,
    bounds: SolutionBounds,
}

impl GaussianEmitter {
    /// Create an emitter centered on `x0` with per-dimension `sigma0`.
    pub fn new(base: EmitterBase, x0: Vec<f64>, sigma0: Vec<f64>, bounds: SolutionBounds) -> Self {
        Self {
            base,
            x0,
            sigma0,
            bounds,
        }
    }

    /// Initial center.
    pub fn x0(&self) -> &[f64] {
        &self.x0
    }

    /// Per-dimension standard deviation.
    pub fn sigma0(&self) -> &[f64] {
        &self.sigma0
    }

    fn perturb(&mut self, parent: &[f64]) -> Vec<f64> {
        let noise = self.base.rng.gaussian_vec(&self.sigma0);
        let mut child: Vec<f64> = parent.iter().zip(&noise).map(|(x, n)| x + n).collect();
        self.bounds.clamp(&mut child);
        child
    }
}

impl<M, A> Emitter<Vec<f64>, M, A> for GaussianEmitter
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

    fn ask(&mut self, archive: &A) -> Result<Vec<Vec<f64>>, EmitterError> {
        self.base.check_idle()?;

        let batch: Vec<Vec<f64>> = (0..self.base.batch_size())
            .map(|_| {
                let parent = match archive.sample_random_elite(&mut self.base.rng) {
                    Ok(elite) => elite.solution,
                    Err(_) => self.x0.clone(),
                };
                self.perturb(&parent)
            })
            .collect();

        self.base.mark_asked(batch.len());
        Ok(batch)
    }

    fn tell(
        &mut self,
        archive: &mut A,
        solutions: Vec<Vec<f64>>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Pulse, EmitterError> {
        self.base.tell(archive, solutions, evaluations)
    }

    fn abandon(&mut self) {
        self.base.clear_pending();
    }

    fn last_pulse(&self) -> Option<Pulse> {
        self.base.last_pulse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Archive, MultiArchive};
    use crate::schema::{ArchiveConfig, Bound, BoundsConfig};

    fn emitter(batch: usize) -> GaussianEmitter {
        GaussianEmitter::new(
            EmitterBase::new("gauss", batch, 11),
            vec![0.5, 0.5],
            vec![0.1, 0.1],
            SolutionBounds::from_config(Some(&BoundsConfig::Shared(Bound::new(0.0, 1.0))), 2).unwrap(),
        )
    }

    fn archive() -> Archive<Vec<f64>> {
        Archive::new(ArchiveConfig::grid(vec![10, 10], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap()
    }

    #[test]
    fn test_ask_from_x0_when_empty() {
        let mut e = emitter(200);
        let batch = Emitter::<Vec<f64>, ()>::ask(&mut e, &archive()).unwrap();
        assert_eq!(batch.len(), 200);
        let mean = batch.iter().map(|x| x[0]).sum::<f64>() / batch.len() as f64;
        assert!((mean - 0.5).abs() < 0.05);
        assert!(batch.iter().flatten().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_ask_perturbs_elites() {
        let mut archive = archive();
        archive.insert(vec![0.9, 0.9], 1.0, vec![0.9, 0.9], None);
        let mut e = emitter(100);
        let batch = e.ask(&archive).unwrap();
        let mean = batch.iter().map(|x| x[1]).sum::<f64>() / batch.len() as f64;
        assert!((mean - 0.9).abs() < 0.1);
    }

    #[test]
    fn test_ask_tell_sequence() {
        let mut archive = archive();
        let mut e = emitter(4);

        let batch = e.ask(&archive).unwrap();
        assert!(matches!(e.ask(&archive), Err(EmitterError::AskPending { .. })));

        let evaluations: Vec<Evaluation<()>> =
            batch.iter().map(|x| Evaluation::new(1.0, x.clone())).collect();
        let pulse = e.tell(&mut archive, batch, evaluations).unwrap();
        assert_eq!(pulse.total(), 4);
        assert_eq!(Emitter::<Vec<f64>, ()>::last_pulse(&e), Some(pulse));

        assert!(matches!(
            e.tell(&mut archive, Vec::new(), Vec::new()),
            Err(EmitterError::NoPendingAsk { .. })
        ));
    }

    #[test]
    fn test_samples_from_multi_archive() {
        let mut archives: MultiArchive<Vec<f64>> = MultiArchive::new(vec![
            ArchiveConfig::grid(vec![2, 2], vec![(0.0, 1.0), (0.0, 1.0)]),
            ArchiveConfig::grid(vec![10, 10], vec![(0.0, 1.0), (0.0, 1.0)]),
        ])
        .unwrap();
        let mut e = emitter(50);

        // Empty containers fall back to x0.
        let batch = e.ask(&archives).unwrap();
        let evaluations: Vec<Evaluation<()>> =
            batch.iter().map(|x| Evaluation::new(1.0, x.clone())).collect();
        let pulse = e.tell(&mut archives, batch, evaluations).unwrap();
        assert_eq!(pulse.total(), 50);
        assert!(pulse.new >= 1);
        // Fine cells nest inside coarse ones.
        let counts = archives.num_elites();
        assert!(counts[0] >= 1);
        assert!(counts[1] >= counts[0]);

        let batch = e.ask(&archives).unwrap();
        assert_eq!(batch.len(), 50);
    }
}
