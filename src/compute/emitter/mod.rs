//! Emitters: ask/tell candidate generators that feed the archive.
//!
//! Every emitter follows the same state machine. `ask` proposes a batch and
//! leaves the emitter awaiting results; `tell` inserts the evaluated batch into
//! the archive, records a [`Pulse`] and returns the emitter to idle. Asking
//! twice, or telling without a pending ask, is rejected.

mod cma;
mod gaussian;
mod improvement;
mod iso_line;
mod object;

pub use cma::*;
pub use gaussian::*;
pub use improvement::*;
pub use iso_line::*;
pub use object::*;

use crate::schema::{Bound, BoundsConfig, ConfigError, EmitterConfig, EmitterKind, Pulse};

use super::{AddOutcome, Archive, ElitePool, Evaluation, Mutate, QdRng, Solution};

/// Emitter errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmitterError {
    #[error("Emitter '{emitter}' was asked again before its batch was told")]
    AskPending { emitter: String },
    #[error("Emitter '{emitter}' was told results without a pending ask")]
    NoPendingAsk { emitter: String },
    #[error("Emitter '{emitter}' expected {expected} results, got {got}")]
    BatchMismatch {
        emitter: String,
        expected: usize,
        got: usize,
    },
    #[error("Emitter '{emitter}' cannot sample parents from an empty archive")]
    EmptyArchive { emitter: String },
}

/// Candidate generator driven by archive feedback.
///
/// `A` is the elite container parents are drawn from and results go into: a
/// single [`Archive`] unless the emitter drives a
/// [`MultiArchive`](crate::compute::MultiArchive).
pub trait Emitter<S: Solution, M, A = Archive<S, M>>: Send {
    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Candidates produced per `ask`.
    fn batch_size(&self) -> usize;

    /// Propose a batch of candidates.
    fn ask(&mut self, archive: &A) -> Result<Vec<S>, EmitterError>;

    /// Insert the evaluated batch from the last `ask`, in batch order.
    fn tell(
        &mut self,
        archive: &mut A,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Pulse, EmitterError>;

    /// Drop the pending batch without telling it.
    fn abandon(&mut self);

    /// Outcome counts of the most recent `tell`.
    fn last_pulse(&self) -> Option<Pulse>;

    /// Number of times the emitter restarted its search.
    fn restarts(&self) -> usize {
        0
    }
}

/// State shared by all emitters: identity, random source and ask/tell bookkeeping.
#[derive(Debug, Clone)]
pub struct EmitterBase {
    name: String,
    batch_size: usize,
    /// Random source owned by this emitter.
    pub rng: QdRng,
    pending: Option<usize>,
    last_pulse: Option<Pulse>,
}

impl EmitterBase {
    /// Create an idle emitter base.
    pub fn new(name: impl Into<String>, batch_size: usize, seed: u64) -> Self {
        Self {
            name: name.into(),
            batch_size,
            rng: QdRng::new(seed),
            pending: None,
            last_pulse: None,
        }
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidates per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pulse of the most recent insert.
    pub fn last_pulse(&self) -> Option<Pulse> {
        self.last_pulse
    }

    /// Whether an ask is awaiting its tell.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Fail if a batch is already out.
    pub fn check_idle(&self) -> Result<(), EmitterError> {
        match self.pending {
            Some(_) => Err(EmitterError::AskPending {
                emitter: self.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Record that `len` candidates were handed out.
    pub fn mark_asked(&mut self, len: usize) {
        self.pending = Some(len);
    }

    /// Forget the pending batch.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Check a told batch against the pending ask and return to idle.
    pub fn accept_tell(&mut self, solutions: usize, evaluations: usize) -> Result<(), EmitterError> {
        let expected = self.pending.ok_or_else(|| EmitterError::NoPendingAsk {
            emitter: self.name.clone(),
        })?;
        for got in [solutions, evaluations] {
            if got != expected {
                return Err(EmitterError::BatchMismatch {
                    emitter: self.name.clone(),
                    expected,
                    got,
                });
            }
        }
        self.pending = None;
        Ok(())
    }

    /// Insert a batch in order, record its pulse and return per-candidate outcomes.
    pub fn insert_batch<S, M, A: ElitePool<S, M>>(
        &mut self,
        archive: &mut A,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> (Pulse, Vec<AddOutcome>) {
        let mut pulse = Pulse::default();
        let outcomes: Vec<AddOutcome> = solutions
            .into_iter()
            .zip(evaluations)
            .map(|(solution, evaluation)| {
                let outcome = archive.insert_evaluated(solution, evaluation);
                pulse.record(outcome.status);
                outcome
            })
            .collect();
        self.last_pulse = Some(pulse);
        (pulse, outcomes)
    }

    /// The `tell` of emitters without internal state to update.
    pub fn tell<S, M, A: ElitePool<S, M>>(
        &mut self,
        archive: &mut A,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Pulse, EmitterError> {
        self.accept_tell(solutions.len(), evaluations.len())?;
        Ok(self.insert_batch(archive, solutions, evaluations).0)
    }
}

/// Per-dimension clamps for vector solutions.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionBounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SolutionBounds {
    /// No clamping in any of `dim` dimensions.
    pub fn unbounded(dim: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; dim],
            upper: vec![f64::INFINITY; dim],
        }
    }

    /// Resolve configured bounds for `dim` dimensions.
    pub fn from_config(config: Option<&BoundsConfig>, dim: usize) -> Result<Self, ConfigError> {
        let Some(config) = config else {
            return Ok(Self::unbounded(dim));
        };
        config.validate()?;
        let bounds: Vec<Bound> = config.resolve(dim)?;
        Ok(Self {
            lower: bounds
                .iter()
                .map(|b| b.lower.unwrap_or(f64::NEG_INFINITY))
                .collect(),
            upper: bounds
                .iter()
                .map(|b| b.upper.unwrap_or(f64::INFINITY))
                .collect(),
        })
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower clamps.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper clamps.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Clamp a solution in place.
    pub fn clamp(&self, x: &mut [f64]) {
        for ((v, &lo), &hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(lo, hi);
        }
    }

    /// Whether every coordinate lies within its clamps.
    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .all(|((v, &lo), &hi)| (lo..=hi).contains(v))
    }
}

/// Solution types that know which emitters can drive them.
///
/// `A` is the elite container the built emitter works against.
pub trait BuildEmitter<M, A = Archive<Self, M>>: Solution + Sized {
    /// Build the emitter described by `config`.
    ///
    /// `x0` is the fallback initial center when the config sets none, and
    /// `param_bounds` the fallback solution bounds.
    fn build_emitter(
        config: &EmitterConfig,
        x0: Option<Self>,
        param_bounds: Option<&BoundsConfig>,
        seed: u64,
    ) -> Result<Box<dyn Emitter<Self, M, A>>, ConfigError>;
}

impl<M, A> BuildEmitter<M, A> for Vec<f64>
where
    M: Clone + Send + 'static,
    A: ElitePool<Vec<f64>, M>,
{
    fn build_emitter(
        config: &EmitterConfig,
        x0: Option<Self>,
        param_bounds: Option<&BoundsConfig>,
        seed: u64,
    ) -> Result<Box<dyn Emitter<Self, M, A>>, ConfigError> {
        config.validate()?;
        let seed = config.seed.unwrap_or(seed);

        let resolve = |x0: Option<Self>| -> Result<(Vec<f64>, SolutionBounds, EmitterBase), ConfigError> {
            let x0 = config
                .x0
                .clone()
                .or(x0)
                .ok_or_else(|| ConfigError::MissingX0 {
                    emitter: config.name.clone(),
                })?;
            let bounds = SolutionBounds::from_config(config.bounds.as_ref().or(param_bounds), x0.len())?;
            let base = EmitterBase::new(config.name.clone(), config.batch_size, seed);
            Ok((x0, bounds, base))
        };

        match &config.kind {
            EmitterKind::Gaussian { sigma0 } => {
                let (x0, bounds, base) = resolve(x0)?;
                let sigma = sigma0.resolve(x0.len())?;
                Ok(Box::new(GaussianEmitter::new(base, x0, sigma, bounds)))
            }
            EmitterKind::IsoLine {
                iso_sigma,
                line_sigma,
            } => {
                let (x0, bounds, base) = resolve(x0)?;
                Ok(Box::new(IsoLineEmitter::new(base, x0, *iso_sigma, *line_sigma, bounds)))
            }
            EmitterKind::Improvement {
                sigma0,
                selection,
                weights,
                restart,
                stop,
            } => {
                let (x0, bounds, base) = resolve(x0)?;
                let options = ImprovementOptions {
                    selection: *selection,
                    weights: *weights,
                    restart: *restart,
                    stop: *stop,
                };
                Ok(Box::new(ImprovementEmitter::new(base, x0, *sigma0, options, bounds)))
            }
            EmitterKind::ObjectMutation { .. } => object_emitter(config, seed),
        }
    }
}

/// Build an object-mutation emitter, the only kind available to arbitrary
/// [`Mutate`] genomes.
///
/// Implementations of [`BuildEmitter`] for custom genomes delegate here.
pub fn object_emitter<S, M, A>(
    config: &EmitterConfig,
    seed: u64,
) -> Result<Box<dyn Emitter<S, M, A>>, ConfigError>
where
    S: Mutate,
    M: Clone + Send + 'static,
    A: ElitePool<S, M>,
{
    config.validate()?;
    let EmitterKind::ObjectMutation { params } = &config.kind else {
        return Err(ConfigError::UnsupportedEmitter {
            emitter: config.name.clone(),
            kind: config.type_tag(),
        });
    };
    let params: S::Params =
        serde_json::from_value(params.clone()).map_err(|e| ConfigError::InvalidMutationParams {
            emitter: config.name.clone(),
            reason: e.to_string(),
        })?;
    let base = EmitterBase::new(config.name.clone(), config.batch_size, config.seed.unwrap_or(seed));
    Ok(Box::new(ObjectEmitter::new(base, params)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArchiveConfig, StepSize};

    fn archive() -> Archive<Vec<f64>> {
        Archive::new(ArchiveConfig::grid(vec![4, 4], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap()
    }

    #[test]
    fn test_base_state_machine() {
        let mut base = EmitterBase::new("e", 3, 0);
        assert!(matches!(
            base.accept_tell(3, 3),
            Err(EmitterError::NoPendingAsk { .. })
        ));

        base.mark_asked(3);
        assert!(matches!(base.check_idle(), Err(EmitterError::AskPending { .. })));
        assert_eq!(
            base.accept_tell(2, 2),
            Err(EmitterError::BatchMismatch {
                emitter: "e".into(),
                expected: 3,
                got: 2
            })
        );
        // A rejected tell leaves the batch pending.
        assert!(base.is_pending());
        base.accept_tell(3, 3).unwrap();
        assert!(base.check_idle().is_ok());
    }

    #[test]
    fn test_insert_batch_pulse() {
        let mut base = EmitterBase::new("e", 3, 0);
        let mut archive = archive();
        let (pulse, outcomes) = base.insert_batch(
            &mut archive,
            vec![vec![0.0], vec![1.0], vec![2.0]],
            vec![
                Evaluation::new(1.0, vec![0.1, 0.1]),
                Evaluation::new(2.0, vec![0.1, 0.1]),
                Evaluation::new(0.5, vec![0.1, 0.1]),
            ],
        );
        assert_eq!(
            pulse,
            Pulse {
                not_added: 1,
                improved: 1,
                new: 1
            }
        );
        assert_eq!(outcomes.len(), 3);
        assert_eq!(base.last_pulse(), Some(pulse));

        // Only the latest pulse is kept.
        let (second, _) = base.insert_batch(
            &mut archive,
            vec![vec![3.0]],
            vec![Evaluation::new(0.1, vec![0.9, 0.9])],
        );
        assert_eq!(base.last_pulse(), Some(second));
        assert_eq!(second.new, 1);
    }

    #[test]
    fn test_solution_bounds() {
        let bounds = SolutionBounds::from_config(
            Some(&BoundsConfig::PerDimension(vec![
                Bound::new(0.0, 1.0),
                Bound {
                    lower: None,
                    upper: Some(2.0),
                },
            ])),
            2,
        )
        .unwrap();
        let mut x = vec![-1.0, 5.0];
        bounds.clamp(&mut x);
        assert_eq!(x, vec![0.0, 2.0]);
        assert!(bounds.contains(&[0.5, -100.0]));
        assert!(SolutionBounds::from_config(Some(&BoundsConfig::PerDimension(vec![])), 2).is_err());
    }

    #[test]
    fn test_build_vector_emitters() {
        let config = EmitterConfig::new(EmitterKind::Gaussian {
            sigma0: StepSize::Scalar(0.1),
        })
        .named("gauss")
        .with_batch_size(5);
        let emitter =
            <Vec<f64> as BuildEmitter<()>>::build_emitter(&config, Some(vec![0.0; 3]), None, 1).unwrap();
        assert_eq!(emitter.name(), "gauss");
        assert_eq!(emitter.batch_size(), 5);

        let missing = <Vec<f64> as BuildEmitter<()>>::build_emitter(&config, None, None, 1);
        assert!(matches!(missing, Err(ConfigError::MissingX0 { .. })));
    }

    #[test]
    fn test_object_emitter_params() {
        let config = EmitterConfig::new(EmitterKind::ObjectMutation {
            params: serde_json::json!({"iso_sigma": 0.2, "lower": -1.0}),
        });
        assert!(object_emitter::<Vec<f64>, (), Archive<Vec<f64>>>(&config, 0).is_ok());

        let bad = EmitterConfig::new(EmitterKind::ObjectMutation {
            params: serde_json::json!({"sigma": "wide"}),
        });
        assert!(matches!(
            object_emitter::<Vec<f64>, (), Archive<Vec<f64>>>(&bad, 0),
            Err(ConfigError::InvalidMutationParams { .. })
        ));

        let gaussian = EmitterConfig::new(EmitterKind::Gaussian {
            sigma0: StepSize::Scalar(0.1),
        });
        assert!(matches!(
            object_emitter::<Vec<f64>, (), Archive<Vec<f64>>>(&gaussian, 0),
            Err(ConfigError::UnsupportedEmitter { .. })
        ));
    }
}
