//! Problem domains and batch evaluation.

use std::fmt::Debug;

use rayon::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Evaluation, QdRng, Solution};

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Domain failed: {0}")]
    Domain(String),
    #[error("Descriptor has {got} dimensions, expected {expected}")]
    DescriptorDim { expected: usize, got: usize },
    #[error("Candidate {index}: {source}")]
    Candidate {
        index: usize,
        #[source]
        source: Box<EvaluationError>,
    },
    #[error("Failed to build evaluation thread pool: {0}")]
    ThreadPool(String),
}

/// A problem to illuminate: produces initial solutions and scores candidates.
///
/// `evaluate` must be free of side effects; it may run on several threads.
pub trait Domain: Send + Sync {
    /// Solution representation.
    type Solution: Solution + Serialize + DeserializeOwned;
    /// Opaque data stored with each elite.
    type Metadata: Clone + Send + Sync + Debug + Serialize + DeserializeOwned + 'static;

    /// Descriptor dimensionality.
    fn descriptor_dim(&self) -> usize;

    /// `n` initial solutions.
    fn init(&self, n: usize, rng: &mut QdRng) -> Vec<Self::Solution>;

    /// Objective, descriptor and metadata of one candidate.
    fn evaluate(&self, solution: &Self::Solution) -> Result<Evaluation<Self::Metadata>, EvaluationError>;
}

/// Evaluates batches serially or on a dedicated rayon pool.
///
/// Results are returned in candidate order, and the whole batch fails if any
/// candidate fails.
#[derive(Debug)]
pub struct BatchEvaluator {
    pool: Option<rayon::ThreadPool>,
}

impl BatchEvaluator {
    /// Evaluator with `workers` threads; one worker evaluates on the caller's thread.
    pub fn new(workers: usize) -> Result<Self, EvaluationError> {
        let pool = if workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("qd-eval-{i}"))
                    .build()
                    .map_err(|e| EvaluationError::ThreadPool(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self { pool })
    }

    /// Evaluator running on the caller's thread.
    pub fn serial() -> Self {
        Self { pool: None }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, rayon::ThreadPool::current_num_threads)
    }

    /// Evaluate every candidate.
    pub fn evaluate<D: Domain>(
        &self,
        domain: &D,
        candidates: &[D::Solution],
    ) -> Result<Vec<Evaluation<D::Metadata>>, EvaluationError> {
        let expected = domain.descriptor_dim();
        let eval_one = |(index, candidate): (usize, &D::Solution)| {
            domain
                .evaluate(candidate)
                .and_then(|evaluation| {
                    if evaluation.descriptor.len() == expected {
                        Ok(evaluation)
                    } else {
                        Err(EvaluationError::DescriptorDim {
                            expected,
                            got: evaluation.descriptor.len(),
                        })
                    }
                })
                .map_err(|e| EvaluationError::Candidate {
                    index,
                    source: Box::new(e),
                })
        };

        match &self.pool {
            Some(pool) => pool.install(|| candidates.par_iter().enumerate().map(eval_one).collect()),
            None => candidates.iter().enumerate().map(eval_one).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square;

    impl Domain for Square {
        type Solution = Vec<f64>;
        type Metadata = usize;

        fn descriptor_dim(&self) -> usize {
            1
        }

        fn init(&self, n: usize, rng: &mut QdRng) -> Vec<Vec<f64>> {
            (0..n).map(|_| vec![rng.uniform(-1.0, 1.0)]).collect()
        }

        fn evaluate(&self, solution: &Vec<f64>) -> Result<Evaluation<usize>, EvaluationError> {
            let x = solution[0];
            if x.is_nan() {
                return Err(EvaluationError::Domain("nan input".into()));
            }
            Ok(Evaluation::new(-x * x, vec![x]).with_metadata(solution.len()))
        }
    }

    #[test]
    fn test_parallel_matches_serial() {
        let candidates = Square.init(100, &mut QdRng::new(4));
        let serial = BatchEvaluator::serial().evaluate(&Square, &candidates).unwrap();
        let parallel = BatchEvaluator::new(4).unwrap();
        assert_eq!(parallel.workers(), 4);
        assert_eq!(parallel.evaluate(&Square, &candidates).unwrap(), serial);
        assert_eq!(serial[7].descriptor, candidates[7]);
    }

    #[test]
    fn test_failure_aborts_batch() {
        let candidates = vec![vec![0.1], vec![f64::NAN], vec![0.3]];
        let err = BatchEvaluator::new(2)
            .unwrap()
            .evaluate(&Square, &candidates)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Candidate { index: 1, .. }));
    }

    struct WrongDim;

    impl Domain for WrongDim {
        type Solution = Vec<f64>;
        type Metadata = ();

        fn descriptor_dim(&self) -> usize {
            2
        }

        fn init(&self, n: usize, _rng: &mut QdRng) -> Vec<Vec<f64>> {
            vec![vec![0.0]; n]
        }

        fn evaluate(&self, _solution: &Vec<f64>) -> Result<Evaluation<()>, EvaluationError> {
            Ok(Evaluation::new(0.0, vec![0.0]))
        }
    }

    #[test]
    fn test_descriptor_dim_checked() {
        let err = BatchEvaluator::serial()
            .evaluate(&WrongDim, &WrongDim.init(1, &mut QdRng::new(0)))
            .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::Candidate {
                index: 0,
                source: Box::new(EvaluationError::DescriptorDim {
                    expected: 2,
                    got: 1
                }),
            }
        );
    }
}
