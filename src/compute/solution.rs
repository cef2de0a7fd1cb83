//! Solution payloads and evaluation results.
//!
//! Solutions are either numeric vectors (`Vec<f64>`, which support arithmetic
//! perturbation by every emitter) or user-defined genomes that expose their own
//! variation through [`Mutate`].

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::QdRng;

/// A solution that can be stored in an archive.
pub trait Solution: Clone + Send + Sync + Debug + 'static {
    /// Numeric parameters written to the solution channels of an export.
    ///
    /// Object genomes without a flat numeric form may return an empty slice.
    fn params(&self) -> &[f64];
}

impl Solution for Vec<f64> {
    #[inline]
    fn params(&self) -> &[f64] {
        self
    }
}

/// Solutions that produce offspring by mutating themselves.
pub trait Mutate: Solution {
    /// Mutation parameters, parsed from the emitter's `params` config.
    type Params: DeserializeOwned + Clone + Send + Sync + Debug + 'static;

    /// Create a mutated copy of `self`.
    fn mutate(&self, params: &Self::Params, rng: &mut QdRng) -> Self;
}

/// Isotropic Gaussian mutation parameters for vector solutions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMutation {
    /// Standard deviation of the noise.
    pub iso_sigma: f64,
    /// Lower clamp applied to every dimension.
    #[serde(default)]
    pub lower: Option<f64>,
    /// Upper clamp applied to every dimension.
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Mutate for Vec<f64> {
    type Params = VectorMutation;

    fn mutate(&self, params: &VectorMutation, rng: &mut QdRng) -> Self {
        let lower = params.lower.unwrap_or(f64::NEG_INFINITY);
        let upper = params.upper.unwrap_or(f64::INFINITY);
        self.iter()
            .map(|x| (x + params.iso_sigma * rng.standard_normal()).clamp(lower, upper))
            .collect()
    }
}

/// Result of evaluating one candidate: objective, descriptor and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation<M> {
    /// Quality score (higher is better).
    pub objective: f64,
    /// Behavior descriptor used to place the solution in the archive.
    pub descriptor: Vec<f64>,
    /// Opaque data stored alongside the elite.
    pub metadata: Option<M>,
}

impl<M> Evaluation<M> {
    /// Evaluation without metadata.
    pub fn new(objective: f64, descriptor: Vec<f64>) -> Self {
        Self {
            objective,
            descriptor,
            metadata: None,
        }
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: M) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_mutation_clamps() {
        let mut rng = QdRng::new(42);
        let params = VectorMutation {
            iso_sigma: 10.0,
            lower: Some(0.0),
            upper: Some(1.0),
        };
        let parent = vec![0.5; 16];
        let child = parent.mutate(&params, &mut rng);

        assert_eq!(child.len(), parent.len());
        assert!(child.iter().all(|x| (0.0..=1.0).contains(x)));
        assert_ne!(child, parent);
    }

    #[test]
    fn test_mutation_params_from_json() {
        let params: VectorMutation = serde_json::from_str(r#"{"iso_sigma": 0.05}"#).unwrap();
        assert_eq!(params.iso_sigma, 0.05);
        assert!(params.lower.is_none());
    }
}
