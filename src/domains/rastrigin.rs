//! Rastrigin benchmark, as a vector domain and as an object-genome domain.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::compute::{
    BuildEmitter, Domain, ElitePool, Emitter, Evaluation, EvaluationError, Mutate, QdRng, Solution,
    object_emitter,
};
use crate::schema::{BoundsConfig, ConfigError, EmitterConfig};

use super::scale;

/// Default phenotype range of each parameter.
pub const RASTRIGIN_BOUNDS: (f64, f64) = (-5.12, 5.12);

/// Shifted Rastrigin: genomes in `[0, 1]^n` are scaled to `param_bounds`;
/// the descriptor is the first two phenotype coordinates.
///
/// The objective is `2n^2 - rastrigin(x)`, shifted so that most solutions
/// score positively and the QD score grows as cells fill.
#[derive(Debug, Clone, PartialEq)]
pub struct Rastrigin {
    n_dof: usize,
    param_bounds: (f64, f64),
}

impl Rastrigin {
    /// Rastrigin over `n_dof` parameters with the default bounds.
    pub fn new(n_dof: usize) -> Self {
        Self {
            n_dof,
            param_bounds: RASTRIGIN_BOUNDS,
        }
    }

    /// Override the phenotype range.
    pub fn with_bounds(mut self, low: f64, high: f64) -> Self {
        self.param_bounds = (low, high);
        self
    }

    /// Number of parameters.
    pub fn n_dof(&self) -> usize {
        self.n_dof
    }

    /// Phenotype range of each parameter.
    pub fn param_bounds(&self) -> (f64, f64) {
        self.param_bounds
    }

    /// Objective and descriptor of a `[0, 1]` genome; the phenotype is returned as metadata.
    fn score(&self, genome: &[f64]) -> Result<Evaluation<Vec<f64>>, EvaluationError> {
        if genome.len() < 2 {
            return Err(EvaluationError::Domain(format!(
                "Rastrigin needs at least 2 parameters, got {}",
                genome.len()
            )));
        }
        let pheno = scale(genome, self.param_bounds);
        let n = pheno.len() as f64;
        let rastrigin = 10.0 * n
            + pheno
                .iter()
                .map(|x| x * x - 10.0 * (2.0 * PI * x).cos())
                .sum::<f64>();
        let objective = 2.0 * n * n - rastrigin;
        Ok(Evaluation::new(objective, pheno[..2].to_vec()).with_metadata(pheno))
    }
}

impl Domain for Rastrigin {
    type Solution = Vec<f64>;
    type Metadata = Vec<f64>;

    fn descriptor_dim(&self) -> usize {
        2
    }

    fn init(&self, n: usize, rng: &mut QdRng) -> Vec<Vec<f64>> {
        (0..n)
            .map(|_| (0..self.n_dof).map(|_| rng.uniform(0.0, 1.0)).collect())
            .collect()
    }

    fn evaluate(&self, solution: &Vec<f64>) -> Result<Evaluation<Vec<f64>>, EvaluationError> {
        self.score(solution)
    }
}

/// Genome wrapper that mutates itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RastriginGenome {
    /// Parameters in `[0, 1]`.
    pub genome: Vec<f64>,
}

/// Mutation parameters of [`RastriginGenome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeMutation {
    /// Standard deviation of the isotropic noise.
    pub iso_sigma: f64,
}

impl Solution for RastriginGenome {
    fn params(&self) -> &[f64] {
        &self.genome
    }
}

impl Mutate for RastriginGenome {
    type Params = GenomeMutation;

    fn mutate(&self, params: &GenomeMutation, rng: &mut QdRng) -> Self {
        Self {
            genome: self
                .genome
                .iter()
                .map(|x| (x + params.iso_sigma * rng.standard_normal()).clamp(0.0, 1.0))
                .collect(),
        }
    }
}

impl<M, A> BuildEmitter<M, A> for RastriginGenome
where
    M: Clone + Send + 'static,
    A: ElitePool<Self, M>,
{
    fn build_emitter(
        config: &EmitterConfig,
        _x0: Option<Self>,
        _param_bounds: Option<&BoundsConfig>,
        seed: u64,
    ) -> Result<Box<dyn Emitter<Self, M, A>>, ConfigError> {
        object_emitter(config, seed)
    }
}

/// Rastrigin over [`RastriginGenome`] solutions, driven by object mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRastrigin {
    inner: Rastrigin,
}

impl ObjectRastrigin {
    /// Object-genome Rastrigin over `n_dof` parameters.
    pub fn new(n_dof: usize) -> Self {
        Self {
            inner: Rastrigin::new(n_dof),
        }
    }

    /// Override the phenotype range.
    pub fn with_bounds(self, low: f64, high: f64) -> Self {
        Self {
            inner: self.inner.with_bounds(low, high),
        }
    }
}

impl Domain for ObjectRastrigin {
    type Solution = RastriginGenome;
    type Metadata = Vec<f64>;

    fn descriptor_dim(&self) -> usize {
        2
    }

    fn init(&self, n: usize, rng: &mut QdRng) -> Vec<RastriginGenome> {
        self.inner
            .init(n, rng)
            .into_iter()
            .map(|genome| RastriginGenome { genome })
            .collect()
    }

    fn evaluate(&self, solution: &RastriginGenome) -> Result<Evaluation<Vec<f64>>, EvaluationError> {
        self.inner.score(&solution.genome)
    }
}
