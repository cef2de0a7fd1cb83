//! Planar arm: reach as many end-effector positions as possible with smooth joint angles.

use std::f64::consts::PI;

use crate::compute::{Domain, Evaluation, EvaluationError, QdRng};

use super::scale;

/// Arm of `n_dof` equal links with total length one.
///
/// Genomes in `[0, 1]` map to joint angles in `[-pi, pi]`. The descriptor is
/// the end-effector position shifted into `[0, 1]^2`; the objective is one
/// minus the standard deviation of the genome.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarArm {
    n_dof: usize,
}

impl PlanarArm {
    /// Arm with `n_dof` joints.
    pub fn new(n_dof: usize) -> Self {
        Self { n_dof }
    }

    /// Number of joints.
    pub fn n_dof(&self) -> usize {
        self.n_dof
    }

    /// End-effector position of joint angles, scaled into `[0, 1]^2`.
    pub fn end_effector(thetas: &[f64]) -> [f64; 2] {
        let n = thetas.len().max(1) as f64;
        let (mut x, mut y, mut cumulative) = (0.0, 0.0, 0.0);
        for theta in thetas {
            cumulative += theta;
            x += cumulative.cos();
            y += cumulative.sin();
        }
        [x / (2.0 * n) + 0.5, y / (2.0 * n) + 0.5]
    }
}

impl Domain for PlanarArm {
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

    fn evaluate(&self, genome: &Vec<f64>) -> Result<Evaluation<Vec<f64>>, EvaluationError> {
        if genome.is_empty() {
            return Err(EvaluationError::Domain("Arm needs at least one joint".into()));
        }
        let n = genome.len() as f64;
        let mean = genome.iter().sum::<f64>() / n;
        let std = (genome.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n).sqrt();

        let thetas = scale(genome, (-PI, PI));
        let descriptor = Self::end_effector(&thetas).to_vec();
        Ok(Evaluation::new(1.0 - std, descriptor).with_metadata(thetas))
    }
}
