//! Domains module - Benchmark problems and experiment files.
//!
//! An experiment file is a [`RunConfig`] with an extra `domain` entry naming
//! one of the built-in problems:
//!
//! ```json
//! {
//!   "domain": {"name": "planar_arm", "n_dof": 10},
//!   "archive": {"type": "grid", "resolution": [50, 50], "bounds": [[0, 1], [0, 1]]},
//!   "emitters": [{"type": "iso_line", "batch_size": 64}],
//!   "generations": 500
//! }
//! ```

mod arm;
mod rastrigin;

pub use arm::*;
pub use rastrigin::*;

use serde::{Deserialize, Serialize};

use crate::compute::{BuildEmitter, Domain, MapElites, RunError};
use crate::schema::{
    ArchiveConfig, Bound, BoundsConfig, EmitterConfig, EmitterKind, LogConfig, RunConfig,
    RunProgress, RunStats, SelectionRule, StepSize,
};

/// Map `[0, 1]` genome values linearly onto `[low, high]`.
pub fn scale(genome: &[f64], (low, high): (f64, f64)) -> Vec<f64> {
    genome.iter().map(|g| low + (high - low) * g).collect()
}

/// Built-in benchmark selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DomainConfig {
    /// Vector Rastrigin.
    Rastrigin {
        /// Number of parameters.
        n_dof: usize,
        /// Phenotype range.
        #[serde(default = "default_rastrigin_bounds")]
        param_bounds: (f64, f64),
    },
    /// Rastrigin with self-mutating genomes.
    ObjectRastrigin {
        /// Number of parameters.
        n_dof: usize,
        /// Phenotype range.
        #[serde(default = "default_rastrigin_bounds")]
        param_bounds: (f64, f64),
    },
    /// Planar arm.
    PlanarArm {
        /// Number of joints.
        n_dof: usize,
    },
}

fn default_rastrigin_bounds() -> (f64, f64) {
    RASTRIGIN_BOUNDS
}

/// A domain plus the run configuration to illuminate it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Problem to solve.
    pub domain: DomainConfig,
    /// Archive, emitters and run settings.
    #[serde(flatten)]
    pub run: RunConfig,
}

impl Default for ExperimentConfig {
    /// Planar arm with Gaussian, iso-line and improvement emitters.
    fn default() -> Self {
        let unit = BoundsConfig::Shared(Bound::new(0.0, 1.0));
        Self {
            domain: DomainConfig::PlanarArm { n_dof: 10 },
            run: RunConfig {
                archive: ArchiveConfig::grid(vec![32, 32], vec![(0.0, 1.0), (0.0, 1.0)]),
                emitters: vec![
                    EmitterConfig::new(EmitterKind::Gaussian {
                        sigma0: StepSize::Scalar(0.05),
                    })
                    .named("gaussian"),
                    EmitterConfig::new(EmitterKind::IsoLine {
                        iso_sigma: 0.01,
                        line_sigma: 0.2,
                    })
                    .named("iso_line"),
                    EmitterConfig::new(EmitterKind::Improvement {
                        sigma0: 0.1,
                        selection: SelectionRule::Filter,
                        weights: Default::default(),
                        restart: Default::default(),
                        stop: Default::default(),
                    })
                    .named("improvement")
                    .with_batch_size(32),
                ],
                n_init: 200,
                generations: 200,
                seed: Some(0),
                workers: 1,
                param_bounds: Some(unit),
                log: LogConfig {
                    print_rate: 20,
                    ..LogConfig::default()
                },
            },
        }
    }
}

/// Run an experiment on its built-in domain, returning the run summary.
pub fn run_experiment<F>(config: &ExperimentConfig, progress: F) -> Result<RunStats, RunError>
where
    F: FnMut(&RunProgress),
{
    match config.domain {
        DomainConfig::Rastrigin {
            n_dof,
            param_bounds: (low, high),
        } => run_domain(config, Rastrigin::new(n_dof).with_bounds(low, high), progress),
        DomainConfig::ObjectRastrigin {
            n_dof,
            param_bounds: (low, high),
        } => run_domain(
            config,
            ObjectRastrigin::new(n_dof).with_bounds(low, high),
            progress,
        ),
        DomainConfig::PlanarArm { n_dof } => run_domain(config, PlanarArm::new(n_dof), progress),
    }
}

fn run_domain<D, F>(config: &ExperimentConfig, domain: D, progress: F) -> Result<RunStats, RunError>
where
    D: Domain,
    D::Solution: BuildEmitter<D::Metadata>,
    F: FnMut(&RunProgress),
{
    let engine = MapElites::new(config.run.clone(), domain)?;
    Ok(engine.run_with_callback(progress)?.stats)
}
