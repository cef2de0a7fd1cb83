//! Run configuration and validation errors.

use serde::{Deserialize, Serialize};

use super::{ArchiveConfig, BoundsConfig, EmitterConfig, EmitterKind, StepSize};

/// Top-level configuration of a MAP-Elites run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Archive discretization.
    pub archive: ArchiveConfig,
    /// Emitters, one batch each per generation.
    pub emitters: Vec<EmitterConfig>,
    /// Solutions drawn from the domain to bootstrap the archive.
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    /// Number of ask/tell generations.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Parallel evaluation workers (1 evaluates on the calling thread).
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Default solution bounds for emitters that do not set their own.
    #[serde(default)]
    pub param_bounds: Option<BoundsConfig>,
    /// Progress reporting and output.
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            archive: ArchiveConfig::default(),
            emitters: vec![EmitterConfig::new(EmitterKind::Gaussian {
                sigma0: StepSize::Scalar(0.1),
            })],
            n_init: default_n_init(),
            generations: default_generations(),
            seed: None,
            workers: default_workers(),
            param_bounds: None,
            log: LogConfig::default(),
        }
    }
}

fn default_n_init() -> usize {
    100
}
fn default_generations() -> usize {
    1000
}
fn default_workers() -> usize {
    1
}

/// Reporting cadence and output location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Print metrics every `print_rate` generations.
    #[serde(default = "default_print_rate")]
    pub print_rate: usize,
    /// Write metrics and archive every `save_rate` generations.
    #[serde(default = "default_save_rate")]
    pub save_rate: usize,
    /// Output directory; nothing is written when unset.
    #[serde(default)]
    pub output_dir: Option<std::path::PathBuf>,
    /// Include per-cell metadata in the saved archive.
    #[serde(default)]
    pub save_metadata: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print_rate: default_print_rate(),
            save_rate: default_save_rate(),
            output_dir: None,
            save_metadata: false,
        }
    }
}

fn default_print_rate() -> usize {
    10
}
fn default_save_rate() -> usize {
    100
}

impl RunConfig {
    /// Validate the run configuration and every nested config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.archive.validate()?;

        if self.emitters.is_empty() {
            return Err(ConfigError::NoEmitters);
        }
        for emitter in &self.emitters {
            emitter.validate()?;
        }
        if self.generations == 0 {
            return Err(ConfigError::ZeroGenerations);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if let Some(bounds) = &self.param_bounds {
            bounds.validate()?;
        }
        if self.log.print_rate == 0 || self.log.save_rate == 0 {
            return Err(ConfigError::ZeroLogRate);
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Archive needs at least one descriptor dimension")]
    NoDescriptorDimensions,
    #[error("Descriptor bounds of dimension {dim} are invalid: [{low}, {high}]")]
    InvalidDescriptorBounds { dim: usize, low: f64, high: f64 },
    #[error("Grid resolution of dimension {dim} must be non-zero")]
    ZeroResolution { dim: usize },
    #[error("CVT archive needs at least one centroid")]
    NoCentroids,
    #[error("CVT needs at least as many samples ({samples}) as centroids ({centroids})")]
    TooFewSamples { samples: usize, centroids: usize },
    #[error("Expected {expected} entries for {what}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("At least one emitter is required")]
    NoEmitters,
    #[error("Emitter '{emitter}' has a zero batch size")]
    ZeroBatchSize { emitter: String },
    #[error("Emitter '{emitter}' has invalid {what}: {value}")]
    InvalidStepSize {
        emitter: String,
        what: &'static str,
        value: f64,
    },
    #[error("Emitter '{emitter}' selects {num_parents} parents from a batch of {batch_size}")]
    InvalidParentCount {
        emitter: String,
        num_parents: usize,
        batch_size: usize,
    },
    #[error("Emitter '{emitter}' restart patience and stagnation window must be positive")]
    ZeroPatience { emitter: String },
    #[error("Solution bound of dimension {dim} has lower {lower} > upper {upper}")]
    InvalidSolutionBounds { dim: usize, lower: f64, upper: f64 },
    #[error("Emitter '{emitter}' of type '{kind}' is not supported for this solution type")]
    UnsupportedEmitter { emitter: String, kind: &'static str },
    #[error("Invalid mutation parameters for emitter '{emitter}': {reason}")]
    InvalidMutationParams { emitter: String, reason: String },
    #[error("Emitter '{emitter}' has no x0 and there are no bootstrap solutions to pick from")]
    MissingX0 { emitter: String },
    #[error("Generation count must be positive")]
    ZeroGenerations,
    #[error("Worker count must be positive")]
    ZeroWorkers,
    #[error("Print and save rates must be positive")]
    ZeroLogRate,
}
