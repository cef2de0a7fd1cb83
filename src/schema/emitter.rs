//! Emitter configuration types.
//!
//! Each emitter is described by an [`EmitterConfig`] whose `type` tag selects
//! one of the recognized strategies:
//!
//! - `gaussian`: isotropic Gaussian perturbation of random elites
//! - `iso_line`: Gaussian plus line recombination between two elites
//! - `improvement`: CMA-style search distribution ranked by archive improvement
//! - `object_mutation`: delegates variation to the solution's own `mutate`

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration for a single emitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Strategy and its parameters.
    #[serde(flatten)]
    pub kind: EmitterKind,
    /// Human-readable name used in diagnostics.
    #[serde(default = "default_name")]
    pub name: String,
    /// Candidates produced per `ask`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Random seed; derived from the run seed when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Initial center; a random bootstrap solution is used when unset.
    #[serde(default)]
    pub x0: Option<Vec<f64>>,
    /// Solution-space bounds; falls back to the run's `param_bounds`.
    #[serde(default)]
    pub bounds: Option<BoundsConfig>,
}

fn default_name() -> String {
    "--".to_string()
}
fn default_batch_size() -> usize {
    64
}

impl EmitterConfig {
    /// Config with default batch size and name for the given strategy.
    pub fn new(kind: EmitterKind) -> Self {
        Self {
            kind,
            name: default_name(),
            batch_size: default_batch_size(),
            seed: None,
            x0: None,
            bounds: None,
        }
    }

    /// Set the diagnostic name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the initial center.
    pub fn with_x0(mut self, x0: Vec<f64>) -> Self {
        self.x0 = Some(x0);
        self
    }

    /// Set solution bounds.
    pub fn with_bounds(mut self, bounds: BoundsConfig) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Short tag of the strategy, as written in config files.
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            EmitterKind::Gaussian { .. } => "gaussian",
            EmitterKind::IsoLine { .. } => "iso_line",
            EmitterKind::Improvement { .. } => "improvement",
            EmitterKind::ObjectMutation { .. } => "object_mutation",
        }
    }

    /// Validate the emitter configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize {
                emitter: self.name.clone(),
            });
        }

        let positive = |value: f64, what: &'static str| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidStepSize {
                    emitter: self.name.clone(),
                    what,
                    value,
                })
            }
        };

        match &self.kind {
            EmitterKind::Gaussian { sigma0 } => {
                for &s in sigma0.values() {
                    positive(s, "sigma0")?;
                }
            }
            EmitterKind::IsoLine {
                iso_sigma,
                line_sigma,
            } => {
                positive(*iso_sigma, "iso_sigma")?;
                // A zero line sigma degenerates to a Gaussian emitter, which is allowed.
                if !(line_sigma.is_finite() && *line_sigma >= 0.0) {
                    return Err(ConfigError::InvalidStepSize {
                        emitter: self.name.clone(),
                        what: "line_sigma",
                        value: *line_sigma,
                    });
                }
            }
            EmitterKind::Improvement {
                sigma0,
                selection,
                restart,
                stop,
                ..
            } => {
                positive(*sigma0, "sigma0")?;
                if let SelectionRule::Mu {
                    num_parents: Some(n),
                } = selection
                    && (*n == 0 || *n > self.batch_size)
                {
                    return Err(ConfigError::InvalidParentCount {
                        emitter: self.name.clone(),
                        num_parents: *n,
                        batch_size: self.batch_size,
                    });
                }
                if let RestartRule::NoImprovement { patience: 0 } = restart {
                    return Err(ConfigError::ZeroPatience {
                        emitter: self.name.clone(),
                    });
                }
                if stop.window == 0 {
                    return Err(ConfigError::ZeroPatience {
                        emitter: self.name.clone(),
                    });
                }
            }
            EmitterKind::ObjectMutation { .. } => {}
        }

        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }

        Ok(())
    }
}

/// Emitter strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterKind {
    /// Gaussian noise around random elites (or `x0` while the archive is empty).
    Gaussian {
        /// Standard deviation of the perturbation.
        sigma0: StepSize,
    },
    /// Iso+LineDD variation between pairs of elites.
    IsoLine {
        /// Isotropic noise scale.
        #[serde(default = "default_iso_sigma")]
        iso_sigma: f64,
        /// Scale of the noise along the line between two elites.
        #[serde(default = "default_line_sigma")]
        line_sigma: f64,
    },
    /// Improvement emitter driven by a CMA-style search distribution.
    Improvement {
        /// Initial step size of the search distribution.
        sigma0: f64,
        /// How many ranked candidates update the distribution.
        #[serde(default)]
        selection: SelectionRule,
        /// Recombination weights over the selected parents.
        #[serde(default)]
        weights: WeightRule,
        /// When the distribution is restarted from a random elite.
        #[serde(default)]
        restart: RestartRule,
        /// Stagnation criteria of the internal optimizer.
        #[serde(default)]
        stop: StopCriteria,
    },
    /// Calls `mutate` on random elites; requires a non-empty archive.
    ObjectMutation {
        /// Mutation parameters handed to the solution type.
        #[serde(default)]
        params: serde_json::Value,
    },
}

fn default_iso_sigma() -> f64 {
    0.01
}
fn default_line_sigma() -> f64 {
    0.2
}

/// Scalar or per-dimension step size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepSize {
    /// Same standard deviation for every dimension.
    Scalar(f64),
    /// One standard deviation per dimension.
    PerDimension(Vec<f64>),
}

impl StepSize {
    /// Raw values as configured.
    pub fn values(&self) -> &[f64] {
        match self {
            Self::Scalar(s) => std::slice::from_ref(s),
            Self::PerDimension(v) => v,
        }
    }

    /// Expand to one value per dimension.
    pub fn resolve(&self, dim: usize) -> Result<Vec<f64>, ConfigError> {
        match self {
            Self::Scalar(s) => Ok(vec![*s; dim]),
            Self::PerDimension(v) if v.len() == dim => Ok(v.clone()),
            Self::PerDimension(v) => Err(ConfigError::DimensionMismatch {
                what: "sigma0",
                expected: dim,
                got: v.len(),
            }),
        }
    }
}

/// Parent selection for the improvement emitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SelectionRule {
    /// Only candidates that were added or improved a cell become parents.
    #[default]
    Filter,
    /// A fixed number of top-ranked candidates (default: half the batch).
    Mu {
        /// Parent count; `batch_size / 2` when unset.
        #[serde(default)]
        num_parents: Option<usize>,
    },
}

/// Recombination weighting for the improvement emitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightRule {
    /// Log-decreasing positive weights over the parents.
    #[default]
    Truncation,
    /// Positive weights over the parents, negative weights over the rest
    /// (applied to the covariance update only).
    Active,
}

/// Restart policy for the improvement emitter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RestartRule {
    /// Restart after `patience` consecutive tells with no added or improved cell,
    /// or when the optimizer stagnates.
    NoImprovement {
        /// Consecutive unproductive tells tolerated.
        #[serde(default = "default_patience")]
        patience: usize,
    },
    /// Restart only when the optimizer stagnates.
    Basic,
}

impl Default for RestartRule {
    fn default() -> Self {
        Self::NoImprovement {
            patience: default_patience(),
        }
    }
}

fn default_patience() -> usize {
    1
}

/// Numerical stagnation thresholds of the internal search distribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StopCriteria {
    /// Restart when the largest standard deviation falls below this floor.
    #[serde(default = "default_tol_x")]
    pub tol_x: f64,
    /// Ranking values closer than this count as flat.
    #[serde(default = "default_tol_fun")]
    pub tol_fun: f64,
    /// Consecutive flat rankings before a restart.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Maximum covariance condition number.
    #[serde(default = "default_max_condition")]
    pub max_condition: f64,
}

impl Default for StopCriteria {
    fn default() -> Self {
        Self {
            tol_x: default_tol_x(),
            tol_fun: default_tol_fun(),
            window: default_window(),
            max_condition: default_max_condition(),
        }
    }
}

fn default_tol_x() -> f64 {
    1e-11
}
fn default_tol_fun() -> f64 {
    1e-12
}
fn default_window() -> usize {
    1
}
fn default_max_condition() -> f64 {
    1e14
}

/// A lower/upper clamp for one solution dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Bound {
    /// Lower clamp, unbounded when `None`.
    #[serde(default)]
    pub lower: Option<f64>,
    /// Upper clamp, unbounded when `None`.
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Bound {
    /// Closed interval `[lower, upper]`.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Solution bounds shared by all dimensions or given per dimension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BoundsConfig {
    /// Same bound for every dimension.
    Shared(Bound),
    /// One bound per dimension.
    PerDimension(Vec<Bound>),
}

impl BoundsConfig {
    /// Expand to one bound per dimension.
    pub fn resolve(&self, dim: usize) -> Result<Vec<Bound>, ConfigError> {
        match self {
            Self::Shared(b) => Ok(vec![*b; dim]),
            Self::PerDimension(v) if v.len() == dim => Ok(v.clone()),
            Self::PerDimension(v) => Err(ConfigError::DimensionMismatch {
                what: "solution bounds",
                expected: dim,
                got: v.len(),
            }),
        }
    }

    /// Check that no lower clamp exceeds its upper clamp.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = match self {
            Self::Shared(b) => std::slice::from_ref(b),
            Self::PerDimension(v) => v.as_slice(),
        };
        for (dim, b) in bounds.iter().enumerate() {
            if let (Some(lower), Some(upper)) = (b.lower, b.upper)
                && lower > upper
            {
                return Err(ConfigError::InvalidSolutionBounds { dim, lower, upper });
            }
        }
        Ok(())
    }
}
