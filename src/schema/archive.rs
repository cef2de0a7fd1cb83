//! Archive configuration: descriptor-space discretization and bounds.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration for a MAP-Elites archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// How the descriptor space is split into cells.
    #[serde(flatten)]
    pub discretization: Discretization,
    /// `[low, high]` range of each descriptor dimension.
    pub bounds: Vec<(f64, f64)>,
    /// Seed for any randomized construction (CVT sampling).
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            discretization: Discretization::Grid {
                resolution: vec![50, 50],
            },
            bounds: vec![(0.0, 1.0), (0.0, 1.0)],
            seed: None,
        }
    }
}

/// Discretization of the descriptor space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Discretization {
    /// Uniform grid with a fixed number of bins per dimension.
    Grid {
        /// Bins per descriptor dimension.
        resolution: Vec<usize>,
    },
    /// Centroidal Voronoi tessellation with `centroids` cells.
    Cvt {
        /// Number of cells (centroids).
        centroids: usize,
        /// Uniform samples drawn inside the bounds for k-means.
        #[serde(default = "default_cvt_samples")]
        samples: usize,
        /// Lloyd iterations.
        #[serde(default = "default_cvt_iterations")]
        iterations: usize,
        /// Precomputed centroids; skips k-means when present.
        #[serde(default)]
        custom_centroids: Option<Vec<Vec<f64>>>,
    },
}

fn default_cvt_samples() -> usize {
    100_000
}
fn default_cvt_iterations() -> usize {
    30
}

impl ArchiveConfig {
    /// Grid archive over `bounds` with the given per-dimension resolution.
    pub fn grid(resolution: Vec<usize>, bounds: Vec<(f64, f64)>) -> Self {
        Self {
            discretization: Discretization::Grid { resolution },
            bounds,
            seed: None,
        }
    }

    /// CVT archive with `centroids` cells, using default k-means settings.
    pub fn cvt(centroids: usize, bounds: Vec<(f64, f64)>) -> Self {
        Self {
            discretization: Discretization::Cvt {
                centroids,
                samples: default_cvt_samples(),
                iterations: default_cvt_iterations(),
                custom_centroids: None,
            },
            bounds,
            seed: None,
        }
    }

    /// Set the construction seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of descriptor dimensions.
    #[inline]
    pub fn descriptor_dim(&self) -> usize {
        self.bounds.len()
    }

    /// Validate archive configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.is_empty() {
            return Err(ConfigError::NoDescriptorDimensions);
        }
        for (dim, &(low, high)) in self.bounds.iter().enumerate() {
            if !(low.is_finite() && high.is_finite()) || low >= high {
                return Err(ConfigError::InvalidDescriptorBounds { dim, low, high });
            }
        }

        match &self.discretization {
            Discretization::Grid { resolution } => {
                if resolution.len() != self.bounds.len() {
                    return Err(ConfigError::DimensionMismatch {
                        what: "grid resolution",
                        expected: self.bounds.len(),
                        got: resolution.len(),
                    });
                }
                if let Some(dim) = resolution.iter().position(|&r| r == 0) {
                    return Err(ConfigError::ZeroResolution { dim });
                }
            }
            Discretization::Cvt {
                centroids,
                samples,
                custom_centroids,
                ..
            } => {
                if *centroids == 0 {
                    return Err(ConfigError::NoCentroids);
                }
                match custom_centroids {
                    Some(points) => {
                        if points.len() != *centroids {
                            return Err(ConfigError::DimensionMismatch {
                                what: "custom centroid count",
                                expected: *centroids,
                                got: points.len(),
                            });
                        }
                        if let Some(bad) = points.iter().find(|p| p.len() != self.bounds.len()) {
                            return Err(ConfigError::DimensionMismatch {
                                what: "custom centroid",
                                expected: self.bounds.len(),
                                got: bad.len(),
                            });
                        }
                    }
                    None if samples < centroids => {
                        return Err(ConfigError::TooFewSamples {
                            samples: *samples,
                            centroids: *centroids,
                        });
                    }
                    None => {}
                }
            }
        }

        Ok(())
    }
}
