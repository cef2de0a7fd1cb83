//! Descriptor indexers: map continuous behavior vectors to archive cells.
//!
//! Two discretizations are provided:
//!
//! - [`GridIndexer`]: uniform bins per dimension, cells addressed by a tuple
//! - [`CvtIndexer`]: nearest of K centroids computed once by k-means
//!
//! Both clip out-of-range descriptors to the nearest valid cell instead of
//! failing, and both are deterministic for a fixed construction seed.

use std::fmt::Debug;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{ArchiveConfig, ConfigError, Discretization};

use super::QdRng;

/// Address of a cell, in the indexer's natural form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellIndex {
    /// Per-dimension bin numbers of a grid archive.
    Grid(Vec<usize>),
    /// Centroid id of a CVT archive.
    Centroid(usize),
}

/// Strategy mapping descriptors to cells.
///
/// Cells are addressed internally by a flat index in `0..num_cells()`, which is
/// the position in the archive's contiguous storage.
pub trait DescriptorIndexer: Send + Sync + Debug {
    /// Flat index of the cell containing `descriptor`.
    fn index_of(&self, descriptor: &[f64]) -> usize;

    /// Total number of cells.
    fn num_cells(&self) -> usize;

    /// Descriptor dimensionality.
    fn descriptor_dim(&self) -> usize;

    /// Natural address of a flat index.
    fn cell_index(&self, flat: usize) -> CellIndex;

    /// Flat index of a natural address, if it belongs to this indexer.
    fn flat_index(&self, index: &CellIndex) -> Option<usize>;

    /// Shape of the dense cell layout; `None` when the cells have no grid shape.
    fn dense_shape(&self) -> Option<&[usize]>;

    /// Centroid coordinates, for indexers defined by centroids.
    fn centroid_points(&self) -> Option<Vec<Vec<f64>>> {
        None
    }
}

/// Build the indexer described by an archive configuration.
pub fn build_indexer(config: &ArchiveConfig) -> Result<Box<dyn DescriptorIndexer>, ConfigError> {
    config.validate()?;

    let indexer: Box<dyn DescriptorIndexer> = match &config.discretization {
        Discretization::Grid { resolution } => {
            Box::new(GridIndexer::new(resolution.clone(), config.bounds.clone())?)
        }
        Discretization::Cvt {
            custom_centroids: Some(points),
            ..
        } => Box::new(CvtIndexer::from_centroids(points.clone())?),
        Discretization::Cvt {
            centroids,
            samples,
            iterations,
            custom_centroids: None,
        } => {
            let mut rng = QdRng::from_optional_seed(config.seed);
            Box::new(CvtIndexer::new(
                *centroids,
                &config.bounds,
                *samples,
                *iterations,
                &mut rng,
            )?)
        }
    };

    Ok(indexer)
}

/// Uniform grid over a bounded descriptor space.
#[derive(Debug, Clone)]
pub struct GridIndexer {
    resolution: Vec<usize>,
    bounds: Vec<(f64, f64)>,
    strides: Vec<usize>,
    num_cells: usize,
}

impl GridIndexer {
    /// Create a grid with `resolution[d]` bins over `bounds[d]`.
    pub fn new(resolution: Vec<usize>, bounds: Vec<(f64, f64)>) -> Result<Self, ConfigError> {
        ArchiveConfig::grid(resolution.clone(), bounds.clone()).validate()?;

        // Row-major strides: the last dimension varies fastest.
        let mut strides = vec![1; resolution.len()];
        for d in (0..resolution.len().saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * resolution[d + 1];
        }
        let num_cells = resolution.iter().product();

        Ok(Self {
            resolution,
            bounds,
            strides,
            num_cells,
        })
    }

    /// Bins per dimension.
    pub fn resolution(&self) -> &[usize] {
        &self.resolution
    }

    /// `resolution + 1` evenly spaced bin edges per dimension.
    pub fn boundaries(&self) -> Vec<Vec<f64>> {
        self.resolution
            .iter()
            .zip(&self.bounds)
            .map(|(&res, &(low, high))| {
                (0..=res)
                    .map(|i| low + (high - low) * i as f64 / res as f64)
                    .collect()
            })
            .collect()
    }

    /// Bin of one descriptor value along dimension `dim`, clipped to the grid.
    #[inline]
    fn bin(&self, dim: usize, value: f64) -> usize {
        let res = self.resolution[dim];
        let (low, high) = self.bounds[dim];
        let scaled = (value.clamp(low, high) - low) / (high - low) * res as f64;
        // NaN descriptors fall into the first bin.
        if scaled.is_nan() {
            return 0;
        }
        (scaled.floor() as usize).min(res - 1)
    }

    /// Per-dimension bins of a descriptor.
    pub fn grid_index(&self, descriptor: &[f64]) -> Vec<usize> {
        (0..self.resolution.len())
            .map(|d| {
                let value = descriptor.get(d).copied().unwrap_or(self.bounds[d].0);
                self.bin(d, value)
            })
            .collect()
    }
}

impl DescriptorIndexer for GridIndexer {
    fn index_of(&self, descriptor: &[f64]) -> usize {
        (0..self.resolution.len())
            .map(|d| {
                let value = descriptor.get(d).copied().unwrap_or(self.bounds[d].0);
                self.bin(d, value) * self.strides[d]
            })
            .sum()
    }

    fn num_cells(&self) -> usize {
        self.num_cells
    }

    fn descriptor_dim(&self) -> usize {
        self.resolution.len()
    }

    fn cell_index(&self, flat: usize) -> CellIndex {
        CellIndex::Grid(
            self.strides
                .iter()
                .zip(&self.resolution)
                .map(|(&stride, &res)| (flat / stride) % res)
                .collect(),
        )
    }

    fn flat_index(&self, index: &CellIndex) -> Option<usize> {
        match index {
            CellIndex::Grid(bins)
                if bins.len() == self.resolution.len()
                    && bins.iter().zip(&self.resolution).all(|(b, r)| b < r) =>
            {
                Some(bins.iter().zip(&self.strides).map(|(b, s)| b * s).sum())
            }
            _ => None,
        }
    }

    fn dense_shape(&self) -> Option<&[usize]> {
        Some(&self.resolution)
    }
}

/// Centroidal Voronoi tessellation: each cell is the region nearest one centroid.
#[derive(Debug, Clone)]
pub struct CvtIndexer {
    /// Flattened `k * dim` centroid coordinates.
    centroids: Vec<f64>,
    dim: usize,
}

impl CvtIndexer {
    /// Compute `k` centroids by Lloyd's k-means over `samples` uniform points
    /// drawn inside `bounds`.
    pub fn new(
        k: usize,
        bounds: &[(f64, f64)],
        samples: usize,
        iterations: usize,
        rng: &mut QdRng,
    ) -> Result<Self, ConfigError> {
        let mut config = ArchiveConfig::cvt(k, bounds.to_vec());
        if let Discretization::Cvt {
            samples: s,
            iterations: i,
            ..
        } = &mut config.discretization
        {
            *s = samples;
            *i = iterations;
        }
        config.validate()?;

        let dim = bounds.len();
        let points: Vec<f64> = (0..samples)
            .flat_map(|_| bounds.iter().map(|&(low, high)| rng.uniform(low, high)).collect::<Vec<_>>())
            .collect();

        // Samples are i.i.d., so the first k are an unbiased initialization.
        let mut centroids = points[..k * dim].to_vec();
        let mut sums = vec![0.0; k * dim];
        let mut counts = vec![0usize; k];

        let mut performed = 0;
        for _ in 0..iterations {
            performed += 1;
            let assignments: Vec<usize> = points
                .par_chunks(dim)
                .map(|p| nearest(&centroids, dim, p))
                .collect();

            sums.iter_mut().for_each(|s| *s = 0.0);
            counts.iter_mut().for_each(|c| *c = 0);
            for (p, &c) in points.chunks(dim).zip(&assignments) {
                counts[c] += 1;
                for (s, x) in sums[c * dim..(c + 1) * dim].iter_mut().zip(p) {
                    *s += x;
                }
            }

            let mut shift = 0.0;
            for c in 0..k {
                // Empty clusters keep their previous position.
                if counts[c] == 0 {
                    continue;
                }
                for d in 0..dim {
                    let updated = sums[c * dim + d] / counts[c] as f64;
                    shift += (updated - centroids[c * dim + d]).powi(2);
                    centroids[c * dim + d] = updated;
                }
            }

            if shift < 1e-12 {
                break;
            }
        }

        debug!(
            "CVT: {} centroids from {} samples after {} k-means iterations",
            k, samples, performed
        );

        Ok(Self { centroids, dim })
    }

    /// Use precomputed centroids.
    pub fn from_centroids(points: Vec<Vec<f64>>) -> Result<Self, ConfigError> {
        let dim = points.first().map_or(0, Vec::len);
        if points.is_empty() || dim == 0 {
            return Err(ConfigError::NoCentroids);
        }
        if let Some(bad) = points.iter().find(|p| p.len() != dim) {
            return Err(ConfigError::DimensionMismatch {
                what: "custom centroid",
                expected: dim,
                got: bad.len(),
            });
        }
        Ok(Self {
            centroids: points.into_iter().flatten().collect(),
            dim,
        })
    }

    /// Coordinates of centroid `id`.
    pub fn centroid(&self, id: usize) -> &[f64] {
        &self.centroids[id * self.dim..(id + 1) * self.dim]
    }

    /// Iterate over all centroids in id order.
    pub fn centroids(&self) -> impl Iterator<Item = &[f64]> {
        self.centroids.chunks(self.dim)
    }
}

/// Id of the centroid closest to `point`; ties go to the lowest id.
fn nearest(centroids: &[f64], dim: usize, point: &[f64]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (id, c) in centroids.chunks(dim).enumerate() {
        let dist: f64 = c
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = id;
        }
    }
    best
}

impl DescriptorIndexer for CvtIndexer {
    fn index_of(&self, descriptor: &[f64]) -> usize {
        nearest(&self.centroids, self.dim, descriptor)
    }

    fn num_cells(&self) -> usize {
        self.centroids.len() / self.dim
    }

    fn descriptor_dim(&self) -> usize {
        self.dim
    }

    fn cell_index(&self, flat: usize) -> CellIndex {
        CellIndex::Centroid(flat)
    }

    fn flat_index(&self, index: &CellIndex) -> Option<usize> {
        match index {
            CellIndex::Centroid(id) if *id < self.num_cells() => Some(*id),
            _ => None,
        }
    }

    fn dense_shape(&self) -> Option<&[usize]> {
        None
    }

    fn centroid_points(&self) -> Option<Vec<Vec<f64>>> {
        Some(self.centroids().map(<[f64]>::to_vec).collect())
    }
}
