//! MAP-Elites archive: one elite per cell of a discretized descriptor space.
//!
//! Cells live in contiguous storage indexed by the indexer's flat index, so a
//! dense export is a single pass in cell order. Statistics (`num_elites`,
//! `qd_score`, `obj_mean`, `obj_max`) are maintained on every insert and only
//! recomputed by a full scan when an archive is loaded from a snapshot.

use std::fmt;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::schema::{ArchiveConfig, ArchiveStats, ConfigError, Discretization};

use super::indexer::{CellIndex, DescriptorIndexer, build_indexer};
use super::{Evaluation, QdRng, Solution};

/// Outcome class of an insert.
///
/// Ordered so that `New > ImproveExisting > NotAdded`, which is the ranking
/// used by the improvement emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AddStatus {
    /// The candidate did not beat the cell's elite.
    NotAdded,
    /// The candidate replaced a worse elite.
    ImproveExisting,
    /// The candidate filled an empty cell.
    New,
}

/// Status of an insert plus its value.
///
/// `value` is the objective for [`AddStatus::New`] and the objective minus the
/// incumbent's objective otherwise (non-positive for `NotAdded`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddOutcome {
    /// Outcome class.
    pub status: AddStatus,
    /// Improvement value.
    pub value: f64,
}

/// Archive errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArchiveError {
    #[error("Cannot re-initialize an archive")]
    AlreadyInitialized,
    #[error("Archive has no elites")]
    Empty,
    #[error("Batch has {solutions} solutions but {evaluations} evaluations")]
    BatchMismatch { solutions: usize, evaluations: usize },
    #[error("A multi-archive needs at least one archive")]
    NoArchives,
    #[error("Invalid archive configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Elite container that emitters sample parents from and insert results into.
///
/// Implemented by [`Archive`] and by [`MultiArchive`](super::MultiArchive).
pub trait ElitePool<S, M> {
    /// Whether no elite is stored.
    fn is_empty(&self) -> bool;

    /// Draw an elite uniformly among all stored elites.
    fn sample_random_elite(&self, rng: &mut QdRng) -> Result<Elite<S, M>, ArchiveError>;

    /// Insert a solution with its evaluation.
    fn insert_evaluated(&mut self, solution: S, evaluation: Evaluation<M>) -> AddOutcome;
}

/// Stored contents of an occupied cell.
#[derive(Debug, Clone)]
struct Cell<S, M> {
    solution: S,
    objective: f64,
    descriptor: Vec<f64>,
    metadata: Option<M>,
}

/// Read-only snapshot of one elite.
///
/// Owns copies of the cell contents, so later inserts never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elite<S, M> {
    /// The stored solution.
    pub solution: S,
    /// Its objective.
    pub objective: f64,
    /// Its descriptor.
    pub descriptor: Vec<f64>,
    /// Address of its cell.
    pub index: CellIndex,
    /// Metadata stored with it.
    pub metadata: Option<M>,
}

/// Archive of elites over a discretized descriptor space.
pub struct Archive<S, M = ()> {
    config: ArchiveConfig,
    indexer: Box<dyn DescriptorIndexer>,
    /// One slot per cell; empty until initialized.
    cells: Vec<Option<Cell<S, M>>>,
    /// Flat indices of occupied cells, in order of first insertion.
    occupied: Vec<usize>,
    solution_dim: Option<usize>,
    stats: ArchiveStats,
}

impl<S, M> fmt::Debug for Archive<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("indexer", &self.indexer)
            .field("solution_dim", &self.solution_dim)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<S: Solution, M: Clone> Archive<S, M> {
    /// Create an archive; builds the indexer (running k-means for CVT).
    pub fn new(config: ArchiveConfig) -> Result<Self, ConfigError> {
        let indexer = build_indexer(&config)?;
        debug!(
            "Archive: {} cells over {} descriptor dimensions",
            indexer.num_cells(),
            indexer.descriptor_dim()
        );
        Ok(Self {
            config,
            indexer,
            cells: Vec::new(),
            occupied: Vec::new(),
            solution_dim: None,
            stats: ArchiveStats::default(),
        })
    }

    /// Allocate cell storage for solutions of `solution_dim` parameters.
    ///
    /// Inserting into an uninitialized archive initializes it from the first
    /// solution, after which this fails too.
    pub fn initialize(&mut self, solution_dim: usize) -> Result<(), ArchiveError> {
        if self.is_initialized() {
            return Err(ArchiveError::AlreadyInitialized);
        }
        self.allocate(solution_dim);
        Ok(())
    }

    fn allocate(&mut self, solution_dim: usize) {
        self.cells = (0..self.indexer.num_cells()).map(|_| None).collect();
        self.occupied.clear();
        self.solution_dim = Some(solution_dim);
        self.stats = ArchiveStats::default();
    }

    /// Whether storage has been allocated.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.solution_dim.is_some()
    }

    /// Solution dimensionality fixed at initialization.
    pub fn solution_dim(&self) -> Option<usize> {
        self.solution_dim
    }

    /// Descriptor dimensionality.
    pub fn descriptor_dim(&self) -> usize {
        self.indexer.descriptor_dim()
    }

    /// The descriptor indexer.
    pub fn indexer(&self) -> &dyn DescriptorIndexer {
        self.indexer.as_ref()
    }

    /// Configuration the archive was built from.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Total number of cells.
    pub fn capacity(&self) -> usize {
        self.indexer.num_cells()
    }

    /// Number of occupied cells.
    #[inline]
    pub fn num_elites(&self) -> usize {
        self.stats.num_elites
    }

    /// Whether no cell is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    /// Snapshot of the running statistics.
    #[inline]
    pub fn stats(&self) -> ArchiveStats {
        self.stats
    }

    /// Fraction of cells occupied.
    pub fn coverage(&self) -> f64 {
        self.stats.coverage
    }

    /// Attempt to insert a solution.
    ///
    /// The cell is replaced only when `objective` is strictly greater than the
    /// incumbent's; ties keep the existing elite. Out-of-range descriptors are
    /// clipped to the archive bounds (NaN to the lower bound) and stored
    /// clipped, so this never fails. Non-finite objectives and solutions whose
    /// length differs from the archive's solution dimension are never stored
    /// and report `NotAdded` with a value of negative infinity.
    pub fn insert(
        &mut self,
        solution: S,
        objective: f64,
        descriptor: Vec<f64>,
        metadata: Option<M>,
    ) -> AddOutcome {
        let rejected = AddOutcome {
            status: AddStatus::NotAdded,
            value: f64::NEG_INFINITY,
        };

        let len = solution.params().len();
        match self.solution_dim {
            None => self.allocate(len),
            Some(dim) if dim != len => {
                warn!("Rejecting solution of length {} (archive holds {})", len, dim);
                return rejected;
            }
            Some(_) => {}
        }

        let descriptor = self.clip_descriptor(descriptor);
        let index = self.indexer.index_of(&descriptor);

        if !objective.is_finite() {
            return rejected;
        }

        match &mut self.cells[index] {
            Some(cell) if objective > cell.objective => {
                let old = cell.objective;
                cell.solution = solution;
                cell.objective = objective;
                cell.descriptor = descriptor;
                cell.metadata = metadata;
                self.stats_update(old, objective);
                AddOutcome {
                    status: AddStatus::ImproveExisting,
                    value: objective - old,
                }
            }
            Some(cell) => AddOutcome {
                status: AddStatus::NotAdded,
                value: objective - cell.objective,
            },
            slot @ None => {
                *slot = Some(Cell {
                    solution,
                    objective,
                    descriptor,
                    metadata,
                });
                self.occupied.push(index);
                self.stats.num_elites += 1;
                self.stats_update(0.0, objective);
                AddOutcome {
                    status: AddStatus::New,
                    value: objective,
                }
            }
        }
    }

    /// Clamp each coordinate into the archive bounds; NaN maps to the lower bound.
    fn clip_descriptor(&self, mut descriptor: Vec<f64>) -> Vec<f64> {
        for (x, &(low, high)) in descriptor.iter_mut().zip(&self.config.bounds) {
            *x = if x.is_nan() { low } else { (*x).clamp(low, high) };
        }
        descriptor
    }

    /// Insert a solution with its evaluation.
    #[inline]
    pub fn insert_evaluated(&mut self, solution: S, evaluation: Evaluation<M>) -> AddOutcome {
        self.insert(
            solution,
            evaluation.objective,
            evaluation.descriptor,
            evaluation.metadata,
        )
    }

    /// Insert each solution in order.
    ///
    /// Later entries may improve on earlier ones landing in the same cell.
    pub fn add_batch(
        &mut self,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Vec<AddOutcome>, ArchiveError> {
        if solutions.len() != evaluations.len() {
            return Err(ArchiveError::BatchMismatch {
                solutions: solutions.len(),
                evaluations: evaluations.len(),
            });
        }
        Ok(solutions
            .into_iter()
            .zip(evaluations)
            .map(|(solution, evaluation)| self.insert_evaluated(solution, evaluation))
            .collect())
    }

    /// Fold one objective change into the statistics; `num_elites` must
    /// already count the cell.
    fn stats_update(&mut self, old: f64, new: f64) {
        self.stats.qd_score += new - old;
        self.stats.obj_mean = Some(self.stats.qd_score / self.stats.num_elites as f64);
        self.stats.obj_max = Some(self.stats.obj_max.map_or(new, |max| max.max(new)));
        self.stats.coverage = self.stats.num_elites as f64 / self.capacity() as f64;
    }

    /// Recompute statistics from the cells.
    fn recompute_stats(&mut self) {
        let mut stats = ArchiveStats::default();
        for &index in &self.occupied {
            if let Some(cell) = &self.cells[index] {
                stats.num_elites += 1;
                stats.qd_score += cell.objective;
                stats.obj_max = Some(stats.obj_max.map_or(cell.objective, |m| m.max(cell.objective)));
            }
        }
        if stats.num_elites > 0 {
            stats.obj_mean = Some(stats.qd_score / stats.num_elites as f64);
            stats.coverage = stats.num_elites as f64 / self.capacity() as f64;
        }
        self.stats = stats;
    }

    fn elite_at(&self, index: usize) -> Option<Elite<S, M>> {
        self.cells.get(index)?.as_ref().map(|cell| Elite {
            solution: cell.solution.clone(),
            objective: cell.objective,
            descriptor: cell.descriptor.clone(),
            index: self.indexer.cell_index(index),
            metadata: cell.metadata.clone(),
        })
    }

    /// Draw an elite uniformly among occupied cells, regardless of objective.
    pub fn sample_random_elite<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Elite<S, M>, ArchiveError> {
        if self.occupied.is_empty() {
            return Err(ArchiveError::Empty);
        }
        self.occupied_elite(rng.gen_range(0..self.occupied.len()))
            .ok_or(ArchiveError::Empty)
    }

    /// The `k`-th occupied cell's elite, in order of first insertion.
    pub(super) fn occupied_elite(&self, k: usize) -> Option<Elite<S, M>> {
        self.elite_at(*self.occupied.get(k)?)
    }

    /// Elite stored at a cell address.
    pub fn get(&self, index: &CellIndex) -> Option<Elite<S, M>> {
        self.elite_at(self.indexer.flat_index(index)?)
    }

    /// Elite of the cell a descriptor falls into.
    pub fn elite_for(&self, descriptor: &[f64]) -> Option<Elite<S, M>> {
        self.elite_at(self.indexer.index_of(descriptor))
    }

    /// All elites, in cell order.
    pub fn elites(&self) -> impl Iterator<Item = Elite<S, M>> + '_ {
        (0..self.cells.len()).filter_map(|index| self.elite_at(index))
    }

    /// Elite with the highest objective.
    pub fn best_elite(&self) -> Option<Elite<S, M>> {
        let best = self
            .occupied
            .iter()
            .copied()
            .filter_map(|i| self.cells[i].as_ref().map(|c| (i, c.objective)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        self.elite_at(best.0)
    }

    /// Remove every elite and reset statistics; the discretization is kept.
    pub fn clear(&mut self) {
        for &index in &self.occupied {
            self.cells[index] = None;
        }
        self.occupied.clear();
        self.stats = ArchiveStats::default();
    }

    /// Export the archive as channel-major `[objective, descriptor.., solution..]`.
    ///
    /// Grid archives export every cell (empty cells are NaN); CVT archives
    /// export only occupied cells, tagged with their centroid ids.
    pub fn export(&self, include_metadata: bool) -> ArchiveExport<M> {
        let descriptor_dim = self.descriptor_dim();
        let solution_dim = self.solution_dim.unwrap_or(0);
        let channels = 1 + descriptor_dim + solution_dim;

        let (layout, rows): (ExportLayout, Vec<usize>) = match self.indexer.dense_shape() {
            Some(shape) => (
                ExportLayout::Dense {
                    shape: shape.to_vec(),
                },
                (0..self.capacity()).collect(),
            ),
            None => {
                let mut indices: Vec<usize> = self.occupied.clone();
                indices.sort_unstable();
                (
                    ExportLayout::Elites {
                        indices: indices.clone(),
                    },
                    indices,
                )
            }
        };

        let n = rows.len();
        let mut data = vec![f64::NAN; channels * n];
        let mut metadata = include_metadata.then(|| Vec::with_capacity(n));

        for (row, &index) in rows.iter().enumerate() {
            let cell = self.cells.get(index).and_then(Option::as_ref);
            if let Some(cell) = cell {
                data[row] = cell.objective;
                for (d, &x) in cell.descriptor.iter().take(descriptor_dim).enumerate() {
                    data[(1 + d) * n + row] = x;
                }
                for (p, &x) in cell.solution.params().iter().take(solution_dim).enumerate() {
                    data[(1 + descriptor_dim + p) * n + row] = x;
                }
            }
            if let Some(meta) = metadata.as_mut() {
                meta.push(cell.and_then(|c| c.metadata.clone()));
            }
        }

        ArchiveExport {
            layout,
            channels,
            descriptor_dim,
            solution_dim,
            data,
            metadata,
        }
    }
}

impl<S: Solution, M: Clone> ElitePool<S, M> for Archive<S, M> {
    #[inline]
    fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }

    fn sample_random_elite(&self, rng: &mut QdRng) -> Result<Elite<S, M>, ArchiveError> {
        Archive::sample_random_elite(self, rng)
    }

    #[inline]
    fn insert_evaluated(&mut self, solution: S, evaluation: Evaluation<M>) -> AddOutcome {
        Archive::insert_evaluated(self, solution, evaluation)
    }
}

impl<S, M> Archive<S, M>
where
    S: Solution + Serialize + for<'de> Deserialize<'de>,
    M: Clone + Serialize + for<'de> Deserialize<'de>,
{
    /// Serializable copy of the archive contents.
    ///
    /// CVT archives embed their centroids so a reload reproduces the cells.
    pub fn snapshot(&self) -> ArchiveSnapshot<S, M> {
        let mut config = self.config.clone();
        if let (Discretization::Cvt {
            custom_centroids, ..
        }, Some(points)) = (&mut config.discretization, self.indexer.centroid_points())
        {
            *custom_centroids = Some(points);
        }
        ArchiveSnapshot {
            config,
            solution_dim: self.solution_dim,
            elites: self.elites().collect(),
        }
    }

    /// Rebuild an archive from a snapshot, recomputing statistics by one scan.
    pub fn from_snapshot(snapshot: ArchiveSnapshot<S, M>) -> Result<Self, ArchiveError> {
        let mut archive = Self::new(snapshot.config)?;
        if let Some(dim) = snapshot.solution_dim {
            archive.allocate(dim);
        }

        for elite in snapshot.elites {
            if !archive.is_initialized() {
                archive.allocate(elite.solution.params().len());
            }
            if archive.solution_dim != Some(elite.solution.params().len()) {
                continue;
            }
            let descriptor = archive.clip_descriptor(elite.descriptor);
            let index = archive.indexer.index_of(&descriptor);
            let slot = &mut archive.cells[index];
            let replace = match slot {
                Some(cell) => elite.objective > cell.objective,
                None => {
                    archive.occupied.push(index);
                    true
                }
            };
            if replace && elite.objective.is_finite() {
                *slot = Some(Cell {
                    solution: elite.solution,
                    objective: elite.objective,
                    descriptor,
                    metadata: elite.metadata,
                });
            }
        }

        archive.occupied.retain(|&i| archive.cells[i].is_some());
        archive.recompute_stats();
        Ok(archive)
    }
}

/// Row layout of an [`ArchiveExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportLayout {
    /// One row per grid cell, row-major over `shape`.
    Dense {
        /// Bins per descriptor dimension.
        shape: Vec<usize>,
    },
    /// One row per occupied cell, with its centroid id.
    Elites {
        /// Centroid id of each row.
        indices: Vec<usize>,
    },
}

/// Channel-major numeric export of an archive.
///
/// `data[channel * rows + row]`, with channels
/// `[objective, descriptor_0.., solution_0..]`. Empty cells hold NaN.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveExport<M> {
    /// Row layout.
    pub layout: ExportLayout,
    /// Channels per row.
    pub channels: usize,
    /// Descriptor channels.
    pub descriptor_dim: usize,
    /// Solution channels.
    pub solution_dim: usize,
    /// Channel-major values.
    pub data: Vec<f64>,
    /// Per-row metadata, when requested.
    pub metadata: Option<Vec<Option<M>>>,
}

impl<M> ArchiveExport<M> {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.data.len().checked_div(self.channels).unwrap_or(0)
    }

    /// Value of one channel in one row.
    pub fn value(&self, channel: usize, row: usize) -> f64 {
        self.data[channel * self.rows() + row]
    }

    /// Objective channel of a row.
    pub fn objective(&self, row: usize) -> f64 {
        self.value(0, row)
    }

    /// All channels of one row.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.channels).map(|c| self.value(c, row)).collect()
    }

    /// One channel across all rows.
    pub fn channel(&self, channel: usize) -> &[f64] {
        let rows = self.rows();
        &self.data[channel * rows..(channel + 1) * rows]
    }
}

/// Persisted archive contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSnapshot<S, M> {
    /// Discretization of the archive.
    pub config: ArchiveConfig,
    /// Solution dimensionality, if initialized.
    pub solution_dim: Option<usize>,
    /// Stored elites.
    pub elites: Vec<Elite<S, M>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_archive(res: usize) -> Archive<Vec<f64>, String> {
        Archive::new(ArchiveConfig::grid(vec![res, res], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap()
    }

    #[test]
    fn test_insert_scenario() {
        let mut archive = unit_archive(2);
        archive.initialize(1).unwrap();

        let out = archive.insert(vec![0.1], 1.0, vec![0.1, 0.1], None);
        assert_eq!(out.status, AddStatus::New);
        assert_eq!(out.value, 1.0);
        assert_eq!(archive.num_elites(), 1);

        let out = archive.insert(vec![0.2], 0.5, vec![0.1, 0.1], None);
        assert_eq!(out.status, AddStatus::NotAdded);
        assert!((out.value + 0.5).abs() < 1e-12);
        let elite = archive.elite_for(&[0.1, 0.1]).unwrap();
        assert_eq!(elite.solution, vec![0.1]);

        let out = archive.insert(vec![0.3], 2.0, vec![0.1, 0.1], None);
        assert_eq!(out.status, AddStatus::ImproveExisting);
        assert!((out.value - 1.0).abs() < 1e-12);
        assert_eq!(archive.elite_for(&[0.1, 0.1]).unwrap().objective, 2.0);

        let out = archive.insert(vec![0.4], 0.9, vec![0.9, 0.9], None);
        assert_eq!(out.status, AddStatus::New);
        let stats = archive.stats();
        assert_eq!(stats.num_elites, 2);
        assert!((stats.qd_score - 2.9).abs() < 1e-12);
        assert!((stats.obj_mean.unwrap() - 1.45).abs() < 1e-12);
        assert_eq!(stats.obj_max, Some(2.0));
        assert!((stats.coverage - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tie_does_not_replace() {
        let mut archive = unit_archive(4);
        archive.insert(vec![1.0], 3.0, vec![0.5, 0.5], Some("first".into()));
        let out = archive.insert(vec![2.0], 3.0, vec![0.5, 0.5], Some("second".into()));

        assert_eq!(out.status, AddStatus::NotAdded);
        assert_eq!(out.value, 0.0);
        let elite = archive.elite_for(&[0.5, 0.5]).unwrap();
        assert_eq!(elite.solution, vec![1.0]);
        assert_eq!(elite.metadata.as_deref(), Some("first"));
    }

    #[test]
    fn test_reinitialize_fails() {
        let mut archive = unit_archive(2);
        archive.initialize(3).unwrap();
        assert_eq!(archive.initialize(3), Err(ArchiveError::AlreadyInitialized));

        let mut lazy = unit_archive(2);
        lazy.insert(vec![0.0, 0.0], 1.0, vec![0.2, 0.2], None);
        assert_eq!(lazy.solution_dim(), Some(2));
        assert_eq!(lazy.initialize(2), Err(ArchiveError::AlreadyInitialized));
    }

    #[test]
    fn test_sample_empty() {
        let archive = unit_archive(2);
        let mut rng = QdRng::new(0);
        assert_eq!(
            archive.sample_random_elite(&mut rng).unwrap_err(),
            ArchiveError::Empty
        );
    }

    #[test]
    fn test_sample_returns_snapshot() {
        let mut archive = unit_archive(2);
        archive.insert(vec![0.5], 1.0, vec![0.1, 0.1], None);
        let mut rng = QdRng::new(0);
        let elite = archive.sample_random_elite(&mut rng).unwrap();

        archive.insert(vec![0.9], 5.0, vec![0.1, 0.1], None);
        assert_eq!(elite.solution, vec![0.5]);
        assert_eq!(elite.objective, 1.0);
        assert_eq!(elite.index, CellIndex::Grid(vec![0, 0]));
    }

    #[test]
    fn test_add_batch_order() {
        let mut archive = unit_archive(2);
        let outcomes = archive
            .add_batch(
                vec![vec![1.0], vec![2.0]],
                vec![
                    Evaluation::new(1.0, vec![0.2, 0.2]),
                    Evaluation::new(2.0, vec![0.3, 0.3]),
                ],
            )
            .unwrap();

        assert_eq!(outcomes[0].status, AddStatus::New);
        assert_eq!(outcomes[1].status, AddStatus::ImproveExisting);
        assert_eq!(archive.elite_for(&[0.2, 0.2]).unwrap().solution, vec![2.0]);

        let err = archive.add_batch(vec![vec![1.0]], Vec::new()).unwrap_err();
        assert!(matches!(err, ArchiveError::BatchMismatch { .. }));
    }

    #[test]
    fn test_non_finite_objective() {
        let mut archive = unit_archive(2);
        let out = archive.insert(vec![0.0], f64::NAN, vec![0.5, 0.5], None);
        assert_eq!(out.status, AddStatus::NotAdded);
        assert!(archive.is_empty());
        assert_eq!(archive.stats().qd_score, 0.0);
    }

    #[test]
    fn test_clear() {
        let mut archive = unit_archive(3);
        archive.insert(vec![0.0], 1.0, vec![0.1, 0.1], None);
        archive.insert(vec![0.0], 1.0, vec![0.9, 0.9], None);
        archive.clear();

        assert!(archive.is_empty());
        assert_eq!(archive.stats(), ArchiveStats::default());
        assert_eq!(archive.insert(vec![0.0], 1.0, vec![0.1, 0.1], None).status, AddStatus::New);
    }

    #[test]
    fn test_dense_export() {
        let mut archive = unit_archive(2);
        archive.insert(vec![0.7, 0.8], 1.5, vec![0.9, 0.1], Some("meta".into()));

        let export = archive.export(true);
        assert_eq!(export.layout, ExportLayout::Dense { shape: vec![2, 2] });
        assert_eq!(export.channels, 1 + 2 + 2);
        assert_eq!(export.rows(), 4);

        // Cell (1, 0) is flat index 2.
        assert_eq!(export.row(2), vec![1.5, 0.9, 0.1, 0.7, 0.8]);
        assert!(export.objective(0).is_nan());
        assert!(export.channel(3).iter().filter(|x| x.is_nan()).count() == 3);

        let meta = export.metadata.unwrap();
        assert_eq!(meta[2].as_deref(), Some("meta"));
        assert!(meta[0].is_none());

        assert!(archive.export(false).metadata.is_none());
    }

    #[test]
    fn test_cvt_export_lists_elites() {
        let mut config = ArchiveConfig::cvt(3, vec![(0.0, 1.0), (0.0, 1.0)]);
        if let Discretization::Cvt {
            custom_centroids, ..
        } = &mut config.discretization
        {
            *custom_centroids = Some(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
        }
        let mut archive: Archive<Vec<f64>> = Archive::new(config).unwrap();
        archive.insert(vec![3.0], 2.0, vec![0.1, 0.9], None);
        archive.insert(vec![4.0], 1.0, vec![0.1, 0.0], None);

        let export = archive.export(false);
        assert_eq!(export.layout, ExportLayout::Elites { indices: vec![0, 2] });
        assert_eq!(export.rows(), 2);
        assert_eq!(export.row(0), vec![1.0, 0.1, 0.0, 4.0]);
        assert_eq!(export.row(1), vec![2.0, 0.1, 0.9, 3.0]);
    }

    #[test]
    fn test_snapshot_reload() {
        let mut archive = unit_archive(4);
        archive.insert(vec![0.1], 1.0, vec![0.1, 0.1], Some("a".into()));
        archive.insert(vec![0.2], 2.5, vec![0.6, 0.9], Some("b".into()));
        archive.insert(vec![0.3], 3.0, vec![0.1, 0.1], None);

        let json = serde_json::to_string(&archive.snapshot()).unwrap();
        let snapshot: ArchiveSnapshot<Vec<f64>, String> = serde_json::from_str(&json).unwrap();
        let restored = Archive::from_snapshot(snapshot).unwrap();

        assert_eq!(restored.stats(), archive.stats());
        assert_eq!(restored.elites().collect::<Vec<_>>(), archive.elites().collect::<Vec<_>>());
    }

    #[test]
    fn test_cvt_snapshot_embeds_centroids() {
        let config = ArchiveConfig::cvt(6, vec![(0.0, 1.0), (0.0, 1.0)]).with_seed(5);
        let mut archive: Archive<Vec<f64>, String> = Archive::new(config).unwrap();
        archive.insert(vec![0.1], 1.0, vec![0.1, 0.1], Some("a".into()));
        archive.insert(vec![0.2], 2.0, vec![0.9, 0.8], None);
        archive.insert(vec![0.3], 3.0, vec![0.5, 0.4], None);

        let snapshot = archive.snapshot();
        let Discretization::Cvt {
            custom_centroids: Some(points),
            ..
        } = &snapshot.config.discretization
        else {
            panic!("CVT snapshot without centroids");
        };
        assert_eq!(points.len(), 6);

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored =
            Archive::from_snapshot(serde_json::from_str::<ArchiveSnapshot<Vec<f64>, String>>(&json).unwrap())
                .unwrap();

        let original = archive.indexer().centroid_points().unwrap();
        let reloaded = restored.indexer().centroid_points().unwrap();
        for (a, b) in original.iter().flatten().zip(reloaded.iter().flatten()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(restored.stats(), archive.stats());
        for elite in archive.elites() {
            let back = restored.get(&elite.index).unwrap();
            assert_eq!(back.solution, elite.solution);
            assert_eq!(back.metadata, elite.metadata);
        }
    }

    #[test]
    fn test_descriptor_stored_clipped() {
        let mut archive = unit_archive(2);
        archive.insert(vec![1.0], 1.0, vec![f64::INFINITY, -3.0], None);
        archive.insert(vec![2.0], 1.0, vec![f64::NAN, 0.7], None);

        assert_eq!(archive.elite_for(&[1.0, 0.0]).unwrap().descriptor, vec![1.0, 0.0]);
        assert_eq!(archive.elite_for(&[0.0, 0.7]).unwrap().descriptor, vec![0.0, 0.7]);
    }

    #[test]
    fn test_solution_length_mismatch_rejected() {
        let mut archive = unit_archive(2);
        archive.insert(vec![0.0, 0.0], 1.0, vec![0.1, 0.1], None);

        let out = archive.insert(vec![5.0], 9.0, vec![0.1, 0.1], None);
        assert_eq!(out.status, AddStatus::NotAdded);
        assert_eq!(out.value, f64::NEG_INFINITY);
        let out = archive.insert(vec![5.0; 3], 9.0, vec![0.9, 0.9], None);
        assert_eq!(out.status, AddStatus::NotAdded);

        assert_eq!(archive.num_elites(), 1);
        assert!(archive.elites().all(|e| e.solution.len() == 2));
    }

    #[test]
    fn test_best_elite_and_get() {
        let mut archive = unit_archive(2);
        assert!(archive.best_elite().is_none());
        archive.insert(vec![0.0], -1.0, vec![0.1, 0.1], None);
        archive.insert(vec![1.0], 4.0, vec![0.9, 0.1], None);

        let best = archive.best_elite().unwrap();
        assert_eq!(best.solution, vec![1.0]);
        assert_eq!(archive.get(&best.index).unwrap().objective, 4.0);
        assert!(archive.get(&CellIndex::Grid(vec![1, 1])).is_none());
        assert_eq!(archive.elites().count(), 2);
    }
}
