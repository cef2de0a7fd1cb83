//! Several archives over the same descriptors, filled and sampled together.
//!
//! Every insert goes into every archive, so archives with different
//! discretizations of one descriptor space keep their own elites. Parents are
//! drawn uniformly over the union of occupied cells.

use log::debug;
use rand::Rng;

use crate::schema::{ArchiveConfig, ArchiveStats};

use super::{AddOutcome, AddStatus, Archive, ArchiveError, Elite, ElitePool, Evaluation, QdRng, Solution};

/// A set of archives sharing one stream of inserts.
#[derive(Debug)]
pub struct MultiArchive<S, M = ()> {
    archives: Vec<Archive<S, M>>,
}

impl<S: Solution, M: Clone> MultiArchive<S, M> {
    /// Build one archive per configuration.
    pub fn new(configs: Vec<ArchiveConfig>) -> Result<Self, ArchiveError> {
        let archives = configs
            .into_iter()
            .map(Archive::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_archives(archives)
    }

    /// Wrap existing archives.
    pub fn from_archives(archives: Vec<Archive<S, M>>) -> Result<Self, ArchiveError> {
        if archives.is_empty() {
            return Err(ArchiveError::NoArchives);
        }
        debug!(
            "Multi-archive over {} archives ({} cells)",
            archives.len(),
            archives.iter().map(Archive::capacity).sum::<usize>()
        );
        Ok(Self { archives })
    }

    /// Allocate storage in every archive.
    pub fn initialize(&mut self, solution_dim: usize) -> Result<(), ArchiveError> {
        self.archives
            .iter_mut()
            .try_for_each(|a| a.initialize(solution_dim))
    }

    /// The archives, in configuration order.
    pub fn archives(&self) -> &[Archive<S, M>] {
        &self.archives
    }

    /// Number of archives.
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    /// Whether every archive is empty.
    pub fn is_empty(&self) -> bool {
        self.archives.iter().all(Archive::is_empty)
    }

    /// Insert one solution into every archive; returns one outcome per archive.
    pub fn insert(
        &mut self,
        solution: S,
        objective: f64,
        descriptor: Vec<f64>,
        metadata: Option<M>,
    ) -> Vec<AddOutcome> {
        let last = self.archives.len() - 1;
        let mut outcomes = Vec::with_capacity(self.archives.len());
        for archive in &mut self.archives[..last] {
            outcomes.push(archive.insert(
                solution.clone(),
                objective,
                descriptor.clone(),
                metadata.clone(),
            ));
        }
        outcomes.push(self.archives[last].insert(solution, objective, descriptor, metadata));
        outcomes
    }

    /// Insert a batch into every archive, in batch order.
    ///
    /// `outcomes[a][i]` is the outcome of candidate `i` in archive `a`.
    pub fn add_batch(
        &mut self,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Vec<Vec<AddOutcome>>, ArchiveError> {
        if solutions.len() != evaluations.len() {
            return Err(ArchiveError::BatchMismatch {
                solutions: solutions.len(),
                evaluations: evaluations.len(),
            });
        }
        self.archives
            .iter_mut()
            .map(|archive| archive.add_batch(solutions.clone(), evaluations.clone()))
            .collect()
    }

    /// Draw an elite uniformly over the occupied cells of all archives.
    ///
    /// Archives holding more elites are proportionally more likely to be the
    /// source. Fails with [`ArchiveError::Empty`] only when every archive is empty.
    pub fn sample_random_elite<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Elite<S, M>, ArchiveError> {
        let total: usize = self.archives.iter().map(Archive::num_elites).sum();
        if total == 0 {
            return Err(ArchiveError::Empty);
        }
        let mut k = rng.gen_range(0..total);
        for archive in &self.archives {
            let n = archive.num_elites();
            if k < n {
                return archive.occupied_elite(k).ok_or(ArchiveError::Empty);
            }
            k -= n;
        }
        Err(ArchiveError::Empty)
    }

    /// Statistics of each archive.
    pub fn stats(&self) -> Vec<ArchiveStats> {
        self.archives.iter().map(Archive::stats).collect()
    }

    /// Occupied cells per archive.
    pub fn num_elites(&self) -> Vec<usize> {
        self.archives.iter().map(Archive::num_elites).collect()
    }

    /// Mean objective per archive.
    pub fn obj_mean(&self) -> Vec<Option<f64>> {
        self.archives.iter().map(|a| a.stats().obj_mean).collect()
    }

    /// QD score per archive.
    pub fn qd_score(&self) -> Vec<f64> {
        self.archives.iter().map(|a| a.stats().qd_score).collect()
    }
}

impl<S: Solution, M: Clone> ElitePool<S, M> for MultiArchive<S, M> {
    fn is_empty(&self) -> bool {
        MultiArchive::is_empty(self)
    }

    fn sample_random_elite(&self, rng: &mut QdRng) -> Result<Elite<S, M>, ArchiveError> {
        MultiArchive::sample_random_elite(self, rng)
    }

    /// Inserts into every archive and reports the best of the per-archive
    /// outcomes, so a candidate counts as new if any archive gained a cell.
    fn insert_evaluated(&mut self, solution: S, evaluation: Evaluation<M>) -> AddOutcome {
        let outcomes = self.insert(
            solution,
            evaluation.objective,
            evaluation.descriptor,
            evaluation.metadata,
        );
        outcomes
            .into_iter()
            .max_by(|a, b| a.status.cmp(&b.status).then_with(|| a.value.total_cmp(&b.value)))
            .unwrap_or(AddOutcome {
                status: AddStatus::NotAdded,
                value: f64::NEG_INFINITY,
            })
    }
}
