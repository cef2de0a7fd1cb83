//! Run statistics, progress reports and history for logging collaborators.

use serde::{Deserialize, Serialize};

use crate::compute::AddStatus;

/// Running archive statistics, maintained incrementally on insert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ArchiveStats {
    /// Number of occupied cells.
    pub num_elites: usize,
    /// Fraction of cells occupied.
    pub coverage: f64,
    /// Mean objective over occupied cells.
    pub obj_mean: Option<f64>,
    /// Best objective ever stored.
    pub obj_max: Option<f64>,
    /// Sum of objectives over occupied cells.
    pub qd_score: f64,
}

/// Insertion outcome counts for one `tell` (NOT_ADDED / IMPROVED / NEW).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Pulse {
    /// Candidates that did not beat the cell's elite.
    pub not_added: usize,
    /// Candidates that replaced an existing elite.
    pub improved: usize,
    /// Candidates that filled an empty cell.
    pub new: usize,
}

impl Pulse {
    /// Count one insertion outcome.
    #[inline]
    pub fn record(&mut self, status: AddStatus) {
        match status {
            AddStatus::NotAdded => self.not_added += 1,
            AddStatus::ImproveExisting => self.improved += 1,
            AddStatus::New => self.new += 1,
        }
    }

    /// Candidates that were added or improved a cell.
    #[inline]
    pub fn successes(&self) -> usize {
        self.improved + self.new
    }

    /// Total candidates counted.
    #[inline]
    pub fn total(&self) -> usize {
        self.not_added + self.improved + self.new
    }
}

/// Per-generation metrics for plotting and persistence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunHistory {
    /// Generation number of each row (0 is the bootstrap).
    pub generations: Vec<usize>,
    /// Archive size per generation.
    pub archive_size: Vec<usize>,
    /// Mean objective per generation.
    pub obj_mean: Vec<Option<f64>>,
    /// Max objective per generation.
    pub obj_max: Vec<Option<f64>>,
    /// QD score per generation.
    pub qd_score: Vec<f64>,
    /// Evaluations performed up to each generation.
    pub evaluations: Vec<u64>,
    /// Seconds since the run started, per generation.
    pub elapsed_seconds: Vec<f64>,
    /// Emitter names, in emitter order.
    pub emitter_names: Vec<String>,
    /// Pulse rows, one vector (emitter order) per generation.
    pub pulses: Vec<Vec<Pulse>>,
}

impl RunHistory {
    /// Append one generation's metrics.
    pub fn record(
        &mut self,
        generation: usize,
        evaluations: u64,
        elapsed_seconds: f64,
        stats: &ArchiveStats,
        pulses: Vec<Pulse>,
    ) {
        self.generations.push(generation);
        self.archive_size.push(stats.num_elites);
        self.obj_mean.push(stats.obj_mean);
        self.obj_max.push(stats.obj_max);
        self.qd_score.push(stats.qd_score);
        self.evaluations.push(evaluations);
        self.elapsed_seconds.push(elapsed_seconds);
        self.pulses.push(pulses);
    }

    /// Number of recorded rows.
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}

/// Snapshot handed to progress callbacks after each generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    /// Completed generations.
    pub generation: usize,
    /// Configured generation count.
    pub total_generations: usize,
    /// Evaluations performed so far (bootstrap included).
    pub evaluations: u64,
    /// Current archive statistics.
    pub stats: ArchiveStats,
    /// Outcome counts of this generation, in emitter order.
    pub pulses: Vec<Pulse>,
    /// Wall time of this generation in seconds.
    pub generation_seconds: f64,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Generations completed.
    pub generations: usize,
    /// Total evaluations performed.
    pub total_evaluations: u64,
    /// Final archive statistics.
    pub archive: ArchiveStats,
    /// Restarts per emitter (zero for emitters without restarts).
    pub restarts: Vec<usize>,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Evaluations per second.
    pub evaluations_per_second: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Completed the configured number of generations.
    MaxGenerations,
    /// Cancelled between generations.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_counts() {
        let mut pulse = Pulse::default();
        pulse.record(AddStatus::New);
        pulse.record(AddStatus::NotAdded);
        pulse.record(AddStatus::ImproveExisting);
        pulse.record(AddStatus::New);

        assert_eq!(
            pulse,
            Pulse {
                not_added: 1,
                improved: 1,
                new: 2
            }
        );
        assert_eq!(pulse.successes(), 3);
        assert_eq!(pulse.total(), 4);
    }

    #[test]
    fn test_history_record() {
        let mut history = RunHistory::default();
        let stats = ArchiveStats {
            num_elites: 3,
            coverage: 0.75,
            obj_mean: Some(1.0),
            obj_max: Some(2.0),
            qd_score: 3.0,
        };
        history.record(0, 10, 0.5, &stats, Vec::new());
        history.record(1, 20, 1.5, &stats, vec![Pulse::default()]);

        assert_eq!(history.len(), 2);
        assert_eq!(history.archive_size, vec![3, 3]);
        assert_eq!(history.evaluations, vec![10, 20]);

        let json = serde_json::to_string(&history).unwrap();
        let parsed: RunHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.qd_score, history.qd_score);
    }
}
