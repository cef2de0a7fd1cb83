//! MAP-Elites run loop: bootstrap, build emitters, then ask/evaluate/tell.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info};

use crate::schema::{
    ConfigError, Pulse, RunConfig, RunHistory, RunProgress, RunStats, StopReason,
};

use super::{
    Archive, ArchiveError, BatchEvaluator, BuildEmitter, Domain, EvaluationError, Optimizer,
    OptimizerError, PersistError, QdRng, save_run,
};

/// Run errors.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("Failed to save run output: {0}")]
    Persist(#[from] PersistError),
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult<S, M> {
    /// Final archive.
    pub archive: Archive<S, M>,
    /// Per-generation metrics; row 0 is the bootstrap.
    pub history: RunHistory,
    /// Summary statistics.
    pub stats: RunStats,
}

/// MAP-Elites driver over a [`Domain`].
pub struct MapElites<D: Domain> {
    config: RunConfig,
    domain: D,
    evaluator: BatchEvaluator,
    cancelled: Arc<AtomicBool>,
}

impl<D> MapElites<D>
where
    D: Domain,
    D::Solution: BuildEmitter<D::Metadata>,
{
    /// Validate the configuration against the domain and prepare the evaluator.
    pub fn new(config: RunConfig, domain: D) -> Result<Self, RunError> {
        config.validate()?;
        if config.archive.descriptor_dim() != domain.descriptor_dim() {
            return Err(ConfigError::DimensionMismatch {
                what: "archive descriptor bounds",
                expected: domain.descriptor_dim(),
                got: config.archive.descriptor_dim(),
            }
            .into());
        }
        let evaluator = BatchEvaluator::new(config.workers)?;

        Ok(Self {
            config,
            domain,
            evaluator,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The domain.
    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Get cancellation handle; checked between generations.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Run to completion (blocking).
    pub fn run(&self) -> Result<RunResult<D::Solution, D::Metadata>, RunError> {
        self.run_with_callback(|_| {})
    }

    /// Run, reporting progress after every generation.
    pub fn run_with_callback<F>(&self, mut callback: F) -> Result<RunResult<D::Solution, D::Metadata>, RunError>
    where
        F: FnMut(&RunProgress),
    {
        let start_time = Instant::now();
        let mut rng = QdRng::from_optional_seed(self.config.seed);

        // Bootstrap
        let mut archive = Archive::new(self.config.archive.clone())?;
        let initial = self.domain.init(self.config.n_init, &mut rng);
        let evaluations = self.evaluator.evaluate(&self.domain, &initial)?;
        archive.add_batch(initial.clone(), evaluations)?;
        let mut total_evaluations = initial.len() as u64;
        info!(
            "Bootstrap: {} solutions, {} elites",
            initial.len(),
            archive.num_elites()
        );

        // Emitters without an explicit x0 start from a random bootstrap solution.
        let emitters = self
            .config
            .emitters
            .iter()
            .map(|config| {
                let x0 = (!initial.is_empty()).then(|| initial[rng.index(initial.len())].clone());
                <D::Solution as BuildEmitter<D::Metadata>>::build_emitter(
                    config,
                    x0,
                    self.config.param_bounds.as_ref(),
                    rng.next_seed(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut optimizer = Optimizer::new(archive, emitters)?;

        let mut history = RunHistory {
            emitter_names: optimizer.emitter_names(),
            ..RunHistory::default()
        };
        let idle_pulses = vec![Pulse::default(); self.config.emitters.len()];
        history.record(
            0,
            total_evaluations,
            start_time.elapsed().as_secs_f64(),
            &optimizer.archive().stats(),
            idle_pulses,
        );

        let generations = self.config.generations;
        let mut completed = 0;
        let mut stop_reason = StopReason::MaxGenerations;

        for generation in 1..=generations {
            if self.cancelled.load(Ordering::Relaxed) {
                stop_reason = StopReason::Cancelled;
                break;
            }
            let generation_start = Instant::now();

            let candidates = optimizer.ask()?;
            let evaluations = match self.evaluator.evaluate(&self.domain, &candidates) {
                Ok(evaluations) => evaluations,
                Err(e) => {
                    optimizer.abandon();
                    return Err(e.into());
                }
            };
            total_evaluations += candidates.len() as u64;
            let pulses = optimizer.tell(candidates, evaluations)?;
            completed = generation;

            let stats = optimizer.archive().stats();
            history.record(
                generation,
                total_evaluations,
                start_time.elapsed().as_secs_f64(),
                &stats,
                pulses.clone(),
            );

            if generation % self.config.log.print_rate == 0 {
                info!(
                    "Generation {}/{}: {} elites, qd_score={:.4}, obj_max={:.4}",
                    generation,
                    generations,
                    stats.num_elites,
                    stats.qd_score,
                    stats.obj_max.unwrap_or(f64::NAN)
                );
            }
            if let Some(dir) = &self.config.log.output_dir
                && generation % self.config.log.save_rate == 0
            {
                save_run(dir, &history, optimizer.archive(), self.config.log.save_metadata)?;
            }

            callback(&RunProgress {
                generation,
                total_generations: generations,
                evaluations: total_evaluations,
                stats,
                pulses,
                generation_seconds: generation_start.elapsed().as_secs_f64(),
            });
        }

        if let Some(dir) = &self.config.log.output_dir {
            save_run(dir, &history, optimizer.archive(), self.config.log.save_metadata)?;
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        let restarts = optimizer.restarts();
        let archive = optimizer.into_archive();
        debug!("Run finished after {} generations ({:?})", completed, stop_reason);

        Ok(RunResult {
            stats: RunStats {
                generations: completed,
                total_evaluations,
                archive: archive.stats(),
                restarts,
                elapsed_seconds: elapsed,
                evaluations_per_second: total_evaluations as f64 / elapsed.max(f64::EPSILON),
                stop_reason,
            },
            archive,
            history,
        })
    }
}
