//! Optimizer: one elite container driven by several emitters through a combined ask/tell.

use crate::schema::Pulse;

use super::{Archive, ElitePool, Emitter, EmitterError, Evaluation, Solution};

/// Optimizer errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizerError {
    #[error("Optimizer needs at least one emitter")]
    NoEmitters,
    #[error("Optimizer was asked again before its batch was told")]
    AskPending,
    #[error("Optimizer was told results without a pending ask")]
    NoPendingAsk,
    #[error("Optimizer expected {expected} results, got {got}")]
    BatchMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Emitter(#[from] EmitterError),
}

/// Concatenates emitter batches on `ask` and routes results back on `tell`.
///
/// The archive is only mutated inside `tell`, on the caller's thread, in
/// emitter order and then batch order. `A` is a single [`Archive`] by
/// default; a [`MultiArchive`](super::MultiArchive) works the same way.
pub struct Optimizer<S: Solution, M, A = Archive<S, M>> {
    archive: A,
    emitters: Vec<Box<dyn Emitter<S, M, A>>>,
    /// Sub-batch lengths of the pending ask, in emitter order.
    pending: Option<Vec<usize>>,
}

impl<S: Solution, M: Clone, A: ElitePool<S, M>> Optimizer<S, M, A> {
    /// Create an optimizer.
    pub fn new(archive: A, emitters: Vec<Box<dyn Emitter<S, M, A>>>) -> Result<Self, OptimizerError> {
        if emitters.is_empty() {
            return Err(OptimizerError::NoEmitters);
        }
        Ok(Self {
            archive,
            emitters,
            pending: None,
        })
    }

    /// The archive.
    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Mutable access to the archive between generations.
    pub fn archive_mut(&mut self) -> &mut A {
        &mut self.archive
    }

    /// Consume the optimizer, keeping the archive.
    pub fn into_archive(self) -> A {
        self.archive
    }

    /// The emitters, in batch order.
    pub fn emitters(&self) -> &[Box<dyn Emitter<S, M, A>>] {
        &self.emitters
    }

    /// Emitter names, in batch order.
    pub fn emitter_names(&self) -> Vec<String> {
        self.emitters.iter().map(|e| e.name().to_string()).collect()
    }

    /// Restart counts, in emitter order.
    pub fn restarts(&self) -> Vec<usize> {
        self.emitters.iter().map(|e| e.restarts()).collect()
    }

    /// Ask every emitter and concatenate their batches.
    ///
    /// If an emitter fails, emitters already asked drop their batches.
    pub fn ask(&mut self) -> Result<Vec<S>, OptimizerError> {
        if self.pending.is_some() {
            return Err(OptimizerError::AskPending);
        }

        let mut solutions = Vec::new();
        let mut lengths = Vec::with_capacity(self.emitters.len());
        for i in 0..self.emitters.len() {
            match self.emitters[i].ask(&self.archive) {
                Ok(batch) => {
                    lengths.push(batch.len());
                    solutions.extend(batch);
                }
                Err(e) => {
                    self.emitters[..i].iter_mut().for_each(|e| e.abandon());
                    return Err(e.into());
                }
            }
        }

        self.pending = Some(lengths);
        Ok(solutions)
    }

    /// Split the evaluated batch at the emitter boundaries and tell each emitter.
    ///
    /// A length mismatch is rejected before anything is inserted, and the ask
    /// stays pending.
    pub fn tell(&mut self, solutions: Vec<S>, evaluations: Vec<Evaluation<M>>) -> Result<Vec<Pulse>, OptimizerError> {
        let lengths = self.pending.as_ref().ok_or(OptimizerError::NoPendingAsk)?;
        let expected: usize = lengths.iter().sum();
        for got in [solutions.len(), evaluations.len()] {
            if got != expected {
                return Err(OptimizerError::BatchMismatch { expected, got });
            }
        }
        let lengths = self.pending.take().unwrap_or_default();

        let mut solutions = solutions.into_iter();
        let mut evaluations = evaluations.into_iter();
        let mut pulses = Vec::with_capacity(self.emitters.len());
        for (emitter, len) in self.emitters.iter_mut().zip(lengths) {
            let sub_solutions: Vec<S> = solutions.by_ref().take(len).collect();
            let sub_evaluations: Vec<Evaluation<M>> = evaluations.by_ref().take(len).collect();
            pulses.push(emitter.tell(&mut self.archive, sub_solutions, sub_evaluations)?);
        }
        Ok(pulses)
    }

    /// Drop the pending batch, e.g. after a failed evaluation.
    pub fn abandon(&mut self) {
        if self.pending.take().is_some() {
            self.emitters.iter_mut().for_each(|e| e.abandon());
        }
    }
}
