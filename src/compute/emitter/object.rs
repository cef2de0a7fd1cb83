//! Object-mutation emitter: variation delegated to the genome's own `mutate`.

use crate::compute::{ElitePool, Evaluation, Mutate};
use crate::schema::Pulse;

use super::{Emitter, EmitterBase, EmitterError};

/// Mutates uniformly sampled elites with [`Mutate::mutate`].
///
/// There is no fallback distribution for arbitrary genomes, so asking on an
/// empty archive fails with [`EmitterError::EmptyArchive`].
#[derive(Debug, Clone)]
pub struct ObjectEmitter<S: Mutate> {
    base: EmitterBase,
    params: S::Params,
}

impl<S: Mutate> ObjectEmitter<S> {
    /// Create an emitter with the given mutation parameters.
    pub fn new(base: EmitterBase, params: S::Params) -> Self {
        Self { base, params }
    }

    /// Mutation parameters.
    pub fn params(&self) -> &S::Params {
        &self.params
    }
}

impl<S, M, A> Emitter<S, M, A> for ObjectEmitter<S>
where
    S: Mutate,
    M: Clone + Send + 'static,
    A: ElitePool<S, M>,
{
    fn name(&self) -> &str {
        self.base.name()
    }

    fn batch_size(&self) -> usize {
        self.base.batch_size()
    }

    fn ask(&mut self, archive: &A) -> Result<Vec<S>, EmitterError> {
        self.base.check_idle()?;
        if archive.is_empty() {
            return Err(EmitterError::EmptyArchive {
                emitter: self.base.name().to_string(),
            });
        }

        let mut batch = Vec::with_capacity(self.base.batch_size());
        for _ in 0..self.base.batch_size() {
            let parent = archive
                .sample_random_elite(&mut self.base.rng)
                .map_err(|_| EmitterError::EmptyArchive {
                    emitter: self.base.name().to_string(),
                })?;
            batch.push(parent.solution.mutate(&self.params, &mut self.base.rng));
        }

        self.base.mark_asked(batch.len());
        Ok(batch)
    }

    fn tell(
        &mut self,
        archive: &mut A,
        solutions: Vec<S>,
        evaluations: Vec<Evaluation<M>>,
    ) -> Result<Pulse, EmitterError> {
        self.base.tell(archive, solutions, evaluations)
    }

    fn abandon(&mut self) {
        self.base.clear_pending();
    }

    fn last_pulse(&self) -> Option<Pulse> {
        self.base.last_pulse()
    }
}
