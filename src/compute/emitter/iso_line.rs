//! Iso+LineDD emitter: isotropic noise plus a step along the line between two elites.

use crate::compute::{ElitePool, Evaluation};
use crate::schema::Pulse;

use super::{Emitter, EmitterBase, EmitterError, SolutionBounds};

/// Generates `x + iso_sigma * N(0, I) + line_sigma * N(0, 1) * (y - x)` for
/// two uniformly sampled elites `x` and `y`.
///
/// While the archive is empty, candidates are `x0` plus isotropic noise.
#[derive(Debug, Clone)]
pub struct IsoLineEmitter {
    base: EmitterBase,
    x0: Vec<f64>,
    iso_sigma: f64,
    line_sigma: f64,
    bounds: SolutionBounds,
}

impl IsoLineEmitter {
    /// Create an emitter.
    pub fn new(
        base: EmitterBase,
        x0: Vec<f64>,
        iso_sigma: f64,
        line_sigma: f64,
        bounds: SolutionBounds,
    ) -> Self {
        Self {
            base,
            x0,
            iso_sigma,
            line_sigma,
            bounds,
        }
    }

    /// Isotropic noise scale.
    pub fn iso_sigma(&self) -> f64 {
        self.iso_sigma
    }

    /// Line noise scale.
    pub fn line_sigma(&self) -> f64 {
        self.line_sigma
    }

    fn candidate<M, A: ElitePool<Vec<f64>, M>>(&mut self, archive: &A) -> Vec<f64> {
        let rng = &mut self.base.rng;
        let (parent, other) = match (
            archive.sample_random_elite(&mut *rng),
            archive.sample_random_elite(&mut *rng),
        ) {
            (Ok(x), Ok(y)) => (x.solution, Some(y.solution)),
            _ => (self.x0.clone(), None),
        };

        let line = other.as_ref().map_or(0.0, |_| rng.standard_normal());
        let mut child: Vec<f64> = parent
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let iso = self.iso_sigma * rng.standard_normal();
                let direction = other
                    .as_ref()
                    .and_then(|y| y.get(i))
                    .map_or(0.0, |&y| y - x);
                x + iso + self.line_sigma * line * direction
            })
            .collect();
        self.bounds.clamp(&mut child);
        child
    }
}

impl<M, A> Emitter<Vec<f64>, M, A> for IsoLineEmitter
where
    M: Clone + Send + 'static,
    A: ElitePool<Vec<f64>, M>,
{
    fn name(&self) -> &str {
        self.base.name()
    }

    fn batch_size(&self) -> usize {
        self.base.batch_size()
    }

    fn ask(&mut self, archive: &A) -> Result<Vec<Vec<f64>>, EmitterError> {
        self.base.check_idle()?;
        let batch: Vec<Vec<f64>> = (0..self.base.batch_size())
            .map(|_| self.candidate::<M, A>(archive))
            .collect();
        self.base.mark_asked(batch.len());
        Ok(batch)
    }

    fn tell(
        &mut self,
        archive: &mut A,
        solutions: Vec<Vec<f64>>,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{Archive, MultiArchive};
    use crate::schema::ArchiveConfig;

    fn archive() -> Archive<Vec<f64>> {
        Archive::new(ArchiveConfig::grid(vec![10, 10], vec![(0.0, 1.0), (0.0, 1.0)])).unwrap()
    }

    #[test]
    fn test_line_only_stays_on_segment_line() {
        let mut archive = archive();
        archive.insert(vec![0.0, 0.0], 1.0, vec![0.05, 0.05], None);
        archive.insert(vec![1.0, 1.0], 1.0, vec![0.95, 0.95], None);

        // With no isotropic noise every child lies on the diagonal through both elites.
        let mut e = IsoLineEmitter::new(
            EmitterBase::new("iso", 50, 3),
            vec![0.0, 0.0],
            0.0,
            0.5,
            SolutionBounds::unbounded(2),
        );
        for child in e.ask(&archive).unwrap() {
            assert!((child[0] - child[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_archive_uses_x0() {
        let mut e = IsoLineEmitter::new(
            EmitterBase::new("iso", 20, 3),
            vec![2.0, -2.0],
            0.01,
            0.2,
            SolutionBounds::unbounded(2),
        );
        let batch = Emitter::<Vec<f64>, ()>::ask(&mut e, &archive()).unwrap();
        for child in batch {
            assert!((child[0] - 2.0).abs() < 0.1);
            assert!((child[1] + 2.0).abs() < 0.1);
        }
    }

    #[test]
    fn test_line_spans_archives_of_multi_archive() {
        // Each archive holds one of the two elites, so every line runs between them.
        let mut first: Archive<Vec<f64>> = archive();
        first.insert(vec![0.0, 0.0], 1.0, vec![0.05, 0.05], None);
        let mut second: Archive<Vec<f64>> = archive();
        second.insert(vec![1.0, 1.0], 1.0, vec![0.95, 0.95], None);
        let archives = MultiArchive::from_archives(vec![first, second]).unwrap();

        let mut e = IsoLineEmitter::new(
            EmitterBase::new("iso", 100, 8),
            vec![5.0, 5.0],
            0.0,
            0.5,
            SolutionBounds::unbounded(2),
        );
        let batch = e.ask(&archives).unwrap();
        for child in &batch {
            assert!((child[0] - child[1]).abs() < 1e-12);
        }
        // Some pairs draw distinct elites and move off the endpoints.
        assert!(batch.iter().any(|c| c[0] != 0.0 && c[0] != 1.0));
    }
}
