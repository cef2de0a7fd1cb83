//! Separable CMA-ES: the search distribution behind the improvement emitter.
//!
//! The covariance is kept diagonal, so sampling and updates are `O(n)` per
//! candidate. The number of parents may change on every update (filter
//! selection), so recombination weights and learning rates are derived per
//! `tell` from the parent count.

use crate::schema::{StopCriteria, WeightRule};

use super::SolutionBounds;
use crate::compute::QdRng;

/// Resampling attempts before an out-of-bounds candidate is clamped.
const MAX_RESAMPLES: usize = 16;

/// Diagonal-covariance evolution strategy.
#[derive(Debug, Clone)]
pub struct SepCmaEs {
    dim: usize,
    sigma0: f64,
    weight_rule: WeightRule,
    mean: Vec<f64>,
    sigma: f64,
    /// Diagonal of the covariance matrix.
    cov: Vec<f64>,
    /// Evolution path for the covariance.
    pc: Vec<f64>,
    /// Evolution path for the step size.
    ps: Vec<f64>,
    generation: usize,
    flat_rankings: usize,
}

/// Learning rates derived from the recombination weights.
#[derive(Debug, Clone)]
struct StrategyParams {
    /// Weights over the ranked batch; positive for parents, negative or zero after.
    weights: Vec<f64>,
    mueff: f64,
    cc: f64,
    cs: f64,
    c1: f64,
    cmu: f64,
    damps: f64,
}

impl SepCmaEs {
    /// Create a distribution centered on `x0` with step size `sigma0`.
    pub fn new(sigma0: f64, weight_rule: WeightRule, x0: Vec<f64>) -> Self {
        let dim = x0.len();
        Self {
            dim,
            sigma0,
            weight_rule,
            mean: x0,
            sigma: sigma0,
            cov: vec![1.0; dim],
            pc: vec![0.0; dim],
            ps: vec![0.0; dim],
            generation: 0,
            flat_rankings: 0,
        }
    }

    /// Current mean.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Current global step size.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Current covariance diagonal.
    pub fn covariance(&self) -> &[f64] {
        &self.cov
    }

    /// Updates performed since the last reset.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Re-center on `x0` and restore the initial step size and covariance.
    pub fn reset(&mut self, x0: Vec<f64>) {
        self.dim = x0.len();
        self.mean = x0;
        self.sigma = self.sigma0;
        self.cov = vec![1.0; self.dim];
        self.pc = vec![0.0; self.dim];
        self.ps = vec![0.0; self.dim];
        self.generation = 0;
        self.flat_rankings = 0;
    }

    /// Sample `n` candidates from `N(mean, sigma^2 * diag(cov))`.
    ///
    /// Candidates outside `bounds` are redrawn a few times, then clamped.
    pub fn ask(&self, n: usize, bounds: &SolutionBounds, rng: &mut QdRng) -> Vec<Vec<f64>> {
        let std: Vec<f64> = self.cov.iter().map(|c| self.sigma * c.sqrt()).collect();
        (0..n)
            .map(|_| {
                let mut x = self.sample(&std, rng);
                let mut attempts = 1;
                while !bounds.contains(&x) && attempts < MAX_RESAMPLES {
                    x = self.sample(&std, rng);
                    attempts += 1;
                }
                bounds.clamp(&mut x);
                x
            })
            .collect()
    }

    fn sample(&self, std: &[f64], rng: &mut QdRng) -> Vec<f64> {
        self.mean
            .iter()
            .zip(std)
            .map(|(m, s)| m + s * rng.standard_normal())
            .collect()
    }

    fn strategy_params(&self, num_parents: usize, batch: usize) -> StrategyParams {
        let n = self.dim as f64;
        let mu = num_parents as f64;

        let mut weights: Vec<f64> = (0..num_parents)
            .map(|i| (mu + 0.5).ln() - ((i + 1) as f64).ln())
            .collect();
        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);
        let mueff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let cc = (4.0 + mueff / n) / (n + 4.0 + 2.0 * mueff / n);
        let cs = (mueff + 2.0) / (n + mueff + 5.0);
        let c1_full = 2.0 / ((n + 1.3).powi(2) + mueff);
        let cmu_full = 2.0 * (mueff - 2.0 + 1.0 / mueff) / ((n + 2.0).powi(2) + mueff);
        // Diagonal learning rates may be larger by (n + 2) / 3.
        let c1 = (c1_full * (n + 2.0) / 3.0).min(1.0);
        let cmu = (cmu_full * (n + 2.0) / 3.0).min(1.0 - c1).max(0.0);
        let damps = 1.0 + 2.0 * (((mueff - 1.0) / (n + 1.0)).sqrt() - 1.0).max(0.0) + cs;

        if self.weight_rule == WeightRule::Active && batch > num_parents {
            let mut negative: Vec<f64> = (num_parents..batch)
                .map(|i| (mu + 0.5).ln() - ((i + 1) as f64).ln())
                .collect();
            let total_neg: f64 = negative.iter().map(|w| w.abs()).sum();
            if total_neg > 0.0 && cmu > 0.0 {
                let mueff_neg = total_neg.powi(2) / negative.iter().map(|w| w * w).sum::<f64>();
                let alpha = (1.0 + c1 / cmu)
                    .min(1.0 + 2.0 * mueff_neg / (mueff + 2.0))
                    .min((1.0 - c1 - cmu) / (n * cmu));
                if alpha > 0.0 {
                    negative.iter_mut().for_each(|w| *w = alpha * *w / total_neg);
                    weights.extend(negative);
                }
            }
        }

        StrategyParams {
            weights,
            mueff,
            cc,
            cs,
            c1,
            cmu,
            damps,
        }
    }

    /// Update the distribution from candidates sorted best first.
    ///
    /// The leading `num_parents` solutions move the mean; with active weights
    /// the remainder shrink the covariance along their directions. Nothing
    /// changes when `num_parents` is zero.
    pub fn tell(&mut self, ranked: &[Vec<f64>], num_parents: usize) {
        let num_parents = num_parents.min(ranked.len());
        if num_parents == 0 || self.dim == 0 {
            return;
        }

        let params = self.strategy_params(num_parents, ranked.len());
        let n = self.dim as f64;
        let sigma = self.sigma;

        let steps: Vec<Vec<f64>> = ranked
            .iter()
            .take(params.weights.len())
            .map(|x| x.iter().zip(&self.mean).map(|(xi, mi)| (xi - mi) / sigma).collect())
            .collect();

        let mut y_w = vec![0.0; self.dim];
        for (y, w) in steps.iter().zip(&params.weights).take(num_parents) {
            for (acc, yi) in y_w.iter_mut().zip(y) {
                *acc += w * yi;
            }
        }

        for (m, yw) in self.mean.iter_mut().zip(&y_w) {
            *m += sigma * yw;
        }

        let cs_norm = (params.cs * (2.0 - params.cs) * params.mueff).sqrt();
        for ((ps, yw), c) in self.ps.iter_mut().zip(&y_w).zip(&self.cov) {
            *ps = (1.0 - params.cs) * *ps + cs_norm * yw / c.sqrt();
        }

        let ps_norm = self.ps.iter().map(|p| p * p).sum::<f64>().sqrt();
        let chi_n = n.sqrt() * (1.0 - 1.0 / (4.0 * n) + 1.0 / (21.0 * n * n));
        let decay = 1.0 - (1.0 - params.cs).powf(2.0 * (self.generation + 1) as f64);
        let hsig = ps_norm / decay.sqrt() / chi_n < 1.4 + 2.0 / (n + 1.0);

        let cc_norm = (params.cc * (2.0 - params.cc) * params.mueff).sqrt();
        for (pc, yw) in self.pc.iter_mut().zip(&y_w) {
            *pc = (1.0 - params.cc) * *pc + if hsig { cc_norm * yw } else { 0.0 };
        }

        let weight_sum: f64 = params.weights.iter().sum();
        let hsig_loss = if hsig {
            0.0
        } else {
            params.cc * (2.0 - params.cc)
        };
        for d in 0..self.dim {
            let rank_mu: f64 = steps
                .iter()
                .zip(&params.weights)
                .map(|(y, &w)| {
                    let y2 = y[d] * y[d];
                    if w >= 0.0 {
                        w * y2
                    } else {
                        // Negative steps are rescaled to unit Mahalanobis length.
                        let z2: f64 = y.iter().zip(&self.cov).map(|(yi, c)| yi * yi / c).sum();
                        w * y2 * n / z2.max(f64::EPSILON)
                    }
                })
                .sum();

            let c = self.cov[d];
            let updated = (1.0 - params.c1 - params.cmu * weight_sum) * c
                + params.c1 * (self.pc[d] * self.pc[d] + hsig_loss * c)
                + params.cmu * rank_mu;
            self.cov[d] = updated.max(f64::MIN_POSITIVE);
        }

        self.sigma *= ((params.cs / params.damps) * (ps_norm / chi_n - 1.0)).exp();
        self.generation += 1;
    }

    /// Largest over smallest covariance entry.
    pub fn condition_number(&self) -> f64 {
        let (lo, hi) = self
            .cov
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(lo, hi), &c| (lo.min(c), hi.max(c)));
        if lo > 0.0 { hi / lo } else { f64::INFINITY }
    }

    /// Whether the distribution has stagnated.
    ///
    /// `ranking_values` are the improvement values of the last batch, best
    /// first. Flat rankings must persist for `criteria.window` consecutive
    /// checks before they count.
    pub fn check_stop(&mut self, ranking_values: &[f64], criteria: &StopCriteria) -> bool {
        if self.condition_number() > criteria.max_condition {
            return true;
        }

        let max_cov = self.cov.iter().copied().fold(0.0_f64, f64::max);
        if self.sigma * max_cov.sqrt() < criteria.tol_x {
            return true;
        }

        let flat = match (ranking_values.first(), ranking_values.last()) {
            (Some(best), Some(worst)) if ranking_values.len() >= 2 => {
                (best - worst).abs() < criteria.tol_fun
            }
            _ => false,
        };
        self.flat_rankings = if flat { self.flat_rankings + 1 } else { 0 };
        self.flat_rankings >= criteria.window
    }
}
