//! Bootstrap confidence intervals for the optimal dose.
//!
//! The resampling unit is the (grid dose, predicted viability) pair. Each
//! trial draws as many pairs as there are, with replacement, and keeps the
//! dose whose prediction is closest to the target. Ties go to the lower dose.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::math::percentile;

/// Optimal dose of one bootstrap trial.
///
/// Returns `None` for empty or mismatched inputs.
pub fn bootstrap_dose(doses: &[f64], predictions: &[f64], target: f64, seed: u64) -> Option<f64> {
    let n = doses.len();
    if n == 0 || n != predictions.len() {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(f64, f64)> = None;
    for _ in 0..n {
        let i = rng.gen_range(0..n);
        let dist = (predictions[i] - target).abs();
        if best.is_none_or(|(bd, bdose)| dist < bd || (dist == bd && doses[i] < bdose)) {
            best = Some((dist, doses[i]));
        }
    }
    best.map(|(_, dose)| dose)
}

/// Percentile interval over `n_trials` bootstrap doses.
///
/// Trial seeds are drawn in order from a generator seeded with `seed`, so the
/// interval does not depend on how trials are scheduled across threads.
pub fn bootstrap_interval(
    doses: &[f64],
    predictions: &[f64],
    target: f64,
    n_trials: usize,
    percentiles: (f64, f64),
    seed: u64,
) -> Option<(f64, f64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let seeds: Vec<u64> = (0..n_trials).map(|_| rng.next_u64()).collect();

    let trials: Vec<f64> = seeds
        .par_iter()
        .filter_map(|&s| bootstrap_dose(doses, predictions, target, s))
        .collect();

    let lower = percentile(&trials, percentiles.0)?;
    let upper = percentile(&trials, percentiles.1)?;
    Some((lower, upper))
}
