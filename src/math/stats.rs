//! Summary statistics and regression scores.

use std::cmp::Ordering;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Population standard deviation (`ddof = 0`).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Percentile `q` (0–100) with linear interpolation between order statistics.
///
/// The rank of the result is `q/100 * (n - 1)` in the sorted sample.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    Some(percentile_sorted(&sorted, q))
}

/// Same as [`percentile`] on an already sorted, non-empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Sum of squared differences between `observed` and `predicted`.
pub fn sse(observed: &[f64], predicted: &[f64]) -> f64 {
    observed
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p) * (y - p))
        .sum()
}

/// Coefficient of determination.
///
/// Returns `None` when the observations have zero variance (the ratio is
/// undefined) or the inputs are empty / mismatched.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return None;
    }
    let m = mean(observed)?;
    let ss_tot: f64 = observed.iter().map(|y| (y - m) * (y - m)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    Some(1.0 - sse(observed, predicted) / ss_tot)
}

/// R² as a cross-validation score.
///
/// A zero-variance fold scores 1.0 when predicted perfectly and 0.0
/// otherwise, so a single constant fold never poisons the mean.
pub fn r2_score(observed: &[f64], predicted: &[f64]) -> f64 {
    match r_squared(observed, predicted) {
        Some(r2) => r2,
        None if sse(observed, predicted) == 0.0 => 1.0,
        None => 0.0,
    }
}

pub fn rmse(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return None;
    }
    Some((sse(observed, predicted) / observed.len() as f64).sqrt())
}

pub fn mae(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return None;
    }
    let total: f64 = observed.iter().zip(predicted).map(|(y, p)| (y - p).abs()).sum();
    Some(total / observed.len() as f64)
}
