//! Dose grid generation.

use crate::error::{AnalysisError, Result};

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
///
/// Points are spaced evenly in `log10` and the endpoints are returned exactly,
/// so every grid value lies inside `[min, max]`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AnalysisError::InvalidInput(format!(
            "invalid dose range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(AnalysisError::InvalidInput("grid steps must be >= 2".into()));
    }

    let lo = min.log10();
    let hi = max.log10();
    let step = (hi - lo) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push(10f64.powf(lo + step * i as f64).clamp(min, max));
    }
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}
