//! Goodness-of-fit metrics for the trained regressor.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::math::{mae, r2_score, rmse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelPerformance {
    pub r_squared: f64,
    pub rmse: f64,
    pub mae: f64,
    pub n_points: usize,
    pub evaluated_at: DateTime<Local>,
}

/// Score predictions against observed viabilities.
pub fn evaluate_predictions(observed: &[f64], predicted: &[f64]) -> Result<ModelPerformance> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "cannot score {} predictions against {} observations",
            predicted.len(),
            observed.len()
        )));
    }
    let invalid = || AnalysisError::InvalidInput("empty or mismatched scored data".into());
    Ok(ModelPerformance {
        r_squared: r2_score(observed, predicted),
        rmse: rmse(observed, predicted).ok_or_else(invalid)?,
        mae: mae(observed, predicted).ok_or_else(invalid)?,
        n_points: observed.len(),
        evaluated_at: Local::now(),
    })
}
