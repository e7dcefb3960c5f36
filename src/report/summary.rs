//! Aggregate statistics over successful optimal-dose results.

use serde::Serialize;

use crate::domain::SampleDose;
use crate::math::{mean, median};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimalDoseSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarise the samples whose inversion succeeded. `None` if none did.
pub fn summarize_doses(doses: &[SampleDose]) -> Option<OptimalDoseSummary> {
    let values: Vec<f64> = doses
        .iter()
        .filter_map(|d| d.outcome.as_ref().ok())
        .map(|r| r.optimal_dose)
        .collect();
    Some(OptimalDoseSummary {
        count: values.len(),
        mean: mean(&values)?,
        median: median(&values)?,
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OptimalDoseResult;
    use crate::error::AnalysisError;

    fn ok(id: &str, dose: f64) -> SampleDose {
        SampleDose {
            sample_id: id.into(),
            outcome: Ok(OptimalDoseResult {
                optimal_dose: dose,
                ci_lower: dose,
                ci_upper: dose,
                predicted_viability: 0.2,
            }),
        }
    }

    #[test]
    fn failures_are_excluded() {
        let doses = vec![
            ok("A", 0.01),
            SampleDose {
                sample_id: "B".into(),
                outcome: Err(AnalysisError::NotFound { sample_code: 1 }),
            },
            ok("C", 0.03),
            ok("D", 0.02),
        ];
        let s = summarize_doses(&doses).unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean - 0.02).abs() < 1e-12);
        assert!((s.median - 0.02).abs() < 1e-15);
        assert_eq!(s.min, 0.01);
        assert_eq!(s.max, 0.03);
    }

    #[test]
    fn no_successes_gives_none() {
        assert_eq!(summarize_doses(&[]), None);
    }
}
