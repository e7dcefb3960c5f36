//! Feature scaling for the (dose, log dose) columns.
//!
//! The scaler is fitted once on the training data and then passed by
//! reference to every stage that builds model inputs.

use crate::error::{AnalysisError, Result};

/// A fitted transform over `(dose, log_dose)`.
pub trait FeatureScaler: Sync {
    fn transform(&self, dose: f64, log_dose: f64) -> (f64, f64);
}

/// Standardises each column to zero mean and unit variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScaler {
    mean: [f64; 2],
    scale: [f64; 2],
}

impl StandardScaler {
    /// Fit on `(dose, log_dose)` pairs.
    ///
    /// Uses the population standard deviation; a zero-variance column keeps a
    /// scale of 1 so it is only centred.
    pub fn fit(pairs: &[(f64, f64)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(AnalysisError::InvalidInput("cannot fit scaler on empty data".into()));
        }
        if pairs.iter().any(|(a, b)| !a.is_finite() || !b.is_finite()) {
            return Err(AnalysisError::InvalidInput("non-finite value in scaler input".into()));
        }

        let n = pairs.len() as f64;
        let mut mean = [0.0; 2];
        for (d, l) in pairs {
            mean[0] += d;
            mean[1] += l;
        }
        mean[0] /= n;
        mean[1] /= n;

        let mut var = [0.0; 2];
        for (d, l) in pairs {
            var[0] += (d - mean[0]) * (d - mean[0]);
            var[1] += (l - mean[1]) * (l - mean[1]);
        }
        let scale = var.map(|v| {
            let s = (v / n).sqrt();
            if s > 0.0 { s } else { 1.0 }
        });

        Ok(Self { mean, scale })
    }

    pub fn mean(&self) -> [f64; 2] {
        self.mean
    }

    pub fn scale(&self) -> [f64; 2] {
        self.scale
    }

    pub fn inverse_transform(&self, scaled_dose: f64, scaled_log_dose: f64) -> (f64, f64) {
        (
            scaled_dose * self.scale[0] + self.mean[0],
            scaled_log_dose * self.scale[1] + self.mean[1],
        )
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, dose: f64, log_dose: f64) -> (f64, f64) {
        (
            (dose - self.mean[0]) / self.scale[0],
            (log_dose - self.mean[1]) / self.scale[1],
        )
    }
}

/// Pass-through scaler for models trained on unscaled inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdentityScaler;

impl FeatureScaler for IdentityScaler {
    fn transform(&self, dose: f64, log_dose: f64) -> (f64, f64) {
        (dose, log_dose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_scaler_centres_and_scales() {
        let pairs = [(1.0, 10.0), (3.0, 10.0)];
        let scaler = StandardScaler::fit(&pairs).unwrap();
        assert_eq!(scaler.mean(), [2.0, 10.0]);
        // Second column has zero variance and is only centred.
        assert_eq!(scaler.scale(), [1.0, 1.0]);
        assert_eq!(scaler.transform(3.0, 12.0), (1.0, 2.0));
    }

    #[test]
    fn inverse_transform_round_trips() {
        let pairs = [(0.0004, -3.4), (0.0016, -2.8), (0.1024, -0.99)];
        let scaler = StandardScaler::fit(&pairs).unwrap();
        let (sd, sl) = scaler.transform(0.0016, -2.8);
        let (d, l) = scaler.inverse_transform(sd, sl);
        assert!((d - 0.0016).abs() < 1e-15);
        assert!((l + 2.8).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
