//! Model inversion: find the dose whose predicted viability is closest to a
//! target.
//!
//! The fitted regressor is evaluated on a log-spaced dose grid for one sample.
//! The grid point with the smallest `|prediction - target|` is the optimal
//! dose; a bootstrap over the grid predictions gives its interval.

use tracing::debug;

use crate::data::{FeatureScaler, SampleEncoder};
use crate::domain::{DoseCurve, FeatureRow, InversionConfig, OptimalDoseResult, log_dose};
use crate::dose::bootstrap::bootstrap_interval;
use crate::error::{AnalysisError, Result};
use crate::math::log_space;
use crate::models::ViabilityPredictor;

/// Model inputs for `doses` of the sample with `code`.
///
/// Log doses use the same epsilon offset as training before scaling.
pub fn feature_rows<S: FeatureScaler + ?Sized>(doses: &[f64], code: usize, scaler: &S) -> Vec<FeatureRow> {
    doses
        .iter()
        .map(|&dose| {
            let (scaled_dose, scaled_log_dose) = scaler.transform(dose, log_dose(dose));
            FeatureRow {
                scaled_dose,
                sample_code: code as f64,
                scaled_log_dose,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DoseInverter {
    config: InversionConfig,
    grid: Vec<f64>,
}

impl DoseInverter {
    pub fn new(config: InversionConfig) -> Result<Self> {
        config.validate()?;
        let grid = log_space(config.min_dose, config.max_dose, config.n_grid_points)?;
        Ok(Self { config, grid })
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    /// The search grid, ascending, with exact endpoints.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Optimal dose for a sample identifier known to `encoder`.
    pub fn optimal_dose<M, S>(
        &self,
        model: &M,
        scaler: &S,
        encoder: &SampleEncoder,
        sample_id: &str,
    ) -> Result<OptimalDoseResult>
    where
        M: ViabilityPredictor + ?Sized,
        S: FeatureScaler + ?Sized,
    {
        let code = encoder.encode(sample_id)?;
        self.optimal_dose_for_code(model, scaler, code)
    }

    /// Optimal dose for an already encoded sample.
    pub fn optimal_dose_for_code<M, S>(&self, model: &M, scaler: &S, code: usize) -> Result<OptimalDoseResult>
    where
        M: ViabilityPredictor + ?Sized,
        S: FeatureScaler + ?Sized,
    {
        let predictions = predict_doses(model, scaler, &self.grid, code)?;

        let (doses, preds): (Vec<f64>, Vec<f64>) = self
            .grid
            .iter()
            .zip(&predictions)
            .filter(|(_, p)| p.is_finite())
            .map(|(&d, &p)| (d, p))
            .unzip();
        if doses.is_empty() {
            return Err(AnalysisError::NotFound { sample_code: code });
        }

        let target = self.config.target_viability;
        let mut best = 0;
        for i in 1..preds.len() {
            if (preds[i] - target).abs() < (preds[best] - target).abs() {
                best = i;
            }
        }

        let seed = sample_seed(self.config.seed, code);
        let (ci_lower, ci_upper) = bootstrap_interval(
            &doses,
            &preds,
            target,
            self.config.n_bootstrap,
            self.config.percentiles(),
            seed,
        )
        .ok_or(AnalysisError::NotFound { sample_code: code })?;

        debug!(
            sample_code = code,
            optimal_dose = doses[best],
            predicted = preds[best],
            ci_lower,
            ci_upper,
            dropped = self.grid.len() - doses.len(),
            "Optimal dose found"
        );

        Ok(OptimalDoseResult {
            optimal_dose: doses[best],
            ci_lower,
            ci_upper,
            predicted_viability: preds[best],
        })
    }

    /// Model predictions for one sample over `n_points` log-spaced doses.
    pub fn dose_response_curve<M, S>(
        &self,
        model: &M,
        scaler: &S,
        encoder: &SampleEncoder,
        sample_id: &str,
        n_points: usize,
    ) -> Result<DoseCurve>
    where
        M: ViabilityPredictor + ?Sized,
        S: FeatureScaler + ?Sized,
    {
        let code = encoder.encode(sample_id)?;
        let doses = log_space(self.config.min_dose, self.config.max_dose, n_points)?;
        let predicted_viability = predict_doses(model, scaler, &doses, code)?;
        Ok(DoseCurve {
            doses,
            predicted_viability,
        })
    }
}

fn predict_doses<M, S>(model: &M, scaler: &S, doses: &[f64], code: usize) -> Result<Vec<f64>>
where
    M: ViabilityPredictor + ?Sized,
    S: FeatureScaler + ?Sized,
{
    let rows = feature_rows(doses, code, scaler);
    let predictions = model.predict(&rows)?;
    if predictions.len() != rows.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "model returned {} predictions for {} rows",
            predictions.len(),
            rows.len()
        )));
    }
    Ok(predictions)
}

/// Per-sample bootstrap seed: the splitmix64 finaliser of `seed ^ code`.
fn sample_seed(seed: u64, code: usize) -> u64 {
    let mut z = (seed ^ code as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::IdentityScaler;
    use crate::math::{mean, std_dev};

    struct FnModel<F>(F);

    impl<F: Fn(&FeatureRow) -> f64 + Sync> ViabilityPredictor for FnModel<F> {
        fn predict(&self, features: &[FeatureRow]) -> Result<Vec<f64>> {
            Ok(features.iter().map(&self.0).collect())
        }
    }

    fn encoder() -> SampleEncoder {
        SampleEncoder::fit(["ACH-000001", "ACH-000002"])
    }

    #[test]
    fn finds_the_grid_point_nearest_the_target() {
        let inverter = DoseInverter::new(InversionConfig::default()).unwrap();
        let center = inverter.grid()[500];
        let model = FnModel(move |r: &FeatureRow| 0.2 + (r.scaled_dose - center).abs());

        let res = inverter
            .optimal_dose(&model, &IdentityScaler, &encoder(), "ACH-000001")
            .unwrap();
        assert_eq!(res.optimal_dose, center);
        assert_eq!(res.predicted_viability, 0.2);
        assert!(res.ci_lower <= res.optimal_dose && res.optimal_dose <= res.ci_upper);
    }

    #[test]
    fn unknown_sample_is_rejected() {
        let inverter = DoseInverter::new(InversionConfig::default()).unwrap();
        let model = FnModel(|_: &FeatureRow| 0.5);
        let err = inverter
            .optimal_dose(&model, &IdentityScaler, &encoder(), "X999")
            .unwrap_err();
        assert_eq!(err, AnalysisError::UnknownSample("X999".into()));
    }

    #[test]
    fn all_nan_predictions_are_not_found() {
        let inverter = DoseInverter::new(InversionConfig::default()).unwrap();
        let model = FnModel(|_: &FeatureRow| f64::NAN);
        let err = inverter
            .optimal_dose(&model, &IdentityScaler, &encoder(), "ACH-000002")
            .unwrap_err();
        assert_eq!(err, AnalysisError::NotFound { sample_code: 1 });
    }

    #[test]
    fn nan_points_are_skipped() {
        let inverter = DoseInverter::new(InversionConfig {
            n_bootstrap: 50,
            ..InversionConfig::default()
        })
        .unwrap();
        let cutoff = inverter.grid()[100];
        // Only doses above the cutoff are predicted; the closest is just above it.
        let model = FnModel(move |r: &FeatureRow| if r.scaled_dose > cutoff { 0.5 + r.scaled_dose } else { f64::NAN });
        let res = inverter.optimal_dose_for_code(&model, &IdentityScaler, 0).unwrap();
        assert_eq!(res.optimal_dose, inverter.grid()[101]);
        assert!(res.ci_lower >= inverter.grid()[101]);
    }

    #[test]
    fn interval_stays_inside_the_dose_range() {
        let config = InversionConfig {
            n_bootstrap: 100,
            ..InversionConfig::default()
        };
        for (seed, target) in [(1, 0.2), (2, 0.5), (3, -1.0), (4, 2.0)] {
            let inverter = DoseInverter::new(InversionConfig {
                seed,
                target_viability: target,
                ..config.clone()
            })
            .unwrap();
            let model = FnModel(|r: &FeatureRow| 1.0 / (1.0 + r.scaled_dose / 0.01));
            let res = inverter.optimal_dose_for_code(&model, &IdentityScaler, 0).unwrap();
            assert!(res.ci_lower <= res.ci_upper);
            assert!(res.ci_lower >= config.min_dose && res.ci_upper <= config.max_dose);
            assert!(res.optimal_dose >= config.min_dose && res.optimal_dose <= config.max_dose);
        }
    }

    #[test]
    fn more_trials_give_steadier_intervals() {
        // Prediction falls linearly with grid position; target 0.2 sits near index 800.
        let (lo, hi) = (0.0004f64.log10(), 0.1024f64.log10());
        let model = FnModel(move |r: &FeatureRow| 1.0 - (r.scaled_log_dose - lo) / (hi - lo));

        let widths = |n_bootstrap: usize| -> Vec<f64> {
            (0..30)
                .map(|seed| {
                    let inverter = DoseInverter::new(InversionConfig {
                        n_bootstrap,
                        seed,
                        ..InversionConfig::default()
                    })
                    .unwrap();
                    inverter
                        .optimal_dose_for_code(&model, &IdentityScaler, 0)
                        .unwrap()
                        .ci_width()
                })
                .collect()
        };

        let few = widths(100);
        let many = widths(2000);
        let (mean_few, mean_many) = (mean(&few).unwrap(), mean(&many).unwrap());
        assert!(std_dev(&few).unwrap() >= std_dev(&many).unwrap() - 1e-15);
        assert!((mean_few - mean_many).abs() <= 0.5 * mean_many);
    }

    #[test]
    fn curve_covers_the_dose_range() {
        let inverter = DoseInverter::new(InversionConfig::default()).unwrap();
        let model = FnModel(|r: &FeatureRow| 1.0 - r.scaled_dose);
        let curve = inverter
            .dose_response_curve(&model, &IdentityScaler, &encoder(), "ACH-000002", 100)
            .unwrap();
        assert_eq!(curve.doses.len(), 100);
        assert_eq!(curve.predicted_viability.len(), 100);
        assert_eq!(curve.doses[0], 0.0004);
        assert_eq!(curve.doses[99], 0.1024);
        assert!((curve.predicted_viability[0] - 0.9996).abs() < 1e-12);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = DoseInverter::new(InversionConfig {
            n_grid_points: 1,
            ..InversionConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn sample_seeds_are_fixed_and_distinct() {
        assert_eq!(sample_seed(0, 0), 0xE220_A839_7B1D_CDAF);
        assert_eq!(sample_seed(42, 7), sample_seed(42, 7));

        let mut seeds: Vec<u64> = (0..1000).map(|code| sample_seed(42, code)).collect();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), 1000);
    }
}
