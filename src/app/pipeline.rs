//! Shared analysis pipeline.
//!
//! prepared dataset -> regressor grid search -> training metrics ->
//! per-sample 4PL fits -> per-sample optimal doses -> toxicity index
//!
//! Model-level failures abort the run. Per-sample failures are kept in the
//! sample's record and logged.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::{PanelConfig, PreparedDataset, generate_panel};
use crate::domain::{AnalysisConfig, DoseCurve, FeatureImportance, SampleCurve, SampleDose};
use crate::dose::DoseInverter;
use crate::error::Result;
use crate::fit::{CurveFitter, fit_sample_curves};
use crate::models::{TrainedModel, ViabilityRegressor};
use crate::report::{
    ModelPerformance, OptimalDoseSummary, ToxicityRecord, evaluate_predictions, summarize_doses,
    toxicity_records,
};

/// All computed outputs of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub model: TrainedModel,
    /// Training-set fit of the selected model.
    pub performance: ModelPerformance,
    pub importance: Vec<FeatureImportance>,
    pub curves: Vec<SampleCurve>,
    pub doses: Vec<SampleDose>,
    pub dose_summary: Option<OptimalDoseSummary>,
    /// Predicted dose-response curves for samples whose inversion succeeded.
    pub response_curves: Vec<(String, DoseCurve)>,
    pub toxicity: Vec<ToxicityRecord>,
}

/// Generate a synthetic panel and prepare it for analysis.
pub fn prepare_panel(panel: &PanelConfig) -> Result<PreparedDataset> {
    let panel = generate_panel(panel)?;
    PreparedDataset::prepare(panel.observations)
}

/// Run the full analysis on a prepared dataset.
pub fn run_analysis(dataset: &PreparedDataset, config: &AnalysisConfig) -> Result<AnalysisOutput> {
    config.validate()?;
    let inverter = DoseInverter::new(config.inversion.clone())?;

    info!(
        rows = dataset.len(),
        samples = dataset.sample_ids().len(),
        "Training viability regressor"
    );
    let features = dataset.features();
    let targets = dataset.targets();
    let mut regressor = ViabilityRegressor::new(config.regressor.clone());
    let model = regressor.fit(&features, &targets)?.clone();

    let performance = evaluate_predictions(&targets, &regressor.predict(&features)?)?;
    info!(
        cv_r2 = model.cv_score(),
        train_r2 = performance.r_squared,
        rmse = performance.rmse,
        mae = performance.mae,
        "Model performance"
    );
    let importance = model.feature_importance();

    info!("Fitting per-sample dose-response curves");
    let curves = fit_sample_curves(dataset, &CurveFitter::new(config.curve.clone()));

    let selected: Vec<&String> = dataset.sample_ids().iter().take(config.max_optimal_samples).collect();
    info!(samples = selected.len(), "Computing optimal doses");
    let doses: Vec<SampleDose> = selected
        .par_iter()
        .map(|sample_id| {
            let outcome = inverter.optimal_dose(&model, dataset.scaler(), dataset.encoder(), sample_id);
            if let Err(e) = &outcome {
                warn!(sample = %sample_id, error = %e, "Optimal dose could not be computed");
            }
            SampleDose {
                sample_id: (*sample_id).clone(),
                outcome,
            }
        })
        .collect();

    let mut response_curves = Vec::new();
    for d in doses.iter().filter(|d| d.outcome.is_ok()) {
        let curve = inverter.dose_response_curve(
            &model,
            dataset.scaler(),
            dataset.encoder(),
            &d.sample_id,
            config.curve_points,
        )?;
        response_curves.push((d.sample_id.clone(), curve));
    }

    let dose_summary = summarize_doses(&doses);
    let toxicity = toxicity_records(dataset);

    Ok(AnalysisOutput {
        model,
        performance,
        importance,
        curves,
        doses,
        dose_summary,
        response_curves,
        toxicity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamGrid, RegressorConfig};
    use crate::error::AnalysisError;

    fn quick_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.regressor = RegressorConfig {
            grid: ParamGrid::compact(),
            n_folds: 3,
            seed: 42,
        };
        config.inversion.n_bootstrap = 100;
        config.max_optimal_samples = 2;
        config.curve_points = 20;
        config
    }

    #[test]
    fn run_analysis_produces_per_sample_records() {
        let dataset = prepare_panel(&PanelConfig {
            n_samples: 4,
            ..PanelConfig::default()
        })
        .unwrap();
        let out = run_analysis(&dataset, &quick_config()).unwrap();

        assert_eq!(out.curves.len(), 4);
        assert_eq!(out.toxicity.len(), 4);
        assert_eq!(out.doses.len(), 2);
        assert_eq!(out.doses[0].sample_id, dataset.sample_ids()[0]);
        assert_eq!(out.importance.len(), 3);
        assert_eq!(out.performance.n_points, dataset.len());
        assert!(out.performance.r_squared > 0.5);

        let ok = out.doses.iter().filter(|d| d.outcome.is_ok()).count();
        assert_eq!(out.response_curves.len(), ok);
        assert_eq!(out.dose_summary.map(|s| s.count).unwrap_or(0), ok);
        for (_, curve) in &out.response_curves {
            assert_eq!(curve.doses.len(), 20);
        }
    }

    #[test]
    fn invalid_inversion_config_fails_fast() {
        let dataset = prepare_panel(&PanelConfig {
            n_samples: 2,
            ..PanelConfig::default()
        })
        .unwrap();
        let mut config = quick_config();
        config.inversion.confidence_level = 1.5;
        assert!(run_analysis(&dataset, &config).is_err());
    }

    #[test]
    fn degenerate_curve_points_fail_before_training() {
        let dataset = prepare_panel(&PanelConfig {
            n_samples: 2,
            ..PanelConfig::default()
        })
        .unwrap();
        let mut config = quick_config();
        config.curve_points = 1;
        let err = run_analysis(&dataset, &config).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(ref msg) if msg.contains("at least 2 points")));
    }
}
