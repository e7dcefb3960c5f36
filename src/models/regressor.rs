//! Grid-searched viability regressor.
//!
//! Every candidate in the parameter grid is scored by shuffled K-fold
//! cross-validation (mean out-of-fold R²). Candidates are evaluated in
//! parallel; the best one is refitted on all rows.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{FEATURE_NAMES, FeatureImportance, FeatureRow, Hyperparameters, RegressorConfig};
use crate::error::{AnalysisError, Result};
use crate::models::ViabilityPredictor;
use crate::models::boost::GradientBoostedTrees;
use crate::models::cv::{KFold, cross_val_scores};

/// Cross-validation outcome of one grid candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub index: usize,
    pub params: Hyperparameters,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Result of a successful grid search.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    booster: GradientBoostedTrees,
    best: CandidateScore,
    evaluated: Vec<CandidateScore>,
    failed: usize,
}

impl TrainedModel {
    pub fn best_params(&self) -> &Hyperparameters {
        &self.best.params
    }

    /// Mean cross-validated R² of the selected candidate.
    pub fn cv_score(&self) -> f64 {
        self.best.mean_score
    }

    /// Scores of every candidate that trained, in grid order.
    pub fn cv_results(&self) -> &[CandidateScore] {
        &self.evaluated
    }

    pub fn failed_candidates(&self) -> usize {
        self.failed
    }

    pub fn booster(&self) -> &GradientBoostedTrees {
        &self.booster
    }

    /// Gain-based importance per input column, sorted descending.
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let mut out: Vec<FeatureImportance> = FEATURE_NAMES
            .iter()
            .zip(self.booster.feature_importances())
            .map(|(name, importance)| FeatureImportance {
                feature: (*name).to_string(),
                importance,
            })
            .collect();
        // Stable sort keeps column order among equal importances.
        out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        out
    }
}

impl ViabilityPredictor for TrainedModel {
    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<f64>> {
        Ok(self.booster.predict(features))
    }
}

/// Gradient-boosted viability model selected by cross-validated grid search.
#[derive(Debug, Clone, Default)]
pub struct ViabilityRegressor {
    config: RegressorConfig,
    trained: Option<TrainedModel>,
}

impl ViabilityRegressor {
    pub fn new(config: RegressorConfig) -> Self {
        Self { config, trained: None }
    }

    pub fn config(&self) -> &RegressorConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        self.trained.is_some()
    }

    pub fn trained(&self) -> Result<&TrainedModel> {
        self.trained.as_ref().ok_or(AnalysisError::UnfittedModel)
    }

    /// Run the grid search and refit the best candidate on all rows.
    ///
    /// Candidates that fail to train are skipped. If none succeeds the call
    /// fails with [`AnalysisError::GridSearchExhausted`] and any previous fit
    /// is kept.
    pub fn fit(&mut self, features: &[FeatureRow], targets: &[f64]) -> Result<&TrainedModel> {
        let candidates = self.config.grid.candidates();
        if candidates.is_empty() {
            return Err(AnalysisError::GridSearchExhausted {
                candidates: 0,
                last_error: "parameter grid is empty".into(),
            });
        }

        let seed = self.config.seed;
        let folds = KFold::new(self.config.n_folds, seed).split(features.len());

        info!(
            candidates = candidates.len(),
            folds = self.config.n_folds,
            rows = features.len(),
            "Starting grid search"
        );

        let outcomes: Vec<(usize, Result<Vec<f64>>)> = candidates
            .par_iter()
            .enumerate()
            .map(|(idx, params)| {
                let scores = folds
                    .as_ref()
                    .map_err(Clone::clone)
                    .and_then(|folds| cross_val_scores(features, targets, params, folds, seed));
                (idx, scores)
            })
            .collect();

        let mut evaluated = Vec::new();
        let mut last_error = None;
        for (idx, outcome) in outcomes {
            match outcome {
                Ok(fold_scores) => {
                    let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                    debug!(candidate = idx, params = %candidates[idx], score = mean_score, "Candidate scored");
                    evaluated.push(CandidateScore {
                        index: idx,
                        params: candidates[idx],
                        fold_scores,
                        mean_score,
                    });
                }
                Err(e) => {
                    debug!(candidate = idx, error = %e, "Candidate failed");
                    last_error = Some(e);
                }
            }
        }

        // Highest mean score wins; ties go to the earliest grid index.
        let mut best: Option<&CandidateScore> = None;
        for c in &evaluated {
            if best.is_none_or(|b| c.mean_score > b.mean_score) {
                best = Some(c);
            }
        }
        let Some(best) = best.cloned() else {
            let last_error = last_error.map(|e| e.to_string()).unwrap_or_default();
            warn!(candidates = candidates.len(), error = %last_error, "Grid search exhausted");
            return Err(AnalysisError::GridSearchExhausted {
                candidates: candidates.len(),
                last_error,
            });
        };

        let failed = candidates.len() - evaluated.len();
        if failed > 0 {
            warn!(failed, "Some grid candidates failed to train");
        }

        let booster = GradientBoostedTrees::fit(features, targets, &best.params, seed)?;
        info!(params = %best.params, cv_r2 = best.mean_score, "Best parameters selected");

        Ok(&*self.trained.insert(TrainedModel {
            booster,
            best,
            evaluated,
            failed,
        }))
    }

    pub fn predict(&self, features: &[FeatureRow]) -> Result<Vec<f64>> {
        Ok(self.trained()?.booster.predict(features))
    }

    pub fn feature_importance(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self.trained()?.feature_importance())
    }
}

impl ViabilityPredictor for ViabilityRegressor {
    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<f64>> {
        ViabilityRegressor::predict(self, features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParamGrid;

    fn panel() -> (Vec<FeatureRow>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for code in 0..3 {
            for i in 0..20 {
                let x = i as f64 / 19.0 * 4.0 - 2.0;
                let shift = code as f64 * 0.3;
                rows.push(FeatureRow {
                    scaled_dose: x,
                    sample_code: code as f64,
                    scaled_log_dose: x * 0.9,
                });
                y.push(0.1 + 0.8 / (1.0 + (2.0 * (x - shift)).exp()));
            }
        }
        (rows, y)
    }

    fn small_config() -> RegressorConfig {
        RegressorConfig {
            grid: ParamGrid::compact(),
            n_folds: 3,
            seed: 42,
        }
    }

    #[test]
    fn predict_before_fit_is_rejected() {
        let reg = ViabilityRegressor::new(small_config());
        let (rows, _) = panel();
        assert_eq!(reg.predict(&rows).unwrap_err(), AnalysisError::UnfittedModel);
        assert_eq!(reg.feature_importance().unwrap_err(), AnalysisError::UnfittedModel);
    }

    #[test]
    fn fit_scores_and_selects() {
        let (rows, y) = panel();
        let mut reg = ViabilityRegressor::new(small_config());
        let trained = reg.fit(&rows, &y).unwrap();
        assert!(trained.cv_score() > 0.5, "cv r2 = {}", trained.cv_score());
        assert_eq!(trained.cv_results().len(), ParamGrid::compact().len());
        assert_eq!(trained.failed_candidates(), 0);
        for c in trained.cv_results() {
            assert!(c.mean_score <= trained.cv_score());
        }
        assert!(reg.is_fitted());
    }

    #[test]
    fn same_seed_gives_same_model() {
        let (rows, y) = panel();
        let mut a = ViabilityRegressor::new(small_config());
        let mut b = ViabilityRegressor::new(small_config());
        let pa = *a.fit(&rows, &y).unwrap().best_params();
        let pb = *b.fit(&rows, &y).unwrap().best_params();
        assert_eq!(pa, pb);

        // Doses between the training points, including a code-1 curve
        // evaluated past the trained dose range.
        let held_out: Vec<FeatureRow> = [(-1.37, 0.0), (0.41, 1.0), (2.6, 1.0), (1.13, 2.0)]
            .iter()
            .map(|&(x, code)| FeatureRow {
                scaled_dose: x,
                sample_code: code,
                scaled_log_dose: x * 0.9,
            })
            .collect();
        assert!(held_out.iter().all(|h| rows.iter().all(|r| r != h)));
        assert_eq!(a.predict(&held_out).unwrap(), b.predict(&held_out).unwrap());
        assert_eq!(a.predict(&rows).unwrap(), b.predict(&rows).unwrap());
    }

    #[test]
    fn importance_covers_every_feature() {
        let (rows, y) = panel();
        let mut reg = ViabilityRegressor::new(small_config());
        reg.fit(&rows, &y).unwrap();
        let imp = reg.feature_importance().unwrap();
        assert_eq!(imp.len(), 3);
        assert!(imp.iter().all(|f| f.importance >= 0.0));
        assert!(imp.iter().map(|f| f.importance).sum::<f64>() <= 1.0 + 1e-9);
        assert!(imp.windows(2).all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn malformed_targets_exhaust_the_grid() {
        let (rows, _) = panel();
        let mut reg = ViabilityRegressor::new(small_config());
        let err = reg.fit(&rows, &[0.5; 4]).unwrap_err();
        match err {
            AnalysisError::GridSearchExhausted { candidates, last_error } => {
                assert_eq!(candidates, ParamGrid::compact().len());
                assert!(last_error.contains("mismatch"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!reg.is_fitted());
    }

    #[test]
    fn too_few_rows_for_folds_exhausts_the_grid() {
        let (rows, y) = panel();
        let mut reg = ViabilityRegressor::new(small_config());
        let err = reg.fit(&rows[..2], &y[..2]).unwrap_err();
        assert!(matches!(err, AnalysisError::GridSearchExhausted { .. }));
    }
}
