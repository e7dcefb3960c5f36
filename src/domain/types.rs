//! Shared domain types.
//!
//! These types are kept lightweight so they can be:
//!
//! - passed between the fitting, training and inversion stages
//! - serialized by a reporting collaborator
//! - built in tests without any pipeline state

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Offset added before taking `log10(dose)`.
///
/// The scaler is fitted on log doses computed with this value, so every
/// caller deriving log doses for prediction must use it too.
pub const LOG_DOSE_EPSILON: f64 = 1e-10;

/// Model input column names, in [`FeatureRow`] order.
pub const FEATURE_NAMES: [&str; 3] = ["dose", "cell_line_encoded", "log_dose"];

/// Log dose as fed to the scaler.
pub fn log_dose(dose: f64) -> f64 {
    (dose + LOG_DOSE_EPSILON).log10()
}

/// One raw measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sample_id: String,
    pub dose: f64,
    pub viability: f64,
}

/// One model input row: scaled dose, encoded sample and scaled log dose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub scaled_dose: f64,
    pub sample_code: f64,
    pub scaled_log_dose: f64,
}

impl FeatureRow {
    pub fn as_array(&self) -> [f64; 3] {
        [self.scaled_dose, self.sample_code, self.scaled_log_dose]
    }
}

/// Fitted 4PL parameters for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    pub top: f64,
    pub bottom: f64,
    pub ic50: f64,
    pub hill_slope: f64,
    /// `None` when the observed viabilities have zero variance.
    pub r_squared: Option<f64>,
}

/// Boosting hyperparameters for one grid-search candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub max_depth: usize,
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub min_child_weight: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
}

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(AnalysisError::InvalidInput("max_depth must be >= 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if self.n_estimators == 0 {
            return Err(AnalysisError::InvalidInput("n_estimators must be >= 1".into()));
        }
        if !(self.min_child_weight.is_finite() && self.min_child_weight >= 0.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "min_child_weight must be >= 0, got {}",
                self.min_child_weight
            )));
        }
        for (name, v) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(v.is_finite() && v > 0.0 && v <= 1.0) {
                return Err(AnalysisError::InvalidInput(format!(
                    "{name} must be in (0, 1], got {v}"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "max_depth={} learning_rate={} n_estimators={} min_child_weight={} subsample={} colsample_bytree={}",
            self.max_depth,
            self.learning_rate,
            self.n_estimators,
            self.min_child_weight,
            self.subsample,
            self.colsample_bytree
        )
    }
}

/// Optimal dose for one sample with its bootstrap interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimalDoseResult {
    pub optimal_dose: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub predicted_viability: f64,
}

impl OptimalDoseResult {
    pub fn ci_width(&self) -> f64 {
        self.ci_upper - self.ci_lower
    }
}

/// Predicted viability over a dose grid (for plotting collaborators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseCurve {
    pub doses: Vec<f64>,
    pub predicted_viability: Vec<f64>,
}

/// Curve fit outcome for one sample.
#[derive(Debug, Clone)]
pub struct SampleCurve {
    pub sample_id: String,
    pub outcome: Result<CurveParameters>,
}

/// Optimal dose outcome for one sample.
#[derive(Debug, Clone)]
pub struct SampleDose {
    pub sample_id: String,
    pub outcome: Result<OptimalDoseResult>,
}

/// Feature name with its normalised importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Which hyperparameter grid the regressor searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    /// 729 candidates (3 values per hyperparameter).
    Full,
    /// A handful of candidates for fast runs.
    Compact,
}

/// Hyperparameter grid: candidates are the Cartesian product of all lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub max_depth: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub n_estimators: Vec<usize>,
    pub min_child_weight: Vec<f64>,
    pub subsample: Vec<f64>,
    pub colsample_bytree: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            max_depth: vec![3, 5, 7],
            learning_rate: vec![0.01, 0.1, 0.2],
            n_estimators: vec![100, 200, 300],
            min_child_weight: vec![1.0, 3.0, 5.0],
            subsample: vec![0.8, 0.9, 1.0],
            colsample_bytree: vec![0.8, 0.9, 1.0],
        }
    }
}

impl ParamGrid {
    pub fn compact() -> Self {
        Self {
            max_depth: vec![3, 5],
            learning_rate: vec![0.1],
            n_estimators: vec![100],
            min_child_weight: vec![1.0, 3.0],
            subsample: vec![1.0],
            colsample_bytree: vec![1.0],
        }
    }

    pub fn for_kind(kind: GridKind) -> Self {
        match kind {
            GridKind::Full => Self::default(),
            GridKind::Compact => Self::compact(),
        }
    }

    /// Expand the grid into candidates.
    ///
    /// Keys are iterated in alphabetical order with the last key varying
    /// fastest, so candidate indices are stable across runs.
    pub fn candidates(&self) -> Vec<Hyperparameters> {
        let mut out = Vec::with_capacity(self.len());
        for &colsample_bytree in &self.colsample_bytree {
            for &learning_rate in &self.learning_rate {
                for &max_depth in &self.max_depth {
                    for &min_child_weight in &self.min_child_weight {
                        for &n_estimators in &self.n_estimators {
                            for &subsample in &self.subsample {
                                out.push(Hyperparameters {
                                    max_depth,
                                    learning_rate,
                                    n_estimators,
                                    min_child_weight,
                                    subsample,
                                    colsample_bytree,
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.max_depth.len()
            * self.learning_rate.len()
            * self.n_estimators.len()
            * self.min_child_weight.len()
            * self.subsample.len()
            * self.colsample_bytree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Settings for the per-sample 4PL fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFitConfig {
    /// Maximum number of model evaluations before giving up.
    pub max_evaluations: usize,
    /// Relative cost-decrease tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Largest allowed cosine between a free Jacobian column and the
    /// residuals at a converged point.
    pub gtol: f64,
}

impl Default for CurveFitConfig {
    fn default() -> Self {
        Self {
            max_evaluations: 5000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-8,
        }
    }
}

/// Settings for the grid-searched viability regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorConfig {
    pub grid: ParamGrid,
    pub n_folds: usize,
    pub seed: u64,
}

impl Default for RegressorConfig {
    fn default() -> Self {
        Self {
            grid: ParamGrid::default(),
            n_folds: 5,
            seed: 42,
        }
    }
}

/// Settings for dose inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversionConfig {
    pub min_dose: f64,
    pub max_dose: f64,
    pub n_grid_points: usize,
    pub target_viability: f64,
    pub n_bootstrap: usize,
    /// Two-sided confidence level, e.g. `0.95` for the 2.5/97.5 percentiles.
    pub confidence_level: f64,
    pub seed: u64,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            min_dose: 0.0004,
            max_dose: 0.1024,
            n_grid_points: 1000,
            target_viability: 0.2,
            n_bootstrap: 1000,
            confidence_level: 0.95,
            seed: 42,
        }
    }
}

impl InversionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_dose.is_finite() && self.max_dose.is_finite() && self.min_dose > 0.0 && self.max_dose > self.min_dose) {
            return Err(AnalysisError::InvalidInput(format!(
                "invalid dose range: min={}, max={} (must be finite, >0, and max>min)",
                self.min_dose, self.max_dose
            )));
        }
        if self.n_grid_points < 2 {
            return Err(AnalysisError::InvalidInput("dose grid needs at least 2 points".into()));
        }
        if !self.target_viability.is_finite() {
            return Err(AnalysisError::InvalidInput("target viability must be finite".into()));
        }
        if self.n_bootstrap == 0 {
            return Err(AnalysisError::InvalidInput("bootstrap trial count must be >= 1".into()));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(AnalysisError::InvalidInput(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Lower and upper percentiles (0–100) for the confidence interval.
    pub fn percentiles(&self) -> (f64, f64) {
        let tail = (1.0 - self.confidence_level) / 2.0 * 100.0;
        (tail, 100.0 - tail)
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub curve: CurveFitConfig,
    pub regressor: RegressorConfig,
    pub inversion: InversionConfig,
    /// Optimal doses are computed for the first N samples only.
    pub max_optimal_samples: usize,
    /// Points in presentation dose-response curves.
    pub curve_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            curve: CurveFitConfig::default(),
            regressor: RegressorConfig::default(),
            inversion: InversionConfig::default(),
            max_optimal_samples: 50,
            curve_points: 100,
        }
    }
}

impl AnalysisConfig {
    /// Reject settings that would only fail after the per-sample work.
    pub fn validate(&self) -> Result<()> {
        self.inversion.validate()?;
        if self.curve_points < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "dose-response curves need at least 2 points, got {}",
                self.curve_points
            )));
        }
        Ok(())
    }
}
