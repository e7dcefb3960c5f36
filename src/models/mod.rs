//! Viability regression.
//!
//! A gradient-boosted tree ensemble maps `(scaled dose, sample code, scaled
//! log dose)` to predicted viability. The regressor chooses its
//! hyperparameters by cross-validated grid search.

pub mod boost;
pub mod cv;
pub mod histogram;
pub mod regressor;
pub mod tree;

pub use boost::GradientBoostedTrees;
pub use cv::{Fold, KFold, cross_val_scores};
pub use regressor::{CandidateScore, TrainedModel, ViabilityRegressor};

use crate::domain::{FEATURE_NAMES, FeatureRow};
use crate::error::Result;

/// Number of model input columns.
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Anything that can predict viability for prepared feature rows.
pub trait ViabilityPredictor: Sync {
    fn predict(&self, features: &[FeatureRow]) -> Result<Vec<f64>>;
}
