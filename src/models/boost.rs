//! Gradient-boosted regression trees with squared-error loss.
//!
//! Each round fits one tree to the current residual gradients on a random row
//! subsample and a random feature subset, shrinks it by the learning rate and
//! adds it to the ensemble. The initial prediction is the target mean.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

use crate::domain::{FeatureRow, Hyperparameters};
use crate::error::{AnalysisError, Result};
use crate::models::N_FEATURES;
use crate::models::histogram::BinnedMatrix;
use crate::models::tree::{LEAF_LAMBDA, RegressionTree, SplitStats, TreeParams};

#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedTrees {
    params: Hyperparameters,
    base_score: f64,
    trees: Vec<RegressionTree>,
    split_stats: SplitStats,
}

impl GradientBoostedTrees {
    /// Train an ensemble. The same `seed` always yields the same model.
    pub fn fit(rows: &[FeatureRow], targets: &[f64], params: &Hyperparameters, seed: u64) -> Result<Self> {
        params.validate()?;
        if rows.is_empty() {
            return Err(AnalysisError::InvalidInput("no training rows".into()));
        }
        if rows.len() != targets.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "feature/target length mismatch: {} rows, {} targets",
                rows.len(),
                targets.len()
            )));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(AnalysisError::InvalidInput("targets must be finite".into()));
        }

        let x: Vec<[f64; N_FEATURES]> = rows.iter().map(FeatureRow::as_array).collect();
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput("features must be finite".into()));
        }

        let n = x.len();
        let binned = BinnedMatrix::new(&x);
        let base_score = targets.iter().sum::<f64>() / n as f64;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_child_weight: params.min_child_weight,
            lambda: LEAF_LAMBDA,
        };

        let n_rows = sample_size(n, params.subsample);
        let n_cols = sample_size(N_FEATURES, params.colsample_bytree);
        let all_rows: Vec<usize> = (0..n).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut preds = vec![base_score; n];
        let mut grad = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut split_stats = SplitStats::default();

        for _ in 0..params.n_estimators {
            for i in 0..n {
                grad[i] = preds[i] - targets[i];
            }

            let rows_used = if n_rows < n {
                let mut picked = index::sample(&mut rng, n, n_rows).into_vec();
                picked.sort_unstable();
                picked
            } else {
                all_rows.clone()
            };
            let mut cols = index::sample(&mut rng, N_FEATURES, n_cols).into_vec();
            cols.sort_unstable();

            let (mut tree, tree_stats) = RegressionTree::fit(&binned, &grad, &rows_used, &cols, tree_params);
            tree.scale(params.learning_rate);
            for (p, row) in preds.iter_mut().zip(&x) {
                *p += tree.predict(row);
            }
            split_stats.merge(&tree_stats);
            trees.push(tree);
        }

        Ok(Self {
            params: *params,
            base_score,
            trees,
            split_stats,
        })
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_row(&self, row: &FeatureRow) -> f64 {
        let x = row.as_array();
        self.base_score + self.trees.iter().map(|t| t.predict(&x)).sum::<f64>()
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Average gain per split for each feature, normalised to sum to 1 (all
    /// zeros if no tree ever split).
    pub fn feature_importances(&self) -> [f64; N_FEATURES] {
        let avg = self.split_stats.average_gain();
        let total: f64 = avg.iter().sum();
        if total > 0.0 {
            avg.map(|g| g / total)
        } else {
            [0.0; N_FEATURES]
        }
    }
}

/// Number of items kept when sampling `ratio` of `n`, never below one.
fn sample_size(n: usize, ratio: f64) -> usize {
    ((ratio * n as f64).round() as usize).clamp(1, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dose: f64, code: f64) -> FeatureRow {
        FeatureRow {
            scaled_dose: dose,
            sample_code: code,
            scaled_log_dose: dose.ln_1p(),
        }
    }

    fn hp() -> Hyperparameters {
        Hyperparameters {
            max_depth: 3,
            learning_rate: 0.1,
            n_estimators: 100,
            min_child_weight: 1.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
        }
    }

    fn step_data() -> (Vec<FeatureRow>, Vec<f64>) {
        let rows: Vec<FeatureRow> = (0..40).map(|i| row(i as f64 / 10.0, (i % 2) as f64)).collect();
        let y = rows.iter().map(|r| if r.scaled_dose < 2.0 { 0.9 } else { 0.2 }).collect();
        (rows, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (rows, y) = step_data();
        let model = GradientBoostedTrees::fit(&rows, &y, &hp(), 42).unwrap();
        let preds = model.predict(&rows);
        for (p, t) in preds.iter().zip(&y) {
            assert!((p - t).abs() < 0.01, "pred {p} vs {t}");
        }
        assert_eq!(model.n_trees(), 100);
    }

    #[test]
    fn subsampled_fit_is_deterministic_per_seed() {
        let (rows, y) = step_data();
        let params = Hyperparameters {
            subsample: 0.8,
            colsample_bytree: 0.8,
            ..hp()
        };
        let a = GradientBoostedTrees::fit(&rows, &y, &params, 7).unwrap();
        let b = GradientBoostedTrees::fit(&rows, &y, &params, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn importances_are_normalised() {
        let (rows, y) = step_data();
        let model = GradientBoostedTrees::fit(&rows, &y, &hp(), 42).unwrap();
        let imp = model.feature_importances();
        assert!(imp.iter().all(|&v| v >= 0.0));
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        // The sample code carries no signal.
        assert!(imp[1] < imp[0] + imp[2]);
    }

    #[test]
    fn constant_target_yields_zero_importance() {
        let rows: Vec<FeatureRow> = (0..10).map(|i| row(i as f64, 0.0)).collect();
        let y = vec![0.5; 10];
        let model = GradientBoostedTrees::fit(&rows, &y, &hp(), 1).unwrap();
        assert_eq!(model.feature_importances(), [0.0; N_FEATURES]);
        assert!((model.predict_row(&rows[3]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mismatched_targets_are_rejected() {
        let (rows, _) = step_data();
        let err = GradientBoostedTrees::fit(&rows, &[0.5; 3], &hp(), 1).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn sample_size_keeps_at_least_one() {
        assert_eq!(sample_size(3, 0.1), 1);
        assert_eq!(sample_size(3, 0.8), 2);
        assert_eq!(sample_size(10, 1.0), 10);
    }

    #[test]
    fn importance_averages_gain_over_splits() {
        // Feature 0 has the larger total gain spread over many weak splits;
        // feature 2 earns less in total from a single strong split.
        let model = GradientBoostedTrees {
            params: hp(),
            base_score: 0.0,
            trees: Vec::new(),
            split_stats: SplitStats {
                gain: [10.0, 0.0, 9.0],
                splits: [10, 0, 1],
            },
        };
        let imp = model.feature_importances();
        assert!((imp[0] - 0.1).abs() < 1e-12);
        assert_eq!(imp[1], 0.0);
        assert!((imp[2] - 0.9).abs() < 1e-12);
    }
}
