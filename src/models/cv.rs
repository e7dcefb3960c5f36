//! Shuffled K-fold splitting and cross-validated scoring.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{FeatureRow, Hyperparameters};
use crate::error::{AnalysisError, Result};
use crate::math::r2_score;
use crate::models::boost::GradientBoostedTrees;

/// Row indices of one train/test split.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    /// Shuffle `0..n` once, then cut it into contiguous folds. The first
    /// `n % k` folds hold one extra row.
    pub fn split(&self, n: usize) -> Result<Vec<Fold>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(AnalysisError::InvalidInput(format!("need at least 2 folds, got {k}")));
        }
        if n < k {
            return Err(AnalysisError::InvalidInput(format!(
                "cannot split {n} rows into {k} folds"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let base = n / k;
        let extra = n % k;
        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for i in 0..k {
            let size = base + usize::from(i < extra);
            let end = start + size;
            let test = order[start..end].to_vec();
            let train = order[..start].iter().chain(&order[end..]).copied().collect();
            folds.push(Fold { train, test });
            start = end;
        }
        Ok(folds)
    }
}

/// Out-of-fold R² per fold for one hyperparameter candidate.
pub fn cross_val_scores(
    rows: &[FeatureRow],
    targets: &[f64],
    params: &Hyperparameters,
    folds: &[Fold],
    seed: u64,
) -> Result<Vec<f64>> {
    if rows.len() != targets.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "feature/target length mismatch: {} rows, {} targets",
            rows.len(),
            targets.len()
        )));
    }

    let mut scores = Vec::with_capacity(folds.len());
    for fold in folds {
        let train_x: Vec<FeatureRow> = fold.train.iter().map(|&i| rows[i]).collect();
        let train_y: Vec<f64> = fold.train.iter().map(|&i| targets[i]).collect();
        let model = GradientBoostedTrees::fit(&train_x, &train_y, params, seed)?;

        let test_x: Vec<FeatureRow> = fold.test.iter().map(|&i| rows[i]).collect();
        let test_y: Vec<f64> = fold.test.iter().map(|&i| targets[i]).collect();
        let score = r2_score(&test_y, &model.predict(&test_x));
        if !score.is_finite() {
            return Err(AnalysisError::InvalidInput("non-finite fold score".into()));
        }
        scores.push(score);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_partition_all_rows() {
        let folds = KFold::new(5, 42).split(23).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);

        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test.iter().copied()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for f in &folds {
            assert_eq!(f.train.len() + f.test.len(), 23);
            assert!(f.test.iter().all(|t| !f.train.contains(t)));
        }
    }

    #[test]
    fn split_is_seeded() {
        assert_eq!(KFold::new(3, 1).split(12).unwrap(), KFold::new(3, 1).split(12).unwrap());
        assert_ne!(KFold::new(3, 1).split(12).unwrap(), KFold::new(3, 2).split(12).unwrap());
    }

    #[test]
    fn too_few_rows_is_an_error() {
        assert!(KFold::new(5, 0).split(4).is_err());
        assert!(KFold::new(1, 0).split(4).is_err());
    }
}
