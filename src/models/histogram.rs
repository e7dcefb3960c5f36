//! Feature quantisation for histogram split finding.
//!
//! Each feature column is reduced to at most [`MAX_BINS`] bins. A split after
//! bin `b` sends a row left when its raw value is `<= cuts[b]`, so trees can be
//! trained on bin indices and evaluated on raw values with identical routing.

use std::cmp::Ordering;

use crate::models::N_FEATURES;

pub const MAX_BINS: usize = 256;

/// Cut points for one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBins {
    cuts: Vec<f64>,
}

impl FeatureBins {
    pub fn from_values(values: &[f64], max_bins: usize) -> Self {
        let mut unique: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        unique.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        unique.dedup();

        let max_bins = max_bins.max(2);
        let mut cuts = Vec::new();
        if unique.len() <= max_bins {
            for w in unique.windows(2) {
                cuts.push(midpoint(w[0], w[1]));
            }
        } else {
            for j in 1..max_bins {
                let idx = j * unique.len() / max_bins;
                cuts.push(midpoint(unique[idx - 1], unique[idx]));
            }
            cuts.dedup();
        }
        Self { cuts }
    }

    /// Bin index of a raw value: the number of cuts strictly below it.
    pub fn bin(&self, value: f64) -> usize {
        self.cuts.partition_point(|&c| c < value)
    }

    pub fn n_bins(&self) -> usize {
        self.cuts.len() + 1
    }

    /// Raw-value threshold for a split after `bin`.
    pub fn threshold(&self, bin: usize) -> f64 {
        self.cuts[bin]
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    let m = a + (b - a) / 2.0;
    // Guard against `m == b` for adjacent floats.
    if m < b { m } else { a }
}

/// Column-major bin indices for a feature matrix.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<FeatureBins>,
    columns: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub fn new(rows: &[[f64; N_FEATURES]]) -> Self {
        let mut bins = Vec::with_capacity(N_FEATURES);
        let mut columns = Vec::with_capacity(N_FEATURES);
        for f in 0..N_FEATURES {
            let values: Vec<f64> = rows.iter().map(|r| r[f]).collect();
            let fb = FeatureBins::from_values(&values, MAX_BINS);
            columns.push(values.iter().map(|&v| fb.bin(v) as u16).collect());
            bins.push(fb);
        }
        Self { bins, columns }
    }

    pub fn feature(&self, f: usize) -> &FeatureBins {
        &self.bins[f]
    }

    pub fn bin_of(&self, row: usize, f: usize) -> usize {
        self.columns[f][row] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_by_bin_matches_routing_by_value() {
        let values = [0.3, -1.2, 0.3, 2.5, 0.0, 7.0];
        let fb = FeatureBins::from_values(&values, MAX_BINS);
        assert_eq!(fb.n_bins(), 5);
        for b in 0..fb.n_bins() - 1 {
            let t = fb.threshold(b);
            for &v in &values {
                assert_eq!(fb.bin(v) <= b, v <= t);
            }
        }
    }

    #[test]
    fn many_unique_values_are_capped() {
        let values: Vec<f64> = (0..10_000).map(|i| i as f64).collect();
        let fb = FeatureBins::from_values(&values, 16);
        assert!(fb.n_bins() <= 16);
        assert_eq!(fb.bin(-1.0), 0);
        assert_eq!(fb.bin(1e9), fb.n_bins() - 1);
    }

    #[test]
    fn constant_feature_has_a_single_bin() {
        let fb = FeatureBins::from_values(&[1.0, 1.0, 1.0], MAX_BINS);
        assert_eq!(fb.n_bins(), 1);
    }
}
