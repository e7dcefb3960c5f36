//! Depth-limited regression tree grown on gradient histograms.
//!
//! For squared error every row has hessian 1, so the hessian sum of a node is
//! its row count and `min_child_weight` is a minimum child size.
//!
//! ```text
//! leaf weight = -G / (H + λ)
//! split gain  = G_L²/(H_L + λ) + G_R²/(H_R + λ) - G²/(H + λ)
//! ```

use crate::models::N_FEATURES;
use crate::models::histogram::BinnedMatrix;

/// L2 regularisation on leaf weights.
pub const LEAF_LAMBDA: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// Per-feature split gain totals and split counts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplitStats {
    pub gain: [f64; N_FEATURES],
    pub splits: [usize; N_FEATURES],
}

impl SplitStats {
    pub fn record(&mut self, feature: usize, gain: f64) {
        self.gain[feature] += gain;
        self.splits[feature] += 1;
    }

    pub fn merge(&mut self, other: &SplitStats) {
        for f in 0..N_FEATURES {
            self.gain[f] += other.gain[f];
            self.splits[f] += other.splits[f];
        }
    }

    /// Mean gain per split for each feature (zero for unused features).
    pub fn average_gain(&self) -> [f64; N_FEATURES] {
        let mut avg = [0.0; N_FEATURES];
        for f in 0..N_FEATURES {
            if self.splits[f] > 0 {
                avg[f] = self.gain[f] / self.splits[f] as f64;
            }
        }
        avg
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Builder<'a> {
    binned: &'a BinnedMatrix,
    grad: &'a [f64],
    features: &'a [usize],
    params: TreeParams,
    nodes: Vec<Node>,
    stats: SplitStats,
}

impl RegressionTree {
    /// Grow a tree on `rows` using the gradient vector `grad`.
    ///
    /// Only `features` are considered for splits. Returns the tree and its
    /// per-feature split statistics.
    pub fn fit(
        binned: &BinnedMatrix,
        grad: &[f64],
        rows: &[usize],
        features: &[usize],
        params: TreeParams,
    ) -> (Self, SplitStats) {
        let mut builder = Builder {
            binned,
            grad,
            features,
            params,
            nodes: Vec::new(),
            stats: SplitStats::default(),
        };
        builder.grow(rows.to_vec(), 0);
        (Self { nodes: builder.nodes }, builder.stats)
    }

    /// Multiply every leaf by `factor` (shrinkage).
    pub fn scale(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
    }

    pub fn predict(&self, x: &[f64; N_FEATURES]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}

impl Builder<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h = rows.len() as f64;
        let lambda = self.params.lambda;
        let leaf = Node::Leaf {
            value: -g / (h + lambda),
        };

        if depth >= self.params.max_depth || rows.len() < 2 {
            self.nodes.push(leaf);
            return self.nodes.len() - 1;
        }

        let Some(split) = self.best_split(&rows, g, h) else {
            self.nodes.push(leaf);
            return self.nodes.len() - 1;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.binned.bin_of(r, split.feature) <= split.bin);

        self.stats.record(split.feature, split.gain);
        let threshold = self.binned.feature(split.feature).threshold(split.bin);

        // Reserve the parent slot before growing children.
        let idx = self.nodes.len();
        self.nodes.push(leaf);
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitChoice> {
        let lambda = self.params.lambda;
        let mcw = self.params.min_child_weight;
        let parent_score = g * g / (h + lambda);
        let mut best: Option<SplitChoice> = None;

        for &f in self.features {
            let n_bins = self.binned.feature(f).n_bins();
            if n_bins < 2 {
                continue;
            }
            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];
            for &r in rows {
                let b = self.binned.bin_of(r, f);
                hist_g[b] += self.grad[r];
                hist_h[b] += 1.0;
            }

            let mut gl = 0.0;
            let mut hl = 0.0;
            for b in 0..n_bins - 1 {
                gl += hist_g[b];
                hl += hist_h[b];
                let hr = h - hl;
                if hl == 0.0 || hr == 0.0 || hl < mcw || hr < mcw {
                    continue;
                }
                let gr = g - gl;
                let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score;
                if gain > 1e-12 && best.is_none_or(|s| gain > s.gain) {
                    best = Some(SplitChoice { feature: f, bin: b, gain });
                }
            }
        }

        best
    }
}
