//! In-memory dataset with raw and model-ready columns side by side.
//!
//! Curve fitting needs the raw doses while the regressor needs scaled
//! features. Keeping both on every row means no stage ever goes back to the
//! original source.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::data::encoder::SampleEncoder;
use crate::data::scaler::{FeatureScaler, StandardScaler};
use crate::domain::{FeatureRow, Observation, log_dose};
use crate::error::{AnalysisError, Result};

/// One observation with its derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    pub sample_id: String,
    pub sample_code: usize,
    pub dose: f64,
    pub log_dose: f64,
    pub viability: f64,
    pub features: FeatureRow,
}

/// Cleaned, encoded and scaled observations for one drug.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    rows: Vec<PreparedRow>,
    sample_ids: Vec<String>,
    encoder: SampleEncoder,
    scaler: StandardScaler,
}

/// Drop rows with an empty sample id or a non-finite dose/viability.
pub fn clean_observations(observations: Vec<Observation>) -> Vec<Observation> {
    let before = observations.len();
    let kept: Vec<Observation> = observations
        .into_iter()
        .filter(|o| !o.sample_id.trim().is_empty() && o.dose.is_finite() && o.viability.is_finite())
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!(dropped, kept = kept.len(), "Dropped invalid observations");
    }
    kept
}

impl PreparedDataset {
    /// Clean, encode and scale `observations`.
    ///
    /// The encoder and scaler are fitted here and owned by the dataset; borrow
    /// them with [`encoder`](Self::encoder) and [`scaler`](Self::scaler) when
    /// building inputs for inversion.
    pub fn prepare(observations: Vec<Observation>) -> Result<Self> {
        let observations = clean_observations(observations);
        if observations.is_empty() {
            return Err(AnalysisError::InvalidInput("no valid observations".into()));
        }

        let encoder = SampleEncoder::fit(observations.iter().map(|o| o.sample_id.as_str()));

        let pairs: Vec<(f64, f64)> = observations.iter().map(|o| (o.dose, log_dose(o.dose))).collect();
        let scaler = StandardScaler::fit(&pairs)?;

        let mut seen = HashSet::new();
        let mut sample_ids = Vec::new();
        let mut rows = Vec::with_capacity(observations.len());
        for (o, &(dose, ld)) in observations.into_iter().zip(&pairs) {
            let sample_code = encoder.encode(&o.sample_id)?;
            let (scaled_dose, scaled_log_dose) = scaler.transform(dose, ld);
            if seen.insert(o.sample_id.clone()) {
                sample_ids.push(o.sample_id.clone());
            }
            rows.push(PreparedRow {
                sample_id: o.sample_id,
                sample_code,
                dose,
                log_dose: ld,
                viability: o.viability,
                features: FeatureRow {
                    scaled_dose,
                    sample_code: sample_code as f64,
                    scaled_log_dose,
                },
            });
        }

        debug!(
            rows = rows.len(),
            samples = sample_ids.len(),
            "Prepared dataset"
        );

        Ok(Self {
            rows,
            sample_ids,
            encoder,
            scaler,
        })
    }

    pub fn rows(&self) -> &[PreparedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sample ids in order of first appearance.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn encoder(&self) -> &SampleEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn features(&self) -> Vec<FeatureRow> {
        self.rows.iter().map(|r| r.features).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.viability).collect()
    }

    /// Raw `(doses, viabilities)` for one sample, sorted by dose.
    pub fn raw_observations(&self, sample_id: &str) -> (Vec<f64>, Vec<f64>) {
        let mut pairs: Vec<(f64, f64)> = self
            .rows
            .iter()
            .filter(|r| r.sample_id == sample_id)
            .map(|r| (r.dose, r.viability))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.into_iter().unzip()
    }

    pub fn dose_range(&self) -> (f64, f64) {
        self.rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.dose), hi.max(r.dose))
        })
    }

    pub fn viability_range(&self) -> (f64, f64) {
        self.rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.viability), hi.max(r.viability))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(id: &str, dose: f64, viability: f64) -> Observation {
        Observation {
            sample_id: id.to_string(),
            dose,
            viability,
        }
    }

    #[test]
    fn cleaning_drops_non_finite_rows() {
        let kept = clean_observations(vec![
            obs("A", 0.001, 0.9),
            obs("A", f64::NAN, 0.5),
            obs("", 0.002, 0.5),
            obs("B", 0.004, f64::INFINITY),
        ]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn prepare_keeps_raw_and_scaled_columns() {
        let ds = PreparedDataset::prepare(vec![
            obs("B", 0.0016, 0.4),
            obs("A", 0.0004, 0.9),
            obs("B", 0.0004, 0.8),
            obs("A", 0.0016, 0.6),
        ])
        .unwrap();

        assert_eq!(ds.len(), 4);
        assert_eq!(ds.sample_ids(), &["B".to_string(), "A".to_string()]);
        assert_eq!(ds.encoder().encode("A").unwrap(), 0);

        let row = &ds.rows()[0];
        assert_eq!(row.dose, 0.0016);
        assert_eq!(row.features.sample_code, 1.0);
        let (sd, sl) = ds.scaler().transform(row.dose, row.log_dose);
        assert_eq!(row.features.scaled_dose, sd);
        assert_eq!(row.features.scaled_log_dose, sl);
    }

    #[test]
    fn raw_observations_are_sorted_by_dose() {
        let ds = PreparedDataset::prepare(vec![
            obs("A", 0.0016, 0.6),
            obs("A", 0.0004, 0.9),
            obs("B", 0.0008, 0.7),
        ])
        .unwrap();
        let (doses, viab) = ds.raw_observations("A");
        assert_eq!(doses, vec![0.0004, 0.0016]);
        assert_eq!(viab, vec![0.9, 0.6]);
    }

    #[test]
    fn prepare_rejects_empty_input() {
        assert!(PreparedDataset::prepare(vec![obs("A", f64::NAN, 0.1)]).is_err());
    }
}
