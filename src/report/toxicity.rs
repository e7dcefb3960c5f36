//! Per-sample toxicity index.

use serde::Serialize;

use crate::data::PreparedDataset;
use crate::math::mean;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToxicityRecord {
    pub sample_id: String,
    /// Mean viability at the highest dose tested on this sample.
    pub max_dose_viability: f64,
    /// `1 - max_dose_viability`.
    pub toxicity_index: f64,
}

/// Toxicity index for every sample, in dataset order.
pub fn toxicity_records(dataset: &PreparedDataset) -> Vec<ToxicityRecord> {
    let mut out = Vec::with_capacity(dataset.sample_ids().len());
    for sample_id in dataset.sample_ids() {
        let (doses, viabilities) = dataset.raw_observations(sample_id);
        let Some(&max_dose) = doses.last() else {
            continue;
        };
        let at_max: Vec<f64> = doses
            .iter()
            .zip(&viabilities)
            .filter(|(d, _)| **d == max_dose)
            .map(|(_, v)| *v)
            .collect();
        let Some(max_dose_viability) = mean(&at_max) else {
            continue;
        };
        out.push(ToxicityRecord {
            sample_id: sample_id.clone(),
            max_dose_viability,
            toxicity_index: 1.0 - max_dose_viability,
        });
    }
    out
}
