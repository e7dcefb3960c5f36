//! Per-sample curve fitting over a whole dataset.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::data::PreparedDataset;
use crate::domain::SampleCurve;
use crate::fit::curve::CurveFitter;

/// Fit every sample independently on its raw doses.
///
/// Samples are evaluated in parallel and returned in dataset order. A failed
/// fit is kept as the sample's outcome and never affects other samples.
pub fn fit_sample_curves(dataset: &PreparedDataset, fitter: &CurveFitter) -> Vec<SampleCurve> {
    dataset
        .sample_ids()
        .par_iter()
        .map(|sample_id| {
            let (doses, viabilities) = dataset.raw_observations(sample_id);
            let outcome = fitter.fit(&doses, &viabilities);
            match &outcome {
                Ok(p) => debug!(
                    sample = %sample_id,
                    ic50 = p.ic50,
                    hill = p.hill_slope,
                    r_squared = ?p.r_squared,
                    "Curve fitted"
                ),
                Err(e) => warn!(sample = %sample_id, error = %e, "IC50 could not be computed"),
            }
            SampleCurve {
                sample_id: sample_id.clone(),
                outcome,
            }
        })
        .collect()
}
