//! Synthetic dose-response panel generation.
//!
//! Each sample gets its own random 4PL curve, evaluated on a two-fold
//! dilution series with replicate Gaussian noise. The panel is a stand-in for
//! a screening export and is fully determined by the config (including seed).

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::Observation;
use crate::error::{AnalysisError, Result};
use crate::fit::curve::four_pl;

/// Settings for [`generate_panel`].
#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    pub n_samples: usize,
    pub replicates: usize,
    pub doses: Vec<f64>,
    /// Standard deviation of additive viability noise.
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            n_samples: 20,
            replicates: 3,
            doses: dilution_series(0.0004, 9),
            noise_sd: 0.03,
            seed: 42,
        }
    }
}

/// `n` doses starting at `start`, doubling each step.
pub fn dilution_series(start: f64, n: usize) -> Vec<f64> {
    (0..n).map(|k| start * 2f64.powi(k as i32)).collect()
}

/// The 4PL curve a synthetic sample was drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueCurve {
    pub top: f64,
    pub bottom: f64,
    pub ic50: f64,
    pub hill_slope: f64,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub observations: Vec<Observation>,
    /// `(sample_id, curve)` in generation order.
    pub curves: Vec<(String, TrueCurve)>,
}

pub fn generate_panel(config: &PanelConfig) -> Result<Panel> {
    if config.n_samples == 0 {
        return Err(AnalysisError::InvalidInput("sample count must be > 0".into()));
    }
    if config.replicates == 0 {
        return Err(AnalysisError::InvalidInput("replicate count must be > 0".into()));
    }
    if config.doses.is_empty() || config.doses.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(AnalysisError::InvalidInput("doses must be finite and > 0".into()));
    }
    let (dose_lo, dose_hi) = config
        .doses
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));

    let noise = Normal::new(0.0, config.noise_sd.max(0.0))
        .map_err(|e| AnalysisError::InvalidInput(format!("noise distribution error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut observations = Vec::with_capacity(config.n_samples * config.doses.len() * config.replicates);
    let mut curves = Vec::with_capacity(config.n_samples);

    for i in 0..config.n_samples {
        let id = format!("ACH-{:06}", i + 1);

        // ic50 log-uniform over the inner part of the tested range.
        let ln_lo = (dose_lo * 2.0).min(dose_hi).ln();
        let ln_hi = (dose_hi / 2.0).max(dose_lo).ln();
        let ic50 = if ln_hi > ln_lo {
            rng.gen_range(ln_lo..ln_hi).exp()
        } else {
            ln_lo.exp()
        };
        let curve = TrueCurve {
            top: rng.gen_range(0.92..1.05),
            bottom: rng.gen_range(0.02..0.3),
            ic50,
            hill_slope: rng.gen_range(0.8..2.5),
        };

        for &dose in &config.doses {
            let mean = four_pl(dose, curve.top, curve.bottom, curve.ic50, curve.hill_slope);
            for _ in 0..config.replicates {
                observations.push(Observation {
                    sample_id: id.clone(),
                    dose,
                    viability: mean + noise.sample(&mut rng),
                });
            }
        }
        curves.push((id, curve));
    }

    Ok(Panel {
        observations,
        curves,
    })
}
