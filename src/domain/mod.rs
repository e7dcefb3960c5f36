//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and model-ready inputs (`Observation`, `FeatureRow`)
//! - per-sample outputs (`CurveParameters`, `OptimalDoseResult`, `DoseCurve`)
//! - run configuration (`AnalysisConfig` and its parts, `ParamGrid`)

pub mod types;

pub use types::*;
