//! Per-sample dose-response curve fitting.
//!
//! Responsibilities:
//!
//! - evaluate and fit the 4PL model on one sample's raw observations
//! - run that fit across every sample with failure isolation

pub mod batch;
pub mod curve;

pub use batch::*;
pub use curve::*;
