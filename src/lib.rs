//! `dose-curves` library crate.
//!
//! The binary (`dose`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fitter, regressor and inverter are reusable on other data sources

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod dose;
pub mod error;
pub mod fit;
pub mod logger;
pub mod math;
pub mod models;
pub mod report;
