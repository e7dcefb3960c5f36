//! Optimal-dose search and bootstrap intervals.

pub mod bootstrap;
pub mod inverter;

pub use bootstrap::{bootstrap_dose, bootstrap_interval};
pub use inverter::{DoseInverter, feature_rows};
