//! Mathematical utilities: dose grids, summary statistics and least squares.

pub mod grid;
pub mod lsq;
pub mod stats;

pub use grid::*;
pub use lsq::*;
pub use stats::*;
