//! Reporting: training metrics, toxicity index, optimal-dose summary and
//! terminal tables.

pub mod format;
pub mod metrics;
pub mod summary;
pub mod toxicity;

pub use format::*;
pub use metrics::{ModelPerformance, evaluate_predictions};
pub use summary::{OptimalDoseSummary, summarize_doses};
pub use toxicity::{ToxicityRecord, toxicity_records};
