//! Command-line parsing for the dose-response analyser.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting and inversion code.

use clap::{Parser, Subcommand};

use crate::domain::GridKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dose", version, about = "Dose-response analysis: IC50 fits, viability model, optimal doses")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full analysis on a synthetic screening panel.
    Analyze(AnalyzeArgs),
    /// Same as `analyze` but computes optimal doses for 5 samples only.
    Quick(AnalyzeArgs),
}

/// Options shared by `analyze` and `quick`.
#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Number of synthetic samples (cell lines) to generate.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub samples: usize,

    /// Replicate measurements per dose.
    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// Standard deviation of the viability noise.
    #[arg(long, default_value_t = 0.03)]
    pub noise: f64,

    /// Random seed for the panel, cross-validation and bootstrap.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Target viability for the optimal dose.
    #[arg(short = 't', long, default_value_t = 0.2)]
    pub target: f64,

    /// Lower bound of the dose search range.
    #[arg(long, default_value_t = 0.0004)]
    pub min_dose: f64,

    /// Upper bound of the dose search range.
    #[arg(long, default_value_t = 0.1024)]
    pub max_dose: f64,

    /// Number of log-spaced doses searched.
    #[arg(long, default_value_t = 1000)]
    pub grid_points: usize,

    /// Bootstrap trials per sample.
    #[arg(long, default_value_t = 1000)]
    pub bootstrap: usize,

    /// Confidence level of the optimal-dose interval.
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Cross-validation folds for the grid search.
    #[arg(long, default_value_t = 5)]
    pub folds: usize,

    /// Compute optimal doses for the first N samples.
    #[arg(long, default_value_t = 50)]
    pub max_optimal: usize,

    /// Hyperparameter grid to search.
    #[arg(long, value_enum, default_value_t = GridKind::Full)]
    pub grid: GridKind,

    /// Rows shown in the toxicity ranking.
    #[arg(long, default_value_t = 20)]
    pub top: usize,

    /// Log level (error, warn, info, debug, trace). `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
