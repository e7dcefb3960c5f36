//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - generates the synthetic panel
//! - runs the analysis pipeline
//! - prints reports

use clap::Parser;
use tracing::info;

use crate::cli::{AnalyzeArgs, Command};
use crate::data::{PanelConfig, dilution_series};
use crate::domain::{AnalysisConfig, CurveFitConfig, InversionConfig, ParamGrid, RegressorConfig};
use crate::error::AppError;

pub mod pipeline;

/// Optimal doses computed by `dose quick`.
const QUICK_SAMPLES: usize = 5;

/// Entry point for the `dose` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args, None),
        Command::Quick(args) => handle_analyze(args, Some(QUICK_SAMPLES)),
    }
}

fn handle_analyze(args: AnalyzeArgs, sample_limit: Option<usize>) -> Result<(), AppError> {
    crate::logger::setup_log(&args.log_level)?;

    let panel = panel_config_from_args(&args);
    let mut config = analysis_config_from_args(&args);
    if let Some(limit) = sample_limit {
        config.max_optimal_samples = config.max_optimal_samples.min(limit);
    }

    info!(samples = panel.n_samples, seed = panel.seed, "Generating synthetic panel");
    let dataset = pipeline::prepare_panel(&panel)?;
    let output = pipeline::run_analysis(&dataset, &config)?;

    println!("{}", crate::report::format_run_summary(&dataset, &output, &config));
    println!("{}", crate::report::format_curve_table(&output.curves));
    println!("{}", crate::report::format_toxicity_table(&output.toxicity, args.top));
    println!(
        "{}",
        crate::report::format_dose_table(&output.doses, output.dose_summary.as_ref(), &config)
    );

    Ok(())
}

pub fn panel_config_from_args(args: &AnalyzeArgs) -> PanelConfig {
    PanelConfig {
        n_samples: args.samples,
        replicates: args.replicates,
        doses: dilution_series(0.0004, 9),
        noise_sd: args.noise,
        seed: args.seed,
    }
}

pub fn analysis_config_from_args(args: &AnalyzeArgs) -> AnalysisConfig {
    AnalysisConfig {
        curve: CurveFitConfig::default(),
        regressor: RegressorConfig {
            grid: ParamGrid::for_kind(args.grid),
            n_folds: args.folds,
            seed: args.seed,
        },
        inversion: InversionConfig {
            min_dose: args.min_dose,
            max_dose: args.max_dose,
            n_grid_points: args.grid_points,
            target_viability: args.target,
            n_bootstrap: args.bootstrap,
            confidence_level: args.confidence,
            seed: args.seed,
        },
        max_optimal_samples: args.max_optimal,
        ..AnalysisConfig::default()
    }
}
