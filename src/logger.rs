//! Logging setup for the `dose` binary.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

use crate::error::AppError;

/// Install the global subscriber.
///
/// The level comes from `--log-level` unless `RUST_LOG` is set (a `.env` file
/// is loaded first). Logs go to stderr so report tables on stdout stay clean.
pub fn setup_log(log_level: &str) -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(log_level.to_lowercase()),
    }
    .map_err(|e| AppError::new(2, format!("Invalid log level: {e}")))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(CompactTimestamp);

    Registry::default()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| AppError::new(1, format!("Failed to install logger: {e}")))?;

    tracing::debug!("Logging is configured with level: {}", log_level);
    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp;

impl FormatTime for CompactTimestamp {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S"))
    }
}
