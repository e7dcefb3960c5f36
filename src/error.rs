//! Error types.
//!
//! The library reports failures through [`AnalysisError`]. The binary wraps them
//! in [`AppError`], which carries the process exit code.

use thiserror::Error;

/// Failures raised by the fitting, training and inversion stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The 4PL fit did not converge or its input was degenerate.
    #[error("curve fit failed: {0}")]
    FitFailure(String),

    /// `predict`/`feature_importance`/inversion called before `fit`.
    #[error("model has not been fitted; call fit() first")]
    UnfittedModel,

    /// The sample identifier was not seen when the encoder was fitted.
    #[error("unknown sample '{0}'")]
    UnknownSample(String),

    /// Every hyperparameter candidate failed to train.
    #[error("grid search exhausted: all {candidates} candidates failed (last error: {last_error})")]
    GridSearchExhausted { candidates: usize, last_error: String },

    /// No finite prediction on the dose grid.
    #[error("no finite prediction on the dose grid for sample code {sample_code}")]
    NotFound { sample_code: usize },

    /// Invalid configuration or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let exit_code = match err {
            AnalysisError::InvalidInput(_) => 2,
            AnalysisError::FitFailure(_)
            | AnalysisError::UnknownSample(_)
            | AnalysisError::NotFound { .. } => 3,
            AnalysisError::UnfittedModel | AnalysisError::GridSearchExhausted { .. } => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_exit_codes() {
        assert_eq!(AppError::from(AnalysisError::InvalidInput("x".into())).exit_code(), 2);
        assert_eq!(AppError::from(AnalysisError::UnknownSample("X999".into())).exit_code(), 3);
        assert_eq!(AppError::from(AnalysisError::UnfittedModel).exit_code(), 4);
    }

    #[test]
    fn unknown_sample_message_names_the_sample() {
        let msg = AnalysisError::UnknownSample("X999".into()).to_string();
        assert!(msg.contains("X999"));
    }
}
