//! Error types for the audit pipeline

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, AuditError>;

/// Whole-batch and startup failures.
///
/// Per-candidate failures never surface here; they are contained in the
/// orchestrator loop and reported through the event sink.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to fetch candidates: {0}")]
    Fetch(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scorer initialization failed: {0}")]
    ScorerInit(String),
}

impl From<::config::ConfigError> for AuditError {
    fn from(err: ::config::ConfigError) -> Self {
        AuditError::Configuration(err.to_string())
    }
}
