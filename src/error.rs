//! Error taxonomy for the engines
//!
//! Request-level failures are `Validation`. Catalog and configuration
//! problems surface only while building the engines at startup, never
//! while serving a request. Missing metrics are not an error at all: the
//! snapshot is flagged `incomplete` instead.

use thiserror::Error;

/// Errors raised by the scoring, comparison, transfer and progress engines
#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller supplied something the engines cannot interpret
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Reference data is internally inconsistent (fatal at startup)
    #[error("Catalog miscalibration: {0}")]
    CatalogMiscalibration(String),

    /// Engine configuration is out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Progress log storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking or lane task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Request validation failures, always surfaced to the caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unrecognized skill '{0}'")]
    UnknownSkill(String),

    #[error("metric payload must be a JSON object, got {0}")]
    MalformedPayload(String),

    #[error("step {step} is outside 1..={total}")]
    StepOutOfRange { step: u32, total: u32 },

    #[error("no open session '{0}'")]
    UnknownSession(String),

    #[error("session '{0}' is already open")]
    SessionAlreadyOpen(String),

    #[error("progress already recorded for user '{user_id}', skill '{skill}', session '{session_id}'")]
    DuplicateProgress {
        user_id: String,
        skill: String,
        session_id: String,
    },

    #[error("no journey '{0}'")]
    UnknownJourney(String),

    #[error("no transfer mappings from '{from}' to '{to}'")]
    UnknownTransfer { from: String, to: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_engine_error() {
        let err: EngineError = ValidationError::UnknownSkill("juggling".into()).into();
        assert!(matches!(err, EngineError::Validation(ValidationError::UnknownSkill(_))));
        assert_eq!(err.to_string(), "Validation error: unrecognized skill 'juggling'");
    }
}
