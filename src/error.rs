//! Unified error hierarchy for liftrs
//!
//! The analysis engines never fail on incomplete user data: missing catalog
//! entries and malformed log items are skipped. Errors only exist at the
//! boundaries where data enters the crate (files, JSON, configuration).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all liftrs operations
#[derive(Debug, Error)]
pub enum LiftRsError {
    /// Input normalization errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Offloaded computation failed to complete
    #[error("Computation error: {0}")]
    Computation(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while mapping raw JSON documents into the canonical model
#[derive(Debug, Error)]
pub enum IngestError {
    /// Input file does not exist
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Top-level document has the wrong shape
    #[error("Expected {expected} at document root, found {found}")]
    UnexpectedRoot { expected: String, found: String },

    /// A record is missing a field that cannot be defaulted
    #[error("Missing required field '{field}' in {record}")]
    MissingField { record: String, field: String },

    /// A date string could not be parsed
    #[error("Invalid date '{value}' in {record}")]
    InvalidDate { record: String, value: String },
}

/// Result type alias for liftrs operations
pub type Result<T> = std::result::Result<T, LiftRsError>;

impl LiftRsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LiftRsError::Ingest(IngestError::FileNotFound { .. }) => ErrorSeverity::Warning,
            LiftRsError::Ingest(_) => ErrorSeverity::Warning,
            LiftRsError::Validation(_) => ErrorSeverity::Warning,
            LiftRsError::Configuration(_) => ErrorSeverity::Error,
            LiftRsError::Computation(_) => ErrorSeverity::Error,
            LiftRsError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LiftRsError::Ingest(IngestError::FileNotFound { path }) => {
                format!("Could not find input file: {}", path.display())
            }
            LiftRsError::Ingest(IngestError::UnexpectedRoot { expected, .. }) => {
                format!("Input file does not contain {}", expected)
            }
            LiftRsError::Json(e) => format!("Input is not valid JSON: {}", e),
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = LiftRsError::Ingest(IngestError::FileNotFound {
            path: PathBuf::from("/test/history.json"),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = LiftRsError::Internal("test".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_user_messages() {
        let err = LiftRsError::Ingest(IngestError::FileNotFound {
            path: PathBuf::from("history.json"),
        });
        assert!(err.user_message().contains("Could not find"));

        let err = LiftRsError::Ingest(IngestError::UnexpectedRoot {
            expected: "an array of workout logs".to_string(),
            found: "object".to_string(),
        });
        assert!(err.user_message().contains("workout logs"));
    }
}
