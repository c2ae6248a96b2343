//! Error types for the respondent evaluation pipeline.
//!
//! Uses `thiserror` with structured variants split by concern: batch-level
//! pipeline errors (`EvalError`), per-record schema errors
//! (`ValidationError`), and remote generation errors (`GenerationError`)
//! classified into transient and permanent kinds.

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation failed with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("Empty batch: {0}")]
    EmptyBatch(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EvalError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn empty_batch(msg: impl Into<String>) -> Self {
        Self::EmptyBatch(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// A schema violation in one raw input record.
///
/// The validator collects every error it finds rather than stopping at the
/// first, so these are always reported as a list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record {index}: expected a JSON object")]
    NotAnObject { index: usize },

    #[error("record {index}: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index}: field '{field}' must be a string")]
    WrongType { index: usize, field: &'static str },

    #[error("record {index}: field '{field}' is empty or whitespace-only")]
    EmptyField { index: usize, field: &'static str },

    #[error("duplicate id '{id}' at records {first_index} and {second_index}")]
    DuplicateId {
        id: String,
        first_index: usize,
        second_index: usize,
    },
}

/// Errors from the remote generation endpoint.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("connection failed: {message}")]
    Connection { message: String },

    #[error("rate limited by endpoint, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("response parse error: {message}")]
    ResponseParse { message: String },
}

impl GenerationError {
    /// Whether a retry could plausibly succeed. Rejected requests and
    /// malformed responses will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Connection { .. }
                | Self::RateLimited { .. }
                | Self::Server { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout { timeout_secs: 30 }.is_transient());
        assert!(
            GenerationError::RateLimited {
                retry_after_secs: 2
            }
            .is_transient()
        );
        assert!(
            GenerationError::Server {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !GenerationError::Rejected {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !GenerationError::ResponseParse {
                message: "bad json".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_validation_error_display_names_both_records() {
        let err = ValidationError::DuplicateId {
            id: "q-7".into(),
            first_index: 2,
            second_index: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("q-7"));
        assert!(msg.contains('2'));
        assert!(msg.contains('5'));
    }
}
