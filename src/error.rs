//! Error types shared across the crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by incidence building, thresholding, the context codec and
/// concept reconstruction.
#[derive(Debug, Error)]
pub enum TopicFcaError {
    #[error("Malformed CSV {path}: {reason}")]
    MalformedCsv { path: String, reason: String },

    #[error("Non-binary entry {value:?} at row {row:?}, column {column:?}")]
    NonBinaryEntry {
        row: String,
        column: String,
        value: String,
    },

    #[error("Malformed FIMI line {line}: {reason}")]
    MalformedFimi { line: usize, reason: String },

    #[error("FIMI file already exists: {}", .0.display())]
    FimiExists(PathBuf),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Unknown object: {0}")]
    UnknownObject(String),

    #[error("Integer {0} has no label in the mapping")]
    UnknownLabel(usize),

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Topic model error: {0}")]
    TopicModel(String),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<config::ConfigError> for TopicFcaError {
    fn from(e: config::ConfigError) -> Self {
        TopicFcaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TopicFcaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TopicFcaError::NonBinaryEntry {
            row: "3".to_string(),
            column: "topic_1".to_string(),
            value: "0.5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Non-binary entry \"0.5\" at row \"3\", column \"topic_1\""
        );

        let err = TopicFcaError::MalformedFimi {
            line: 2,
            reason: "token \"x\" is not an integer".to_string(),
        };
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TopicFcaError = io.into();
        assert!(matches!(err, TopicFcaError::Io(_)));
    }
}
