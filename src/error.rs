//! Error types for the Kolosal scoring pipeline

use thiserror::Error;

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Main error type for the scoring pipeline
///
/// Every variant is fatal at the job level: the batch aborts and no output
/// artifact is left behind.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Invalid split fraction {fraction}: {reason}")]
    InvalidFraction { fraction: f64, reason: String },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model from {uri}: {reason}")]
    ModelLoad { uri: String, reason: String },

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Background sample is empty{0}")]
    EmptyBackground(String),

    #[error("Failed to write output {path}: {reason}")]
    OutputWrite { path: String, reason: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl From<polars::error::PolarsError> for ScoringError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScoringError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(err: serde_json::Error) -> Self {
        ScoringError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScoringError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScoringError::SchemaMismatch(format!("invalid matrix shape: {}", err))
    }
}
