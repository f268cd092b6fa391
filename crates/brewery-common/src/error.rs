//! Error types for the brewery pipeline

use thiserror::Error;

use crate::types::Layer;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Upstream API unreachable, or still failing once the retry budget is spent
    #[error("Transport error: {0}")]
    Transport(String),

    /// The fetch succeeded but produced zero records
    #[error("No data received from API for run date {run_date}")]
    NoData { run_date: String },

    /// A stage's upstream partition does not exist
    #[error("Missing input for {layer} layer: {path} not found")]
    MissingInput { layer: Layer, path: String },

    /// Object-store mirror failure. Logged by the storage adapter, never returned by a stage.
    #[error("Storage mirror error: {0}")]
    StorageMirror(String),

    #[error("Data quality checks failed: {}", .failed.join("; "))]
    QualityCheck { failed: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid run date '{0}': expected YYYY-MM-DD")]
    InvalidRunDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),
}
