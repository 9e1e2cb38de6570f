//! Crate-wide error types
//!
//! One error enum covers the whole retraining pipeline. Failures inside the
//! monitoring loop are logged and absorbed by the loop itself; these types
//! describe what went wrong when a single operation is asked directly.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for retraining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the retraining pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing error
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid config: {0}")]
    Config(String),

    /// Behavioral data source failed
    #[error("data provider error: {0}")]
    DataProvider(String),

    /// Model training failed
    #[error("training failed: {0}")]
    Training(String),

    /// Evaluation produced out-of-range or non-finite metrics
    #[error("invalid evaluation metrics: accuracy={accuracy}, error_metric={error_metric}")]
    InvalidMetrics { accuracy: f64, error_metric: f64 },

    /// No production artifact set on disk
    #[error("no production artifacts at {}", .0.display())]
    ArtifactsNotFound(PathBuf),

    /// Backup snapshot could not be taken
    #[error("backup failed: {0}")]
    Backup(String),
}
