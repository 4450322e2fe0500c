use thiserror::Error;

use crate::registry::MetricKind;

/// Common error type for kmetrics components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric '{name}' is already registered as a {existing}, not a {requested}")]
    MetricKind {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("Metric '{0}' is already registered")]
    DuplicateMetric(String),

    #[error("Invalid metric filter pattern '{pattern}': {message}")]
    FilterPattern { pattern: String, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using kmetrics' Error.
pub type Result<T> = std::result::Result<T, Error>;
