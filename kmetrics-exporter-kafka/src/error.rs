//! Error types for the Kafka exporter.

use thiserror::Error;

/// Result type alias using [`ExporterError`].
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Errors that can occur while building or running a reporter.
#[derive(Error, Debug)]
pub enum ExporterError {
    /// A required option is missing or an option is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The producer client could not be created from the assembled configuration.
    #[error("Failed to initialize producer: {0}")]
    ProducerInitialization(String),

    /// The registry could not be serialized for a report cycle.
    #[error("Failed to serialize metrics report: {0}")]
    Serialization(#[source] kmetrics_core::Error),

    /// The producer reported a delivery failure.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ExporterError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a producer initialization error.
    pub fn producer_init(msg: impl Into<String>) -> Self {
        Self::ProducerInitialization(msg.into())
    }
}

/// Delivery failure signalled by a producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to publish to {topic}: {message}")]
pub struct PublishError {
    pub topic: String,
    pub message: String,
}

impl PublishError {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
        }
    }
}
