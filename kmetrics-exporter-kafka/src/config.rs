//! Configuration for the Kafka reporter.

use std::path::Path;
use std::time::Duration;

use kmetrics_core::{FilterConfig, Layout, LoggingConfig, MetricFilter, TimeUnit};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::producer::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};
use crate::reporter::DEFAULT_REPORTER_NAME;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete reporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Kafka producer settings.
    #[serde(default)]
    pub kafka: KafkaConfig,

    /// Report scheduling and formatting.
    #[serde(default)]
    pub reporter: ReportConfig,

    /// Metric filtering settings.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` broker list (default: "localhost:9092").
    #[serde(default = "default_brokers")]
    pub brokers: String,

    /// Topic receiving the reports (default: "metrics").
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Wait for broker acknowledgement on every report.
    #[serde(default)]
    pub synchronous: bool,

    /// Compression codec id passed to the producer (0 = none).
    #[serde(default)]
    pub compression_codec: i32,

    /// Messages buffered before a forced send.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Send retries performed by the producer.
    #[serde(default = "default_max_retries")]
    pub message_send_max_retries: u32,
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "metrics".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            synchronous: false,
            compression_codec: 0,
            batch_size: default_batch_size(),
            message_send_max_retries: default_max_retries(),
        }
    }
}

/// Report scheduling and formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Reporter name used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Seconds between report cycles (default: 60).
    #[serde(default = "default_period")]
    pub period_secs: u64,

    /// Unit rates are reported in.
    #[serde(default)]
    pub rate_unit: TimeUnit,

    /// Unit durations are reported in.
    #[serde(default)]
    pub duration_unit: TimeUnit,

    /// Document layout: "flat" or "grouped".
    #[serde(default)]
    pub layout: Layout,

    /// Publish one last report on shutdown.
    #[serde(default)]
    pub report_on_stop: bool,
}

fn default_name() -> String {
    DEFAULT_REPORTER_NAME.to_string()
}

fn default_period() -> u64 {
    60
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            period_secs: default_period(),
            rate_unit: TimeUnit::default(),
            duration_unit: TimeUnit::default(),
            layout: Layout::default(),
            report_on_stop: false,
        }
    }
}

impl ReportConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl ReporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ReporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka.topic.trim().is_empty() {
            return Err(ConfigError::Validation("topic must not be empty".to_string()));
        }

        if self.kafka.brokers.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brokers must not be empty".to_string(),
            ));
        }

        if self.kafka.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch_size must be > 0".to_string(),
            ));
        }

        if self.reporter.period_secs == 0 {
            return Err(ConfigError::Validation(
                "period_secs must be > 0".to_string(),
            ));
        }

        MetricFilter::from_config(&self.filters)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }
}
