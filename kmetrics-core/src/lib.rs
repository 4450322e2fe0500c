//! kmetrics Core Library
//!
//! This crate provides the metrics side of kmetrics reporters:
//!
//! - [`registry`] - Named, thread-safe collection of metrics (`MetricRegistry`, `Metric`, `MetricSet`)
//! - [`metrics`] - The metric kinds (`Gauge`, `Counter`, `Histogram`, `Meter`, `Timer`)
//! - [`serialization`] - JSON snapshots of a registry in configurable units
//! - [`filter`] - Name pattern and predicate filters
//! - [`clock`] / [`time_unit`] - Time sources and units
//! - [`config`] - Logging settings
//! - [`error`] - Error types

pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod registry;
pub mod serialization;
pub mod time_unit;

// Re-export commonly used types at the crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LogFormat, LoggingConfig};
pub use error::{Error, Result};
pub use filter::{FilterConfig, MetricFilter};
pub use metrics::{Counter, Gauge, Histogram, Meter, Snapshot, Timer, TimerContext};
pub use registry::{Metric, MetricKind, MetricRegistry, MetricSet};
pub use serialization::{Layout, MetricReport, MetricsSerializer, RegistryDocument};
pub use time_unit::TimeUnit;

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG`, when set, takes precedence over `config.level`.
///
/// # Example
///
/// ```ignore
/// use kmetrics_core::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
