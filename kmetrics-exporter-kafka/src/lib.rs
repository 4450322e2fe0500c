//! Kafka reporter for kmetrics registries.
//!
//! This crate provides a reporter that serializes a [`kmetrics_core::MetricRegistry`]
//! to JSON and publishes one message per report cycle to a Kafka topic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ MetricRegistry  │────>│  KafkaReporter  │────>│ MessageProducer │
//! │   (snapshot)    │     │  (JSON report)  │     │  (Kafka topic)  │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!          ^
//!          │ every period
//! ┌─────────────────┐
//! │ScheduledReporter│
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use kmetrics_core::MetricRegistry;
//! use kmetrics_exporter_kafka::{KafkaReporterBuilder, ScheduledReporter};
//!
//! let registry = Arc::new(MetricRegistry::new());
//! let reporter = KafkaReporterBuilder::default()
//!     .registry(registry.clone())
//!     .broker_list("localhost:9092")
//!     .topic("metrics")
//!     .build()?;
//!
//! let handle = ScheduledReporter::new(Arc::new(reporter)).start(Duration::from_secs(60))?;
//! ```
//!
//! The librdkafka-backed producer requires the `kafka` feature. Without it,
//! reporters can be built over any [`MessageProducer`] with
//! [`KafkaReporterBuilder::build_with`].
//!
//! # Configuration
//!
//! See [`config::ReporterConfig`] for configuration options.

pub mod config;
pub mod error;
pub mod producer;
pub mod reporter;
pub mod scheduler;

pub use config::{ConfigError, ReporterConfig};
pub use error::{ExporterError, PublishError, Result};
#[cfg(feature = "kafka")]
pub use producer::KafkaProducer;
pub use producer::{DeliveryMode, MemoryProducer, MessageProducer, ProducerConfig, ProducerRecord};
pub use reporter::{KafkaReporter, KafkaReporterBuilder, ReportStats};
pub use scheduler::{Reporter, ReporterHandle, ScheduledReporter};
