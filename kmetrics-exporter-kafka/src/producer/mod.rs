//! Producer configuration and the seam to the message-bus client.
//!
//! The exporter talks to a broker only through [`MessageProducer`]:
//!
//! - [`KafkaProducer`] (feature `kafka`) - librdkafka-backed producer
//! - [`MemoryProducer`] - keeps published records in memory

#[cfg(feature = "kafka")]
mod kafka;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, PublishError, Result};

#[cfg(feature = "kafka")]
pub use kafka::KafkaProducer;
pub use memory::MemoryProducer;

/// Default number of messages buffered before a forced send.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Default number of send retries performed by the producer.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Whether a publish waits for the broker acknowledgement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Wait for the broker to acknowledge each message.
    Sync,
    /// Hand the message to the producer buffer and return.
    #[default]
    Async,
}

impl DeliveryMode {
    pub fn from_synchronous(synchronous: bool) -> Self {
        if synchronous {
            DeliveryMode::Sync
        } else {
            DeliveryMode::Async
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Sync => "sync",
            DeliveryMode::Async => "async",
        }
    }

    /// Broker acknowledgement level requested for this mode.
    pub fn acks(&self) -> &'static str {
        match self {
            DeliveryMode::Sync => "all",
            DeliveryMode::Async => "1",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `host:port` entry of a broker list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerAddress {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        let entry = s.trim();
        let (host, port) = entry.rsplit_once(':').ok_or_else(|| {
            ExporterError::producer_init(format!(
                "Invalid broker address '{}': expected host:port",
                entry
            ))
        })?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(ExporterError::producer_init(format!(
                "Invalid broker address '{}': empty host",
                entry
            )));
        }

        let port: u16 = port.parse().map_err(|_| {
            ExporterError::producer_init(format!(
                "Invalid broker address '{}': bad port '{}'",
                entry, port
            ))
        })?;
        if port == 0 {
            return Err(ExporterError::producer_init(format!(
                "Invalid broker address '{}': port must be > 0",
                entry
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse a comma-separated `host:port` list.
pub fn parse_broker_list(list: &str) -> Result<Vec<BrokerAddress>> {
    if list.trim().is_empty() {
        return Err(ExporterError::producer_init("Broker list is empty"));
    }
    list.split(',').map(str::parse).collect()
}

/// Settings the producer client is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    brokers: Vec<BrokerAddress>,
    delivery_mode: DeliveryMode,
    compression_codec: i32,
    batch_size: usize,
    message_send_max_retries: u32,
}

impl ProducerConfig {
    /// Validate and assemble producer settings.
    ///
    /// The compression codec id is not interpreted here; it is forwarded to
    /// the producer client as-is.
    pub fn new(
        broker_list: &str,
        delivery_mode: DeliveryMode,
        compression_codec: i32,
        batch_size: usize,
        message_send_max_retries: u32,
    ) -> Result<Self> {
        let brokers = parse_broker_list(broker_list)?;
        if batch_size == 0 {
            return Err(ExporterError::producer_init("Batch size must be > 0"));
        }

        Ok(Self {
            brokers,
            delivery_mode,
            compression_codec,
            batch_size,
            message_send_max_retries,
        })
    }

    pub fn brokers(&self) -> &[BrokerAddress] {
        &self.brokers
    }

    /// Brokers joined back into a comma-separated list.
    pub fn broker_list(&self) -> String {
        self.brokers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    pub fn compression_codec(&self) -> i32 {
        self.compression_codec
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn message_send_max_retries(&self) -> u32 {
        self.message_send_max_retries
    }

    /// Client properties assembled from these settings.
    ///
    /// `compression.codec` carries the raw codec id; a client that expects
    /// a codec name has to map it.
    pub fn properties(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("bootstrap.servers", self.broker_list()),
            ("acks", self.delivery_mode.acks().to_string()),
            ("compression.codec", self.compression_codec.to_string()),
            ("batch.num.messages", self.batch_size.to_string()),
            (
                "message.send.max.retries",
                self.message_send_max_retries.to_string(),
            ),
        ])
    }
}

/// A message addressed to a topic. The key is unused by the reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: Option<String>,
    pub value: String,
}

impl ProducerRecord {
    pub fn new(topic: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value: value.into(),
        }
    }
}

/// Message-bus client used by the reporter.
///
/// `enqueue` hands a record to the client's buffer and returns a future that
/// resolves once the broker acknowledged it, or with an error after the
/// client's own retries are exhausted.
pub trait MessageProducer: Send + Sync + 'static {
    type Delivery: Future<Output = std::result::Result<(), PublishError>> + Send + 'static;

    fn enqueue(&self, record: ProducerRecord) -> std::result::Result<Self::Delivery, PublishError>;

    /// Wait for buffered records to be delivered.
    fn flush(&self, timeout: Duration) -> std::result::Result<(), PublishError>;
}
