//! The Kafka reporter and its builder.

use std::sync::Arc;
use std::time::Duration;

use kmetrics_core::{Layout, MetricFilter, MetricRegistry, MetricSet, MetricsSerializer, TimeUnit};
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ReporterConfig;
use crate::error::{ExporterError, Result};
use crate::producer::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DeliveryMode, MessageProducer, ProducerConfig,
    ProducerRecord,
};
use crate::scheduler::Reporter;

/// Reporter name used when none is configured.
pub const DEFAULT_REPORTER_NAME: &str = "KafkaReporter";

/// Counters describing a reporter's activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub reports_attempted: u64,
    pub reports_succeeded: u64,
    pub reports_failed: u64,
    pub bytes_published: u64,
    pub last_payload_bytes: usize,
}

/// Publishes a JSON snapshot of a [`MetricRegistry`] as one message per
/// report cycle.
///
/// Every cycle serializes the whole registry. The configured filter only
/// selects the metrics a [`ScheduledReporter`](crate::ScheduledReporter)
/// hands to [`Reporter::report`].
///
/// Report cycles of one reporter never overlap: a call to [`report`](Self::report)
/// waits for any cycle already in progress.
pub struct KafkaReporter<P: MessageProducer> {
    name: String,
    topic: String,
    registry: Arc<MetricRegistry>,
    filter: MetricFilter,
    serializer: MetricsSerializer,
    producer_config: ProducerConfig,
    producer: P,
    cycle: Mutex<()>,
    stats: RwLock<ReportStats>,
}

impl<P: MessageProducer> KafkaReporter<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    pub fn filter(&self) -> &MetricFilter {
        &self.filter
    }

    pub fn serializer(&self) -> &MetricsSerializer {
        &self.serializer
    }

    pub fn producer_config(&self) -> &ProducerConfig {
        &self.producer_config
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn stats(&self) -> ReportStats {
        self.stats.read().clone()
    }

    /// Serialize the registry and publish it to the topic.
    ///
    /// In sync mode this returns after the broker acknowledged the message;
    /// in async mode, once the producer accepted it. Async delivery failures
    /// are logged, not returned. Outside a Tokio runtime the async delivery
    /// is awaited inline.
    pub async fn report(&self) -> Result<()> {
        let _cycle = self.cycle.lock().await;
        self.stats.write().reports_attempted += 1;

        info!(reporter = %self.name, topic = %self.topic, "Reporting metrics");

        match self.publish_snapshot().await {
            Ok(bytes) => {
                {
                    let mut stats = self.stats.write();
                    stats.reports_succeeded += 1;
                    stats.bytes_published += bytes as u64;
                    stats.last_payload_bytes = bytes;
                }
                info!(
                    reporter = %self.name,
                    topic = %self.topic,
                    bytes,
                    "Metrics reported"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.write().reports_failed += 1;
                Err(e)
            }
        }
    }

    /// Flush records still buffered in the producer.
    pub fn close(&self, timeout: Duration) -> Result<()> {
        info!(reporter = %self.name, "Flushing producer");
        self.producer.flush(timeout)?;
        Ok(())
    }

    async fn publish_snapshot(&self) -> Result<usize> {
        let payload = self
            .serializer
            .to_string(&self.registry, &MetricFilter::all())
            .map_err(ExporterError::Serialization)?;
        let bytes = payload.len();
        debug!(bytes, payload = %payload, "Created metrics report");

        let delivery = self
            .producer
            .enqueue(ProducerRecord::new(&self.topic, payload))?;

        match self.producer_config.delivery_mode() {
            DeliveryMode::Sync => delivery.await?,
            DeliveryMode::Async => match Handle::try_current() {
                Ok(handle) => {
                    let topic = self.topic.clone();
                    handle.spawn(async move {
                        if let Err(e) = delivery.await {
                            warn!(topic = %topic, error = %e, "Metrics report was not delivered");
                        }
                    });
                }
                Err(_) => {
                    debug!(topic = %self.topic, "No Tokio runtime, awaiting delivery inline");
                    if let Err(e) = delivery.await {
                        warn!(topic = %self.topic, error = %e, "Metrics report was not delivered");
                    }
                }
            },
        }

        Ok(bytes)
    }
}

impl<P: MessageProducer> Reporter for KafkaReporter<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    fn filter(&self) -> &MetricFilter {
        &self.filter
    }

    /// The payload is the full registry re-read at publish time, not the
    /// filtered `metrics`.
    async fn report(&self, metrics: &MetricSet) -> Result<()> {
        debug!(reporter = %self.name, metrics = metrics.len(), "Scheduled report");
        KafkaReporter::report(self).await
    }
}

/// Builder for [`KafkaReporter`]. Start from [`KafkaReporterBuilder::default`]
/// or [`KafkaReporterBuilder::new`].
///
/// Registry, broker list and topic are required; everything else has a
/// default. All validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct KafkaReporterBuilder {
    registry: Option<Arc<MetricRegistry>>,
    broker_list: Option<String>,
    topic: Option<String>,
    name: String,
    filter: MetricFilter,
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    layout: Layout,
    synchronous: bool,
    compression_codec: i32,
    batch_size: usize,
    message_send_max_retries: u32,
}

impl Default for KafkaReporterBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            broker_list: None,
            topic: None,
            name: DEFAULT_REPORTER_NAME.to_string(),
            filter: MetricFilter::all(),
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Seconds,
            layout: Layout::Flat,
            synchronous: false,
            compression_codec: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            message_send_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl KafkaReporterBuilder {
    /// Builder with the three required settings filled in.
    pub fn new(
        registry: Arc<MetricRegistry>,
        broker_list: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self::default()
            .registry(registry)
            .broker_list(broker_list)
            .topic(topic)
    }

    /// Builder seeded from file configuration.
    pub fn from_config(registry: Arc<MetricRegistry>, config: &ReporterConfig) -> Result<Self> {
        let filter = MetricFilter::from_config(&config.filters)
            .map_err(|e| ExporterError::configuration(e.to_string()))?;

        Ok(Self::new(registry, &config.kafka.brokers, &config.kafka.topic)
            .name(&config.reporter.name)
            .filter(filter)
            .rate_unit(config.reporter.rate_unit)
            .duration_unit(config.reporter.duration_unit)
            .layout(config.reporter.layout)
            .synchronous(config.kafka.synchronous)
            .compression_codec(config.kafka.compression_codec)
            .batch_size(config.kafka.batch_size)
            .message_send_max_retries(config.kafka.message_send_max_retries))
    }

    pub fn registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Comma-separated `host:port` list.
    pub fn broker_list(mut self, broker_list: impl Into<String>) -> Self {
        self.broker_list = Some(broker_list.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn filter(mut self, filter: MetricFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn rate_unit(mut self, unit: TimeUnit) -> Self {
        self.rate_unit = unit;
        self
    }

    pub fn duration_unit(mut self, unit: TimeUnit) -> Self {
        self.duration_unit = unit;
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    /// Codec id forwarded to the producer client untouched.
    pub fn compression_codec(mut self, codec: i32) -> Self {
        self.compression_codec = codec;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn message_send_max_retries(mut self, retries: u32) -> Self {
        self.message_send_max_retries = retries;
        self
    }

    /// Build a reporter publishing through librdkafka.
    #[cfg(feature = "kafka")]
    pub fn build(self) -> Result<KafkaReporter<crate::KafkaProducer>> {
        self.build_with(crate::KafkaProducer::new)
    }

    /// Build a reporter whose producer is created by `init` from the
    /// validated producer configuration.
    pub fn build_with<P, F>(self, init: F) -> Result<KafkaReporter<P>>
    where
        P: MessageProducer,
        F: FnOnce(&ProducerConfig) -> Result<P>,
    {
        let registry = self
            .registry
            .ok_or_else(|| ExporterError::configuration("A metric registry is required"))?;
        let topic = required(self.topic, "topic")?;
        let broker_list = required(self.broker_list, "broker list")?;

        let producer_config = ProducerConfig::new(
            &broker_list,
            DeliveryMode::from_synchronous(self.synchronous),
            self.compression_codec,
            self.batch_size,
            self.message_send_max_retries,
        )?;
        let producer = init(&producer_config)?;

        info!(
            reporter = %self.name,
            topic = %topic,
            brokers = %producer_config.broker_list(),
            mode = %producer_config.delivery_mode(),
            rate_unit = %self.rate_unit,
            duration_unit = %self.duration_unit,
            "Kafka reporter created"
        );

        Ok(KafkaReporter {
            name: self.name,
            topic,
            registry,
            filter: self.filter,
            serializer: MetricsSerializer::new(self.rate_unit, self.duration_unit)
                .with_layout(self.layout),
            producer_config,
            producer,
            cycle: Mutex::new(()),
            stats: RwLock::new(ReportStats::default()),
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ExporterError::configuration(format!(
            "A {} is required",
            what
        ))),
    }
}
