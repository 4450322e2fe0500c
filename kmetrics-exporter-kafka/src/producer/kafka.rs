//! librdkafka-backed producer.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{debug, info};

use super::{MessageProducer, ProducerConfig, ProducerRecord};
use crate::error::{ExporterError, PublishError, Result};

/// Map a numeric compression codec id to the librdkafka codec name.
///
/// Ids follow the Kafka message format: 0 none, 1 gzip, 2 snappy, 3 lz4,
/// 4 zstd.
pub fn codec_name(id: i32) -> Result<&'static str> {
    match id {
        0 => Ok("none"),
        1 => Ok("gzip"),
        2 => Ok("snappy"),
        3 => Ok("lz4"),
        4 => Ok("zstd"),
        other => Err(ExporterError::producer_init(format!(
            "Unknown compression codec id: {}",
            other
        ))),
    }
}

/// librdkafka settings for `config`, with the codec id replaced by its name.
pub fn client_config(config: &ProducerConfig) -> Result<ClientConfig> {
    let codec = codec_name(config.compression_codec())?;

    let mut client = ClientConfig::new();
    for (key, value) in config.properties() {
        client.set(key, value);
    }
    client.set("compression.codec", codec);

    Ok(client)
}

/// Producer publishing through librdkafka.
pub struct KafkaProducer {
    inner: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: &ProducerConfig) -> Result<Self> {
        let codec = codec_name(config.compression_codec())?;
        let client = client_config(config)?;

        let inner: FutureProducer = client
            .create()
            .map_err(|e| ExporterError::producer_init(e.to_string()))?;

        info!(
            brokers = %config.broker_list(),
            mode = %config.delivery_mode(),
            codec = codec,
            "Kafka producer created"
        );

        Ok(Self { inner })
    }
}

impl MessageProducer for KafkaProducer {
    type Delivery = Pin<Box<dyn Future<Output = std::result::Result<(), PublishError>> + Send>>;

    fn enqueue(
        &self,
        record: ProducerRecord,
    ) -> std::result::Result<Self::Delivery, PublishError> {
        let mut future_record: FutureRecord<'_, str, str> =
            FutureRecord::to(&record.topic).payload(record.value.as_str());
        if let Some(key) = record.key.as_deref() {
            future_record = future_record.key(key);
        }

        let delivery = self
            .inner
            .send_result(future_record)
            .map_err(|(e, _)| PublishError::new(&record.topic, e.to_string()))?;

        let topic = record.topic.clone();
        Ok(Box::pin(async move {
            match delivery.await {
                Ok(Ok(_)) => {
                    debug!(topic = %topic, "Message acknowledged");
                    Ok(())
                }
                Ok(Err((e, _))) => Err(PublishError::new(&topic, e.to_string())),
                Err(_) => Err(PublishError::new(&topic, "delivery cancelled")),
            }
        }))
    }

    fn flush(&self, timeout: Duration) -> std::result::Result<(), PublishError> {
        self.inner
            .flush(timeout)
            .map_err(|e| PublishError::new("*", e.to_string()))
    }
}
