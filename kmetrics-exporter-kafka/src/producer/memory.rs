//! In-process producer that records every message.

use std::future::{Ready, ready};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{MessageProducer, ProducerRecord};
use crate::error::PublishError;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ProducerRecord>,
    failure: Option<String>,
}

/// Producer that keeps published records in memory.
///
/// Clones share the same storage, so a test can keep one handle and give
/// another to the reporter. Deliveries complete immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryProducer {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        self.inner.lock().failure = message.map(str::to_string);
    }

    /// Records published so far.
    pub fn records(&self) -> Vec<ProducerRecord> {
        self.inner.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Remove and return all recorded messages.
    pub fn take(&self) -> Vec<ProducerRecord> {
        std::mem::take(&mut self.inner.lock().records)
    }
}

impl MessageProducer for MemoryProducer {
    type Delivery = Ready<Result<(), PublishError>>;

    fn enqueue(&self, record: ProducerRecord) -> Result<Self::Delivery, PublishError> {
        let mut inner = self.inner.lock();
        if let Some(message) = &inner.failure {
            return Err(PublishError::new(&record.topic, message.clone()));
        }
        inner.records.push(record);
        Ok(ready(Ok(())))
    }

    fn flush(&self, _timeout: Duration) -> Result<(), PublishError> {
        Ok(())
    }
}
