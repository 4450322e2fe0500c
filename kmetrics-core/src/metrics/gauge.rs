use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

type ReadFn = dyn Fn() -> std::result::Result<Value, serde_json::Error> + Send + Sync;

/// A metric whose value is computed by a closure each time it is read.
///
/// The closure may return anything serializable; conversion to JSON happens
/// on read and is the only fallible step of snapshotting a registry.
pub struct Gauge {
    read: Box<ReadFn>,
}

impl Gauge {
    pub fn new<T, F>(f: F) -> Self
    where
        T: Serialize,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            read: Box::new(move || serde_json::to_value(f())),
        }
    }

    /// Evaluate the gauge.
    pub fn value(&self) -> Result<Value> {
        Ok((self.read)()?)
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").finish_non_exhaustive()
    }
}
