//! Named collection of metrics shared between the application and reporters.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::filter::MetricFilter;
use crate::metrics::{Counter, Gauge, Histogram, Meter, Timer};

/// Kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered metric of any kind.
#[derive(Debug, Clone)]
pub enum Metric {
    Gauge(Arc<Gauge>),
    Counter(Arc<Counter>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }
}

/// Metrics split by kind, each map sorted by name.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    pub gauges: BTreeMap<String, Arc<Gauge>>,
    pub counters: BTreeMap<String, Arc<Counter>>,
    pub histograms: BTreeMap<String, Arc<Histogram>>,
    pub meters: BTreeMap<String, Arc<Meter>>,
    pub timers: BTreeMap<String, Arc<Timer>>,
}

impl MetricSet {
    pub fn len(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.histograms.len()
            + self.meters.len()
            + self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe registry of uniquely named metrics.
///
/// Names are unique across kinds. Every meter and timer created through the
/// registry shares the registry's [`Clock`].
pub struct MetricRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
    clock: Arc<dyn Clock>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            metrics: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register a metric under a new name.
    pub fn register(&self, name: impl Into<String>, metric: Metric) -> Result<Metric> {
        let name = name.into();
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(Error::DuplicateMetric(name));
        }
        debug!(metric = %name, kind = %metric.kind(), "Registered metric");
        metrics.insert(name, metric.clone());
        Ok(metric)
    }

    /// Get or create the counter with this name.
    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        match self.get_or_insert(name, MetricKind::Counter, || {
            Metric::Counter(Arc::new(Counter::new()))
        }) {
            Metric::Counter(c) => Ok(c),
            other => Err(kind_error(name, other.kind(), MetricKind::Counter)),
        }
    }

    /// Get or create the histogram with this name.
    pub fn histogram(&self, name: &str) -> Result<Arc<Histogram>> {
        match self.get_or_insert(name, MetricKind::Histogram, || {
            Metric::Histogram(Arc::new(Histogram::new()))
        }) {
            Metric::Histogram(h) => Ok(h),
            other => Err(kind_error(name, other.kind(), MetricKind::Histogram)),
        }
    }

    /// Get or create the meter with this name.
    pub fn meter(&self, name: &str) -> Result<Arc<Meter>> {
        let clock = self.clock.clone();
        match self.get_or_insert(name, MetricKind::Meter, || {
            Metric::Meter(Arc::new(Meter::with_clock(clock)))
        }) {
            Metric::Meter(m) => Ok(m),
            other => Err(kind_error(name, other.kind(), MetricKind::Meter)),
        }
    }

    /// Get or create the timer with this name.
    pub fn timer(&self, name: &str) -> Result<Arc<Timer>> {
        let clock = self.clock.clone();
        match self.get_or_insert(name, MetricKind::Timer, || {
            Metric::Timer(Arc::new(Timer::with_clock(clock)))
        }) {
            Metric::Timer(t) => Ok(t),
            other => Err(kind_error(name, other.kind(), MetricKind::Timer)),
        }
    }

    /// Get the gauge with this name, registering `f` if there is none.
    pub fn gauge<T, F>(&self, name: &str, f: F) -> Result<Arc<Gauge>>
    where
        T: Serialize,
        F: Fn() -> T + Send + Sync + 'static,
    {
        match self.get_or_insert(name, MetricKind::Gauge, || {
            Metric::Gauge(Arc::new(Gauge::new(f)))
        }) {
            Metric::Gauge(g) => Ok(g),
            other => Err(kind_error(name, other.kind(), MetricKind::Gauge)),
        }
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    /// Remove a metric, returning whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.metrics.write().remove(name).is_some()
    }

    /// Sorted metric names.
    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Metrics accepted by `filter`, sorted by name.
    ///
    /// Handles are cloned under the read lock so that callers read values
    /// without blocking registration.
    pub fn entries(&self, filter: &MetricFilter) -> Vec<(String, Metric)> {
        self.metrics
            .read()
            .iter()
            .filter(|(name, metric)| filter.matches(name, metric))
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect()
    }

    /// Metrics accepted by `filter`, split by kind.
    pub fn metric_set(&self, filter: &MetricFilter) -> MetricSet {
        let mut set = MetricSet::default();
        for (name, metric) in self.entries(filter) {
            match metric {
                Metric::Gauge(g) => {
                    set.gauges.insert(name, g);
                }
                Metric::Counter(c) => {
                    set.counters.insert(name, c);
                }
                Metric::Histogram(h) => {
                    set.histograms.insert(name, h);
                }
                Metric::Meter(m) => {
                    set.meters.insert(name, m);
                }
                Metric::Timer(t) => {
                    set.timers.insert(name, t);
                }
            }
        }
        set
    }

    fn get_or_insert(
        &self,
        name: &str,
        kind: MetricKind,
        create: impl FnOnce() -> Metric,
    ) -> Metric {
        if let Some(existing) = self.metrics.read().get(name) {
            return existing.clone();
        }

        let mut metrics = self.metrics.write();
        metrics
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(metric = %name, kind = %kind, "Registered metric");
                create()
            })
            .clone()
    }
}

fn kind_error(name: &str, existing: MetricKind, requested: MetricKind) -> Error {
    Error::MetricKind {
        name: name.to_string(),
        existing,
        requested,
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.len())
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_metric() {
        let registry = MetricRegistry::new();
        let first = registry.counter("requests").unwrap();
        let second = registry.counter("requests").unwrap();

        first.inc();
        assert_eq!(second.count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_kind_conflict() {
        let registry = MetricRegistry::new();
        registry.counter("requests").unwrap();

        let err = registry.meter("requests").unwrap_err();
        assert!(matches!(
            err,
            Error::MetricKind {
                existing: MetricKind::Counter,
                requested: MetricKind::Meter,
                ..
            }
        ));
    }

    #[test]
    fn test_register_duplicate() {
        let registry = MetricRegistry::new();
        registry
            .register("hist", Metric::Histogram(Arc::new(Histogram::new())))
            .unwrap();

        let result = registry.register("hist", Metric::Counter(Arc::new(Counter::new())));
        assert!(matches!(result, Err(Error::DuplicateMetric(_))));
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = MetricRegistry::new();
        registry.counter("b").unwrap();
        registry.timer("c").unwrap();
        registry.gauge("a", || 1).unwrap();

        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove() {
        let registry = MetricRegistry::new();
        registry.counter("gone").unwrap();

        assert!(registry.remove("gone"));
        assert!(!registry.remove("gone"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_metric_set_splits_by_kind() {
        let registry = MetricRegistry::new();
        registry.gauge("g", || 1.5).unwrap();
        registry.counter("c").unwrap();
        registry.histogram("h").unwrap();
        registry.meter("m").unwrap();
        registry.timer("t").unwrap();

        let set = registry.metric_set(&MetricFilter::all());
        assert_eq!(set.len(), 5);
        assert!(set.gauges.contains_key("g"));
        assert!(set.counters.contains_key("c"));
        assert!(set.histograms.contains_key("h"));
        assert!(set.meters.contains_key("m"));
        assert!(set.timers.contains_key("t"));
    }

    #[test]
    fn test_metric_set_applies_filter() {
        let registry = MetricRegistry::new();
        registry.counter("jvm.threads").unwrap();
        registry.counter("http.requests").unwrap();

        let filter = MetricFilter::from_fn(|name, _| name.starts_with("http."));
        let set = registry.metric_set(&filter);

        assert_eq!(set.len(), 1);
        assert!(set.counters.contains_key("http.requests"));
    }
}
