//! JSON snapshot of a registry, with rates and durations normalized to
//! configurable units.
//!
//! Two document layouts are supported:
//!
//! - [`Layout::Flat`] (default): `{"<metric name>": {...}, ...}`
//! - [`Layout::Grouped`]: `{"version": "3.0.0", "gauges": {...}, "counters": {...}, ...}`
//!
//! Per-kind objects:
//!
//! | Kind      | Fields |
//! |-----------|--------|
//! | gauge     | `value` |
//! | counter   | `count` |
//! | histogram | `count, max, mean, min, p50, p75, p95, p98, p99, p999, stddev` |
//! | meter     | `count, m1_rate, m5_rate, m15_rate, mean_rate, units` |
//! | timer     | histogram fields, meter rate fields, `duration_units, rate_units` |

use std::collections::BTreeMap;
use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::filter::MetricFilter;
use crate::metrics::{Counter, Gauge, Histogram, Meter, Snapshot, Timer};
use crate::registry::{Metric, MetricRegistry};
use crate::time_unit::TimeUnit;

/// Version string embedded in grouped documents.
pub const DOCUMENT_VERSION: &str = "3.0.0";

/// Top-level shape of a serialized registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Metric names at the top level.
    #[default]
    Flat,
    /// Metrics grouped by kind under a versioned envelope.
    Grouped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReport {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterReport {
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramReport {
    pub count: u64,
    pub max: i64,
    pub mean: f64,
    pub min: i64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterReport {
    pub count: u64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
    pub mean_rate: f64,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerReport {
    pub count: u64,
    pub max: f64,
    pub mean: f64,
    pub min: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
    pub stddev: f64,
    pub m1_rate: f64,
    pub m5_rate: f64,
    pub m15_rate: f64,
    pub mean_rate: f64,
    pub duration_units: String,
    pub rate_units: String,
}

/// Serialized form of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricReport {
    Gauge(GaugeReport),
    Counter(CounterReport),
    Histogram(HistogramReport),
    Meter(MeterReport),
    Timer(TimerReport),
}

/// Registry document in the grouped layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDocument {
    pub version: &'static str,
    pub gauges: BTreeMap<String, GaugeReport>,
    pub counters: BTreeMap<String, CounterReport>,
    pub histograms: BTreeMap<String, HistogramReport>,
    pub meters: BTreeMap<String, MeterReport>,
    pub timers: BTreeMap<String, TimerReport>,
}

/// Registry document in either layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RegistryDocument {
    Flat(BTreeMap<String, MetricReport>),
    Grouped(GroupedDocument),
}

/// Converts registry contents to JSON documents.
#[derive(Debug, Clone)]
pub struct MetricsSerializer {
    rate_unit: TimeUnit,
    duration_unit: TimeUnit,
    layout: Layout,
    rate_factor: f64,
    duration_factor: f64,
}

impl MetricsSerializer {
    pub fn new(rate_unit: TimeUnit, duration_unit: TimeUnit) -> Self {
        Self {
            rate_unit,
            duration_unit,
            layout: Layout::default(),
            rate_factor: rate_unit.as_secs_f64(),
            duration_factor: 1.0 / duration_unit.as_nanos() as f64,
        }
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn rate_unit(&self) -> TimeUnit {
        self.rate_unit
    }

    pub fn duration_unit(&self) -> TimeUnit {
        self.duration_unit
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Build the document for every metric accepted by `filter`.
    ///
    /// Metrics are read one at a time; the document is not an atomic view
    /// across metrics.
    pub fn document(
        &self,
        registry: &MetricRegistry,
        filter: &MetricFilter,
    ) -> Result<RegistryDocument> {
        let entries = registry.entries(filter);

        match self.layout {
            Layout::Flat => {
                let mut metrics = BTreeMap::new();
                for (name, metric) in entries {
                    let report = self.report(&metric)?;
                    metrics.insert(name, report);
                }
                Ok(RegistryDocument::Flat(metrics))
            }
            Layout::Grouped => {
                let mut doc = GroupedDocument {
                    version: DOCUMENT_VERSION,
                    gauges: BTreeMap::new(),
                    counters: BTreeMap::new(),
                    histograms: BTreeMap::new(),
                    meters: BTreeMap::new(),
                    timers: BTreeMap::new(),
                };
                for (name, metric) in entries {
                    match self.report(&metric)? {
                        MetricReport::Gauge(r) => {
                            doc.gauges.insert(name, r);
                        }
                        MetricReport::Counter(r) => {
                            doc.counters.insert(name, r);
                        }
                        MetricReport::Histogram(r) => {
                            doc.histograms.insert(name, r);
                        }
                        MetricReport::Meter(r) => {
                            doc.meters.insert(name, r);
                        }
                        MetricReport::Timer(r) => {
                            doc.timers.insert(name, r);
                        }
                    }
                }
                Ok(RegistryDocument::Grouped(doc))
            }
        }
    }

    /// Serialize the registry into `writer`.
    pub fn write_to<W: Write>(
        &self,
        writer: W,
        registry: &MetricRegistry,
        filter: &MetricFilter,
    ) -> Result<()> {
        let document = self.document(registry, filter)?;
        serde_json::to_writer(writer, &document)?;
        Ok(())
    }

    /// Serialize the registry to a JSON string.
    pub fn to_string(&self, registry: &MetricRegistry, filter: &MetricFilter) -> Result<String> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, registry, filter)?;
        String::from_utf8(buf)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn report(&self, metric: &Metric) -> Result<MetricReport> {
        Ok(match metric {
            Metric::Gauge(g) => MetricReport::Gauge(self.gauge(g)?),
            Metric::Counter(c) => MetricReport::Counter(self.counter(c)),
            Metric::Histogram(h) => MetricReport::Histogram(self.histogram(h)),
            Metric::Meter(m) => MetricReport::Meter(self.meter(m)),
            Metric::Timer(t) => MetricReport::Timer(self.timer(t)),
        })
    }

    pub fn gauge(&self, gauge: &Gauge) -> Result<GaugeReport> {
        Ok(GaugeReport {
            value: gauge.value()?,
        })
    }

    pub fn counter(&self, counter: &Counter) -> CounterReport {
        CounterReport {
            count: counter.count(),
        }
    }

    pub fn histogram(&self, histogram: &Histogram) -> HistogramReport {
        let s = histogram.snapshot();
        HistogramReport {
            count: histogram.count(),
            max: s.max(),
            mean: s.mean(),
            min: s.min(),
            p50: s.median(),
            p75: s.p75(),
            p95: s.p95(),
            p98: s.p98(),
            p99: s.p99(),
            p999: s.p999(),
            stddev: s.std_dev(),
        }
    }

    pub fn meter(&self, meter: &Meter) -> MeterReport {
        MeterReport {
            count: meter.count(),
            m1_rate: meter.one_minute_rate() * self.rate_factor,
            m5_rate: meter.five_minute_rate() * self.rate_factor,
            m15_rate: meter.fifteen_minute_rate() * self.rate_factor,
            mean_rate: meter.mean_rate() * self.rate_factor,
            units: format!("events/{}", self.rate_unit.singular()),
        }
    }

    pub fn timer(&self, timer: &Timer) -> TimerReport {
        let s: Snapshot = timer.snapshot();
        let d = self.duration_factor;
        TimerReport {
            count: timer.count(),
            max: s.max() as f64 * d,
            mean: s.mean() * d,
            min: s.min() as f64 * d,
            p50: s.median() * d,
            p75: s.p75() * d,
            p95: s.p95() * d,
            p98: s.p98() * d,
            p99: s.p99() * d,
            p999: s.p999() * d,
            stddev: s.std_dev() * d,
            m1_rate: timer.one_minute_rate() * self.rate_factor,
            m5_rate: timer.five_minute_rate() * self.rate_factor,
            m15_rate: timer.fifteen_minute_rate() * self.rate_factor,
            mean_rate: timer.mean_rate() * self.rate_factor,
            duration_units: self.duration_unit.as_str().to_string(),
            rate_units: format!("calls/{}", self.rate_unit.singular()),
        }
    }
}

impl Default for MetricsSerializer {
    fn default() -> Self {
        Self::new(TimeUnit::Seconds, TimeUnit::Seconds)
    }
}
