//! End-to-end tests of reporters publishing through in-process producers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kmetrics_core::{ManualClock, MetricFilter, MetricRegistry, TimeUnit};
use kmetrics_exporter_kafka::{
    ExporterError, KafkaReporter, KafkaReporterBuilder, MemoryProducer, MessageProducer,
    ProducerConfig, ProducerRecord, PublishError, ReporterConfig, ScheduledReporter,
};
use serde::Serialize;
use serde_json::Value;

/// Producer whose deliveries complete only after `delay`.
#[derive(Debug, Clone)]
struct DelayedProducer {
    delay: Duration,
    sent: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl DelayedProducer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            sent: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MessageProducer for DelayedProducer {
    type Delivery = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send>>;

    fn enqueue(&self, _record: ProducerRecord) -> Result<Self::Delivery, PublishError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay;
        let in_flight = self.in_flight.clone();
        Ok(Box::pin(async move {
            tokio::time::sleep(delay).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    fn flush(&self, _timeout: Duration) -> Result<(), PublishError> {
        Ok(())
    }
}

fn builder(registry: Arc<MetricRegistry>) -> KafkaReporterBuilder {
    KafkaReporterBuilder::new(registry, "localhost:9092", "metrics")
}

fn build(builder: KafkaReporterBuilder, producer: &MemoryProducer) -> KafkaReporter<MemoryProducer> {
    let producer = producer.clone();
    builder.build_with(move |_| Ok(producer)).unwrap()
}

fn parse(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

#[tokio::test]
async fn test_heap_gauge_is_published_to_topic() {
    let registry = Arc::new(MetricRegistry::new());
    registry.gauge("heap.used", || 1024).unwrap();
    let producer = MemoryProducer::new();

    let reporter = build(
        KafkaReporterBuilder::new(registry, "localhost:9092", "metrics").synchronous(true),
        &producer,
    );
    reporter.report().await.unwrap();

    let records = producer.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "metrics");
    assert_eq!(records[0].key, None);
    assert_eq!(records[0].value, r#"{"heap.used":{"value":1024}}"#);
}

#[tokio::test]
async fn test_counter_payload() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("requests").unwrap().inc_by(7);
    let producer = MemoryProducer::new();

    let reporter = build(builder(registry), &producer);
    reporter.report().await.unwrap();

    assert_eq!(producer.records()[0].value, r#"{"requests":{"count":7}}"#);
}

#[tokio::test]
async fn test_static_registry_gives_identical_payloads() {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(MetricRegistry::with_clock(clock.clone()));
    registry.gauge("heap.used", || 1024).unwrap();
    registry.counter("requests").unwrap().inc_by(3);
    registry.histogram("sizes").unwrap().update(512);
    registry.meter("events").unwrap().mark_n(10);
    registry
        .timer("handler")
        .unwrap()
        .update(Duration::from_millis(4));
    clock.advance(Duration::from_secs(10));
    let producer = MemoryProducer::new();

    let reporter = build(builder(registry), &producer);
    reporter.report().await.unwrap();
    reporter.report().await.unwrap();

    let records = producer.take();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, records[1].value);
}

#[tokio::test]
async fn test_rate_unit_scales_rates() {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(MetricRegistry::with_clock(clock.clone()));
    registry.meter("events").unwrap().mark_n(120);
    let timer = registry.timer("handler").unwrap();
    for _ in 0..120 {
        timer.update(Duration::from_millis(4));
    }
    clock.advance(Duration::from_secs(60));

    let per_second = MemoryProducer::new();
    build(builder(registry.clone()), &per_second)
        .report()
        .await
        .unwrap();

    let per_minute = MemoryProducer::new();
    build(
        builder(registry).rate_unit(TimeUnit::Minutes),
        &per_minute,
    )
    .report()
    .await
    .unwrap();

    let seconds = parse(&per_second.records()[0].value);
    let minutes = parse(&per_minute.records()[0].value);

    assert_eq!(seconds["events"]["units"], "events/second");
    assert_eq!(minutes["events"]["units"], "events/minute");
    assert_eq!(minutes["events"]["count"], 120);

    assert_eq!(seconds["handler"]["rate_units"], "calls/second");
    assert_eq!(minutes["handler"]["rate_units"], "calls/minute");
    assert_eq!(minutes["handler"]["count"], seconds["handler"]["count"]);
    assert_eq!(minutes["handler"]["count"], 120);
    assert_eq!(minutes["handler"]["mean"], seconds["handler"]["mean"]);

    for metric in ["events", "handler"] {
        for field in ["mean_rate", "m1_rate", "m5_rate", "m15_rate"] {
            let s = seconds[metric][field].as_f64().unwrap();
            let m = minutes[metric][field].as_f64().unwrap();
            assert!(s > 0.0, "{}.{} should be positive", metric, field);
            assert!(
                (m - s * 60.0).abs() < 1e-9 * m.max(1.0),
                "{}.{}: {} vs {}",
                metric,
                field,
                m,
                s
            );
        }
        let mean = seconds[metric]["mean_rate"].as_f64().unwrap();
        assert!((mean - 2.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_filter_selects_scheduled_metrics_not_payload() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("app.requests").unwrap().inc();
    registry.counter("jvm.threads").unwrap().inc();
    let producer = MemoryProducer::new();

    let reporter = build(
        builder(registry)
            .filter(MetricFilter::from_fn(|name, _| name.starts_with("app."))),
        &producer,
    );
    let selected = reporter.registry().metric_set(reporter.filter());
    assert_eq!(selected.len(), 1);
    assert!(selected.counters.contains_key("app.requests"));

    reporter.report().await.unwrap();

    let payload = parse(&producer.records()[0].value);
    assert_eq!(payload["app.requests"]["count"], 1);
    assert_eq!(payload["jvm.threads"]["count"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_do_not_overlap() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("requests").unwrap().inc();
    let producer = DelayedProducer::new(Duration::from_millis(20));

    let reporter = Arc::new(
        KafkaReporterBuilder::new(registry, "localhost:9092", "metrics")
            .synchronous(true)
            .build_with({
                let producer = producer.clone();
                move |_| Ok(producer)
            })
            .unwrap(),
    );

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let reporter = reporter.clone();
        tasks.push(tokio::spawn(async move { reporter.report().await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(producer.sent.load(Ordering::SeqCst), 8);
    assert_eq!(producer.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.stats().reports_succeeded, 8);
}

#[tokio::test(start_paused = true)]
async fn test_async_mode_does_not_wait_for_acknowledgement() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("requests").unwrap().inc();
    let producer = DelayedProducer::new(Duration::from_secs(1));

    let reporter = KafkaReporterBuilder::new(registry, "localhost:9092", "metrics")
        .batch_size(50)
        .build_with({
            let producer = producer.clone();
            move |_| Ok(producer)
        })
        .unwrap();
    assert_eq!(reporter.producer_config().batch_size(), 50);

    let start = tokio::time::Instant::now();
    reporter.report().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(producer.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sync_mode_waits_for_acknowledgement() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("requests").unwrap().inc();
    let producer = DelayedProducer::new(Duration::from_secs(1));

    let reporter = KafkaReporterBuilder::new(registry, "localhost:9092", "metrics")
        .synchronous(true)
        .build_with({
            let producer = producer.clone();
            move |_| Ok(producer)
        })
        .unwrap();

    let start = tokio::time::Instant::now();
    reporter.report().await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(producer.in_flight.load(Ordering::SeqCst), 0);
}

#[test]
fn test_missing_topic_fails_at_build() {
    let result = KafkaReporterBuilder::default()
        .registry(Arc::new(MetricRegistry::new()))
        .broker_list("localhost:9092")
        .build_with(|_| Ok(MemoryProducer::new()));

    assert!(matches!(result, Err(ExporterError::Configuration(_))));
}

#[test]
fn test_missing_brokers_fails_at_build() {
    let result = KafkaReporterBuilder::default()
        .registry(Arc::new(MetricRegistry::new()))
        .topic("metrics")
        .build_with(|_| Ok(MemoryProducer::new()));

    assert!(matches!(result, Err(ExporterError::Configuration(_))));
}

#[test]
fn test_malformed_brokers_fail_producer_initialization() {
    let result = KafkaReporterBuilder::new(Arc::new(MetricRegistry::new()), "kafka1", "metrics")
        .build_with(|_| Ok(MemoryProducer::new()));

    assert!(matches!(
        result,
        Err(ExporterError::ProducerInitialization(_))
    ));
}

#[tokio::test]
async fn test_serialization_error_is_reported() {
    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("broken gauge"))
        }
    }

    let registry = Arc::new(MetricRegistry::new());
    registry.gauge("broken", || Broken).unwrap();
    let producer = MemoryProducer::new();

    let reporter = build(builder(registry), &producer);
    let result = reporter.report().await;

    assert!(matches!(result, Err(ExporterError::Serialization(_))));
    assert!(producer.is_empty());
    assert_eq!(reporter.stats().reports_failed, 1);
}

#[tokio::test]
async fn test_publish_error_is_reported() {
    let registry = Arc::new(MetricRegistry::new());
    let producer = MemoryProducer::new();
    producer.set_failure(Some("broker unreachable"));

    let reporter = build(builder(registry), &producer);
    let result = reporter.report().await;

    match result {
        Err(ExporterError::Publish(e)) => {
            assert_eq!(e.topic, "metrics");
            assert_eq!(e.message, "broker unreachable");
        }
        other => panic!("expected publish error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_builder_from_config() {
    let config = ReporterConfig::parse(
        r#"{
            kafka: { brokers: "k1:9092,k2:9092", topic: "app-metrics", synchronous: true },
            reporter: { name: "app", rate_unit: "minutes", duration_unit: "milliseconds" },
            filters: { exclude_metrics: ["internal.*"] },
        }"#,
    )
    .unwrap();

    let registry = Arc::new(MetricRegistry::new());
    registry.counter("app.requests").unwrap().inc();
    registry.counter("internal.ticks").unwrap().inc();
    let producer = MemoryProducer::new();

    let reporter = build(
        KafkaReporterBuilder::from_config(registry, &config).unwrap(),
        &producer,
    );
    assert_eq!(reporter.name(), "app");
    assert_eq!(reporter.topic(), "app-metrics");
    assert_eq!(reporter.producer_config().brokers().len(), 2);
    assert_eq!(reporter.serializer().rate_unit(), TimeUnit::Minutes);

    let selected = reporter.registry().metric_set(reporter.filter());
    assert_eq!(selected.len(), 1);

    reporter.report().await.unwrap();
    assert_eq!(
        producer.records()[0].value,
        r#"{"app.requests":{"count":1},"internal.ticks":{"count":1}}"#
    );
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_reports_every_period() {
    let registry = Arc::new(MetricRegistry::new());
    registry.counter("ticks").unwrap().inc();
    let producer = MemoryProducer::new();
    let reporter = Arc::new(build(builder(registry), &producer));

    let handle = ScheduledReporter::new(reporter.clone())
        .start(Duration::from_millis(100))
        .unwrap();
    assert!(handle.is_running());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(producer.len(), 3);

    handle.stop().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(producer.len(), 3);
    assert_eq!(reporter.stats().reports_succeeded, 3);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_reports_on_stop() {
    let registry = Arc::new(MetricRegistry::new());
    let producer = MemoryProducer::new();
    let reporter = Arc::new(build(builder(registry), &producer));

    let handle = ScheduledReporter::new(reporter)
        .report_on_stop(true)
        .start(Duration::from_millis(100))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.stop().await;

    assert_eq!(producer.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_schedule() {
    let registry = Arc::new(MetricRegistry::new());
    let producer = MemoryProducer::new();
    let reporter = Arc::new(build(builder(registry), &producer));

    let handle = ScheduledReporter::new(reporter)
        .start(Duration::from_millis(100))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(producer.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_survives_failed_cycles() {
    let registry = Arc::new(MetricRegistry::new());
    let producer = MemoryProducer::new();
    producer.set_failure(Some("broker unreachable"));
    let reporter = Arc::new(build(builder(registry), &producer));

    let handle = ScheduledReporter::new(reporter.clone())
        .start(Duration::from_millis(100))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    producer.set_failure(None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop().await;

    let stats = reporter.stats();
    assert_eq!(stats.reports_failed, 2);
    assert_eq!(stats.reports_succeeded, 1);
    assert_eq!(producer.len(), 1);
}

#[tokio::test]
async fn test_zero_period_is_rejected() {
    let registry = Arc::new(MetricRegistry::new());
    let producer = MemoryProducer::new();
    let reporter = Arc::new(build(builder(registry), &producer));

    let result = ScheduledReporter::new(reporter).start(Duration::ZERO);
    assert!(matches!(result, Err(ExporterError::Configuration(_))));
}

#[test]
fn test_producer_config_reaches_factory() {
    let seen = Arc::new(parking_lot::Mutex::new(None::<ProducerConfig>));
    let captured = seen.clone();

    KafkaReporterBuilder::new(Arc::new(MetricRegistry::new()), "localhost:9092", "metrics")
        .compression_codec(2)
        .build_with(move |config| {
            *captured.lock() = Some(config.clone());
            Ok(MemoryProducer::new())
        })
        .unwrap();

    let config = seen.lock().clone().unwrap();
    assert_eq!(config.properties()["compression.codec"], "2");
    assert_eq!(config.properties()["acks"], "1");
}
