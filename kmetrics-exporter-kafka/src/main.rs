//! Publish kmetrics reports to Kafka.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};

use kmetrics_core::{MetricRegistry, init_tracing};
use kmetrics_exporter_kafka::{KafkaReporterBuilder, ReporterConfig, ScheduledReporter};

/// Publish kmetrics reports to a Kafka topic.
#[derive(Parser, Debug)]
#[command(name = "kmetrics-reporter")]
#[command(about = "Publish metrics registry snapshots to Kafka")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Broker list (overrides config).
    #[arg(long)]
    brokers: Option<String>,

    /// Topic (overrides config).
    #[arg(long)]
    topic: Option<String>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ReporterConfig::load_from_file(config_path)?
    } else {
        ReporterConfig::default()
    };

    if let Some(brokers) = args.brokers {
        config.kafka.brokers = brokers;
    }
    if let Some(topic) = args.topic {
        config.kafka.topic = topic;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_tracing(&config.logging)?;

    info!("Starting kmetrics Kafka reporter");

    let registry = Arc::new(MetricRegistry::new());
    let started = Instant::now();
    registry.gauge("process.uptime.seconds", move || started.elapsed().as_secs())?;

    let reporter = Arc::new(KafkaReporterBuilder::from_config(registry.clone(), &config)?.build()?);

    let weak = Arc::downgrade(&reporter);
    registry.gauge("reporter.reports.succeeded", move || {
        weak.upgrade()
            .map(|r| r.stats().reports_succeeded)
            .unwrap_or_default()
    })?;
    let handle = ScheduledReporter::new(reporter.clone())
        .report_on_stop(config.reporter.report_on_stop)
        .start(config.reporter.period())?;

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    handle.stop().await;

    if let Err(e) = reporter.close(Duration::from_secs(5)) {
        warn!(error = %e, "Producer flush did not complete");
    }

    let stats = reporter.stats();
    info!(
        reports_attempted = stats.reports_attempted,
        reports_succeeded = stats.reports_succeeded,
        reports_failed = stats.reports_failed,
        bytes_published = stats.bytes_published,
        "Final statistics"
    );

    info!("Reporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
