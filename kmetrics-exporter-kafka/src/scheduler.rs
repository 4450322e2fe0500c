//! Periodic execution of report cycles.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kmetrics_core::{MetricFilter, MetricRegistry, MetricSet};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::error::{ExporterError, Result};

/// Something that can be driven by a [`ScheduledReporter`].
pub trait Reporter: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn registry(&self) -> &Arc<MetricRegistry>;

    fn filter(&self) -> &MetricFilter;

    /// Run one report cycle for the metrics selected by the filter.
    fn report(&self, metrics: &MetricSet) -> impl Future<Output = Result<()>> + Send;
}

/// Runs a [`Reporter`] at a fixed delay on the Tokio runtime.
///
/// The first report happens one period after [`start`](Self::start). A cycle
/// that overruns the period delays the next tick instead of queueing extra
/// ones. Failed cycles are logged and the schedule continues.
pub struct ScheduledReporter<R: Reporter> {
    reporter: Arc<R>,
    report_on_stop: bool,
}

impl<R: Reporter> ScheduledReporter<R> {
    pub fn new(reporter: Arc<R>) -> Self {
        Self {
            reporter,
            report_on_stop: false,
        }
    }

    /// Run one last report when the schedule is stopped.
    pub fn report_on_stop(mut self, enabled: bool) -> Self {
        self.report_on_stop = enabled;
        self
    }

    pub fn reporter(&self) -> &Arc<R> {
        &self.reporter
    }

    /// Spawn the reporting task.
    pub fn start(self, period: Duration) -> Result<ReporterHandle> {
        if period.is_zero() {
            return Err(ExporterError::configuration("Report period must be > 0"));
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let reporter = self.reporter;
        let report_on_stop = self.report_on_stop;
        let name = reporter.name().to_string();

        info!(reporter = %name, period_ms = period.as_millis() as u64, "Starting scheduled reporter");

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_cycle(reporter.as_ref()).await;
                    }
                    changed = shutdown_rx.changed() => {
                        // A dropped handle stops the schedule as well.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            if report_on_stop {
                run_cycle(reporter.as_ref()).await;
            }

            info!(reporter = %reporter.name(), "Scheduled reporter stopped");
        });

        Ok(ReporterHandle {
            name,
            shutdown: shutdown_tx,
            task,
        })
    }
}

async fn run_cycle<R: Reporter>(reporter: &R) {
    let metrics = reporter.registry().metric_set(reporter.filter());
    if let Err(e) = reporter.report(&metrics).await {
        error!(reporter = %reporter.name(), error = %e, "Report cycle failed");
    }
}

/// Handle to a running schedule. Dropping it stops future cycles.
#[derive(Debug)]
pub struct ReporterHandle {
    name: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop scheduling and wait for an in-flight cycle to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(reporter = %self.name, error = %e, "Scheduled reporter task failed");
        }
    }
}
