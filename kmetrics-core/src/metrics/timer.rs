use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

use super::histogram::{Histogram, Snapshot};
use super::meter::Meter;

/// A histogram of durations (in nanoseconds) combined with a meter of calls.
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
    clock: Arc<dyn Clock>,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            histogram: Histogram::new(),
            meter: Meter::with_clock(clock.clone()),
            clock,
        }
    }

    /// Record one call that took `duration`.
    pub fn update(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Start timing a call; the duration is recorded when the context is
    /// stopped or dropped.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.tick(),
            stopped: false,
        }
    }

    /// Time a closure.
    pub fn time_fn<T>(&self, f: impl FnOnce() -> T) -> T {
        let _ctx = self.time();
        f()
    }

    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Snapshot of recorded durations in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }

    pub fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// In-flight timing started by [`Timer::time`].
#[must_use = "the call is timed until the context is stopped or dropped"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record the elapsed time and return it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = Duration::from_nanos(self.timer.clock.tick().saturating_sub(self.start));
        if !self.stopped {
            self.stopped = true;
            self.timer.update(elapsed);
        }
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}
