use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};

const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;
const SECONDS_PER_MINUTE: f64 = 60.0;
const TICK_INTERVAL_SECS: f64 = 5.0;

/// Exponentially weighted moving average, ticked every five seconds.
struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    /// Events per nanosecond; `None` until the first tick.
    rate: Mutex<Option<f64>>,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / SECONDS_PER_MINUTE / minutes).exp(),
            uncounted: AtomicU64::new(0),
            rate: Mutex::new(None),
        }
    }

    fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL_NANOS as f64;

        let mut rate = self.rate.lock();
        *rate = Some(match *rate {
            Some(current) => current + self.alpha * (instant_rate - current),
            None => instant_rate,
        });
    }

    fn per_second(&self) -> f64 {
        self.rate.lock().unwrap_or(0.0) * 1_000_000_000.0
    }
}

/// Counts events and tracks their mean rate plus 1, 5 and 15 minute
/// moving-average rates. All rates are in events per second.
pub struct Meter {
    count: AtomicU64,
    start: u64,
    last_tick: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    clock: Arc<dyn Clock>,
}

impl Meter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start = clock.tick();
        Self {
            count: AtomicU64::new(0),
            start,
            last_tick: AtomicU64::new(start),
            m1: Ewma::over_minutes(1.0),
            m5: Ewma::over_minutes(5.0),
            m15: Ewma::over_minutes(15.0),
            clock,
        }
    }

    pub fn mark(&self) {
        self.mark_n(1);
    }

    pub fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.clock.tick().saturating_sub(self.start);
        if elapsed == 0 {
            return 0.0;
        }
        count as f64 / elapsed as f64 * 1_000_000_000.0
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.per_second()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.per_second()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.per_second()
    }

    /// Catch the moving averages up with every full interval that has elapsed.
    fn tick_if_necessary(&self) {
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let new_tick = self.clock.tick();
        let age = new_tick.saturating_sub(old_tick);
        if age <= TICK_INTERVAL_NANOS {
            return;
        }

        let interval_start = new_tick - age % TICK_INTERVAL_NANOS;
        if self
            .last_tick
            .compare_exchange(old_tick, interval_start, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            for _ in 0..age / TICK_INTERVAL_NANOS {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
