use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Number of most recent samples a histogram keeps for its statistics.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Distribution of observed `i64` values.
///
/// The total count covers every update; min/max/mean/percentiles are computed
/// over a sliding window of the most recent samples.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicU64,
    window: Mutex<VecDeque<i64>>,
    capacity: usize,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_reservoir_size(DEFAULT_RESERVOIR_SIZE)
    }

    /// Create a histogram keeping the last `size` samples (at least one).
    pub fn with_reservoir_size(size: usize) -> Self {
        let capacity = size.max(1);
        Self {
            count: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let mut window = self.window.lock();
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(value);
    }

    /// Number of values ever recorded.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        let values = self.window.lock().iter().copied().collect();
        Snapshot::new(values)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted, immutable copy of a histogram's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Vec<i64>,
}

impl Snapshot {
    pub fn new(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { values }
    }

    /// Value at the given quantile (clamped to `0.0..=1.0`).
    ///
    /// Linearly interpolates between the two samples around position
    /// `quantile * (n + 1)`. Returns 0 for an empty snapshot.
    pub fn value(&self, quantile: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }

        let pos = quantile.clamp(0.0, 1.0) * (n + 1) as f64;
        let index = pos as usize;

        if index < 1 {
            return self.values[0] as f64;
        }
        if index >= n {
            return self.values[n - 1] as f64;
        }

        let lower = self.values[index - 1] as f64;
        let upper = self.values[index] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }

    pub fn median(&self) -> f64 {
        self.value(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value(0.999)
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| v as f64).sum();
        sum / self.values.len() as f64
    }

    /// Sample standard deviation; 0 with fewer than two samples.
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.0;
        }

        let mean = self.mean();
        let sum: f64 = self
            .values
            .iter()
            .map(|&v| {
                let diff = v as f64 - mean;
                diff * diff
            })
            .sum();

        (sum / (n - 1) as f64).sqrt()
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}
