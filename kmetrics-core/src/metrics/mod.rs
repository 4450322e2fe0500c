//! The five metric kinds held by a [`MetricRegistry`](crate::MetricRegistry).
//!
//! - [`Gauge`] - instantaneous value computed on read
//! - [`Counter`] - adjustable `i64` count
//! - [`Histogram`] - distribution of observed values
//! - [`Meter`] - event count plus moving-average rates
//! - [`Timer`] - histogram of durations plus a meter of calls

mod counter;
mod gauge;
mod histogram;
mod meter;
mod timer;

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{DEFAULT_RESERVOIR_SIZE, Histogram, Snapshot};
pub use meter::Meter;
pub use timer::{Timer, TimerContext};
