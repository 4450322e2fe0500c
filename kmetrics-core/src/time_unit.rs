//! Time units used to normalize rates and durations in reports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A unit of time, from nanoseconds up to days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in nanoseconds.
    pub fn as_nanos(&self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Length of one unit in (possibly fractional) seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.as_nanos() as f64 / 1_000_000_000.0
    }

    /// Plural lower-case name, e.g. `"seconds"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }

    /// Singular lower-case name, e.g. `"second"`, as used in rate labels.
    pub fn singular(&self) -> &'static str {
        let name = self.as_str();
        &name[..name.len() - 1]
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nanoseconds" | "ns" => Ok(TimeUnit::Nanoseconds),
            "microseconds" | "us" => Ok(TimeUnit::Microseconds),
            "milliseconds" | "ms" => Ok(TimeUnit::Milliseconds),
            "seconds" | "s" => Ok(TimeUnit::Seconds),
            "minutes" | "m" => Ok(TimeUnit::Minutes),
            "hours" | "h" => Ok(TimeUnit::Hours),
            "days" | "d" => Ok(TimeUnit::Days),
            other => Err(Error::Config(format!("Unknown time unit: '{}'", other))),
        }
    }
}
