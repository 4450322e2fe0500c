//! Metric filtering by name patterns or predicate.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::Metric;

type Predicate = dyn Fn(&str, &Metric) -> bool + Send + Sync;

/// Metric filtering configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for metrics to include (empty = all).
    #[serde(default)]
    pub include_metrics: Vec<String>,

    /// Glob patterns for metrics to exclude.
    #[serde(default)]
    pub exclude_metrics: Vec<String>,
}

/// Decides which registry metrics a reporter includes.
///
/// A metric passes when it matches at least one include pattern (or there are
/// none), matches no exclude pattern, and satisfies the predicate if one is set.
#[derive(Clone, Default)]
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
    predicate: Option<Arc<Predicate>>,
}

impl MetricFilter {
    /// Filter that accepts every metric.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter from an arbitrary predicate over name and metric.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str, &Metric) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// Create a filter from configuration, rejecting invalid patterns.
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            include_metrics: compile(&config.include_metrics)?,
            exclude_metrics: compile(&config.exclude_metrics)?,
            predicate: None,
        })
    }

    /// Check if a metric should be included.
    pub fn matches(&self, name: &str, metric: &Metric) -> bool {
        if !self.include_metrics.is_empty()
            && !self.include_metrics.iter().any(|p| p.matches(name))
        {
            return false;
        }
        if self.exclude_metrics.iter().any(|p| p.matches(name)) {
            return false;
        }

        match &self.predicate {
            Some(predicate) => predicate(name, metric),
            None => true,
        }
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| Error::FilterPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

impl fmt::Debug for MetricFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricFilter")
            .field(
                "include_metrics",
                &self.include_metrics.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "exclude_metrics",
                &self.exclude_metrics.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            )
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Counter;

    fn counter() -> Metric {
        Metric::Counter(Arc::new(Counter::new()))
    }

    #[test]
    fn test_all_accepts_everything() {
        let filter = MetricFilter::all();
        assert!(filter.matches("anything", &counter()));
    }

    #[test]
    fn test_include_patterns() {
        let config = FilterConfig {
            include_metrics: vec!["http.*".to_string()],
            exclude_metrics: vec![],
        };
        let filter = MetricFilter::from_config(&config).unwrap();

        assert!(filter.matches("http.requests", &counter()));
        assert!(!filter.matches("jvm.heap", &counter()));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let config = FilterConfig {
            include_metrics: vec!["http.*".to_string()],
            exclude_metrics: vec!["*.debug".to_string()],
        };
        let filter = MetricFilter::from_config(&config).unwrap();

        assert!(filter.matches("http.requests", &counter()));
        assert!(!filter.matches("http.debug", &counter()));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FilterConfig {
            include_metrics: vec!["[unclosed".to_string()],
            exclude_metrics: vec![],
        };

        let result = MetricFilter::from_config(&config);
        assert!(matches!(result, Err(Error::FilterPattern { .. })));
    }

    #[test]
    fn test_predicate_by_kind() {
        let filter = MetricFilter::from_fn(|_, metric| matches!(metric, Metric::Counter(_)));
        let meter = Metric::Meter(Arc::new(crate::metrics::Meter::new()));

        assert!(filter.matches("c", &counter()));
        assert!(!filter.matches("m", &meter));
    }
}
