//! Include/exclude filtering of scraped samples by metric name.

use tracing::warn;

use crate::config::FilterConfig;
use crate::snapshot::{SampleKey, Snapshot};

/// Glob-based sample filter.
pub struct MetricFilter {
    include_metrics: Vec<glob::Pattern>,
    exclude_metrics: Vec<glob::Pattern>,
}

impl MetricFilter {
    /// Create a new filter from configuration.
    ///
    /// Invalid patterns are logged and ignored.
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            include_metrics: compile(&config.include_metrics),
            exclude_metrics: compile(&config.exclude_metrics),
        }
    }

    /// True when no pattern is configured.
    pub fn is_pass_through(&self) -> bool {
        self.include_metrics.is_empty() && self.exclude_metrics.is_empty()
    }

    /// Check if a sample should be kept.
    pub fn should_include(&self, key: &SampleKey) -> bool {
        let name = key.metric_name();

        if !self.include_metrics.is_empty() && !self.include_metrics.iter().any(|p| p.matches(name))
        {
            return false;
        }

        !self.exclude_metrics.iter().any(|p| p.matches(name))
    }

    /// Drop filtered samples from a snapshot, returning how many were removed.
    pub fn apply(&self, snapshot: &mut Snapshot) -> usize {
        if self.is_pass_through() {
            return 0;
        }

        let before = snapshot.len();
        snapshot.retain(|k| self.should_include(k));
        before - snapshot.len()
    }
}

impl Default for MetricFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}

fn compile(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, error = %e, "Ignoring invalid metric filter pattern");
                None
            }
        })
        .collect()
}
