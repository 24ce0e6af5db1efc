//! Metrics collection for compression runs

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Outcome label for a single shortening attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    Rejected,
    Failed,
}

impl AttemptOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    pub compression_passes: Counter,
    pub shorten_attempts: CounterVec,
    pub shorten_request_duration: Histogram,
    pub tokens_removed: Counter,
    pub compression_runs: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let compression_passes = register_counter_with_registry!(
            Opts::new("compression_passes_total", "Total outer compression passes"),
            registry
        )?;

        let shorten_attempts = register_counter_vec_with_registry!(
            Opts::new("shorten_attempts_total", "Total shortening attempts by outcome"),
            &["outcome"],
            registry
        )?;

        let shorten_request_duration = register_histogram_with_registry!(
            "shorten_request_duration_seconds",
            "Shortening request duration in seconds",
            registry
        )?;

        let tokens_removed = register_counter_with_registry!(
            Opts::new("compression_tokens_removed_total", "Tokens removed by accepted rewrites"),
            registry
        )?;

        let compression_runs = register_counter_vec_with_registry!(
            Opts::new("compression_runs_total", "Completed compression runs by outcome"),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            compression_passes,
            shorten_attempts,
            shorten_request_duration,
            tokens_removed,
            compression_runs,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_pass(&self) {
        self.compression_passes.inc();
    }

    /// Record one shortening attempt; `removed` is only counted on acceptance
    pub fn record_attempt(&self, outcome: AttemptOutcome, seconds: f64, removed: usize) {
        self.shorten_attempts.with_label_values(&[outcome.as_str()]).inc();
        self.shorten_request_duration.observe(seconds);
        if outcome == AttemptOutcome::Accepted {
            self.tokens_removed.inc_by(removed as f64);
        }
    }

    pub fn record_run(&self, outcome: &str) {
        self.compression_runs.with_label_values(&[outcome]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_attempts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_attempt(AttemptOutcome::Accepted, 0.2, 30);
        metrics.record_attempt(AttemptOutcome::Rejected, 0.1, 0);
        metrics.record_attempt(AttemptOutcome::Failed, 0.1, 5);

        assert_eq!(metrics.tokens_removed.get(), 30.0);
        assert_eq!(
            metrics.shorten_attempts.with_label_values(&["rejected"]).get(),
            1.0
        );
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_pass();
        metrics.record_run("converged");
        let text = metrics.export_prometheus();
        assert!(text.contains("compression_passes_total 1"));
        assert!(text.contains("compression_runs_total{outcome=\"converged\"} 1"));
    }
}
