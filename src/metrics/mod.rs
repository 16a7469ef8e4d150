//! Metrics collection for observability

use prometheus::{
    Counter, CounterVec, Histogram, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_counter_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Run metrics
    pub audit_runs: CounterVec,
    pub audit_run_duration: Histogram,

    // Per-item decisions
    pub items_passed: CounterVec,
    pub items_blocked: CounterVec,

    // Scorer metrics
    pub scoring_duration: HistogramVec,
    pub scoring_retries: Counter,
    pub scoring_circuit_open: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let audit_runs = register_counter_vec_with_registry!(
            Opts::new("audit_runs_total", "Total audit runs"),
            &["kind", "status"],
            registry
        )?;

        let audit_run_duration = register_histogram_with_registry!(
            "audit_run_duration_seconds",
            "Audit run duration in seconds",
            registry
        )?;

        let items_passed = register_counter_vec_with_registry!(
            Opts::new("audit_items_passed_total", "Candidates that passed the quality gate"),
            &["kind"],
            registry
        )?;

        let items_blocked = register_counter_vec_with_registry!(
            Opts::new("audit_items_blocked_total", "Candidates blocked by reason"),
            &["kind", "reason"],
            registry
        )?;

        let scoring_duration = register_histogram_vec_with_registry!(
            "audit_scoring_duration_seconds",
            "Quality scorer call duration in seconds",
            &["kind"],
            registry
        )?;

        let scoring_retries = register_counter_with_registry!(
            Opts::new("audit_scoring_retries_total", "Total scoring retries"),
            registry
        )?;

        let scoring_circuit_open = register_counter_with_registry!(
            Opts::new("audit_scoring_circuit_open_total", "Scoring calls rejected by an open circuit"),
            registry
        )?;

        Ok(Self {
            registry,
            audit_runs,
            audit_run_duration,
            items_passed,
            items_blocked,
            scoring_duration,
            scoring_retries,
            scoring_circuit_open,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished run
    pub fn record_run(&self, kind: &str, success: bool, seconds: f64) {
        let status = if success { "success" } else { "error" };
        self.audit_runs.with_label_values(&[kind, status]).inc();
        self.audit_run_duration.observe(seconds);
    }

    pub fn record_passed(&self, kind: &str) {
        self.items_passed.with_label_values(&[kind]).inc();
    }

    pub fn record_blocked(&self, kind: &str, reason: &str) {
        self.items_blocked.with_label_values(&[kind, reason]).inc();
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

/// Helper macro to time operations
#[macro_export]
macro_rules! time_operation {
    ($histogram:expr, $label:expr, $operation:expr) => {{
        let timer = $histogram.with_label_values(&[$label]).start_timer();
        let result = $operation;
        timer.observe_duration();
        result
    }};
}
