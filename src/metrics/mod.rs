//! Metrics collection for pipeline observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, HistogramVec, Opts, Registry,
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

    // Subdirectory metrics
    pub subdirs_total: CounterVec,
    pub stage_duration: HistogramVec,

    // Document metrics
    pub documents_extracted: CounterVec,

    // Threshold metrics
    pub threshold_fallbacks: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let subdirs_total = register_counter_vec_with_registry!(
            Opts::new("topic_fca_subdirs_total", "Subdirectories processed by outcome"),
            &["outcome"],
            registry
        )?;

        let stage_duration = register_histogram_vec_with_registry!(
            "topic_fca_stage_duration_seconds",
            "Pipeline stage duration in seconds",
            &["stage"],
            registry
        )?;

        let documents_extracted = register_counter_vec_with_registry!(
            Opts::new("topic_fca_documents_extracted_total", "Text extractions by status"),
            &["status"],
            registry
        )?;

        let threshold_fallbacks = register_counter_with_registry!(
            Opts::new(
                "topic_fca_threshold_fallbacks_total",
                "Threshold searches that fell back to keeping every entry"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            subdirs_total,
            stage_duration,
            documents_extracted,
            threshold_fallbacks,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record the outcome of one subdirectory
    pub fn record_subdir(&self, outcome: &str) {
        self.subdirs_total.with_label_values(&[outcome]).inc();
    }

    /// Record a text extraction
    pub fn record_extraction(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.documents_extracted.with_label_values(&[status]).inc();
    }

    /// Record a threshold search that found no grid point reaching the target density
    pub fn record_threshold_fallback(&self) {
        self.threshold_fallbacks.inc();
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

/// Helper macro to time a pipeline stage
#[macro_export]
macro_rules! time_stage {
    ($stage:expr, $operation:expr) => {{
        let timer = $crate::metrics::METRICS
            .stage_duration
            .with_label_values(&[$stage])
            .start_timer();
        let result = $operation;
        timer.observe_duration();
        result
    }};
}
