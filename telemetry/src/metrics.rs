//! Prometheus metric series for observability.
//!
//! All metrics are registered once, globally, behind a [`Lazy`] so any
//! component can record against them without threading a registry handle
//! through every call site.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::TelemetryError;

const LATENCY_BUCKETS_MS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 500.0, 1_000.0, 2_500.0, 5_000.0,
];

/// Global metrics instance, initialized lazily on first access.
pub static METRICS: Lazy<Result<CodeIntelMetrics, TelemetryError>> = Lazy::new(CodeIntelMetrics::new);

/// Container for every metric series the design requires.
#[derive(Clone)]
pub struct CodeIntelMetrics {
    /// `search_latency_ms{phase, success}`
    pub search_latency_ms: HistogramVec,
    /// `cache_operations{namespace, hit}`
    pub cache_operations: CounterVec,
    /// `graph_expansion_latency_ms`
    pub graph_expansion_latency_ms: HistogramVec,
    /// `bundle_assembly_duration_ms{from_cache}`
    pub bundle_assembly_duration_ms: HistogramVec,
    /// `circuit_state{phase}` (0=closed, 1=open, 2=half-open)
    pub circuit_state: GaugeVec,
    /// `budget_exhaustion_total`
    pub budget_exhaustion_total: CounterVec,
}

impl CodeIntelMetrics {
    pub fn new() -> Result<Self, TelemetryError> {
        Ok(Self {
            search_latency_ms: register_histogram_vec!(
                "codeintel_search_latency_ms",
                "Latency of a retrieval phase in milliseconds",
                &["phase", "success"],
                LATENCY_BUCKETS_MS.to_vec()
            )
            .map_err(TelemetryError::register)?,

            cache_operations: register_counter_vec!(
                "codeintel_cache_operations_total",
                "Cache fabric operations by namespace and outcome",
                &["namespace", "hit"]
            )
            .map_err(TelemetryError::register)?,

            graph_expansion_latency_ms: register_histogram_vec!(
                "codeintel_graph_expansion_latency_ms",
                "Latency of graph traversal in milliseconds",
                &[] as &[&str],
                LATENCY_BUCKETS_MS.to_vec()
            )
            .map_err(TelemetryError::register)?,

            bundle_assembly_duration_ms: register_histogram_vec!(
                "codeintel_bundle_assembly_duration_ms",
                "Latency of bundle assembly in milliseconds",
                &["from_cache"],
                LATENCY_BUCKETS_MS.to_vec()
            )
            .map_err(TelemetryError::register)?,

            circuit_state: register_gauge_vec!(
                "codeintel_circuit_state",
                "Circuit breaker state per phase (0=closed, 1=open, 2=half-open)",
                &["phase"]
            )
            .map_err(TelemetryError::register)?,

            budget_exhaustion_total: register_counter_vec!(
                "codeintel_budget_exhaustion_total",
                "Number of times a token budget was exhausted during assembly",
                &[] as &[&str]
            )
            .map_err(TelemetryError::register)?,
        })
    }

    pub fn record_search_latency(&self, phase: &str, success: bool, duration_ms: f64) {
        self.search_latency_ms
            .with_label_values(&[phase, &success.to_string()])
            .observe(duration_ms);
    }

    pub fn record_cache_operation(&self, namespace: &str, hit: bool) {
        self.cache_operations
            .with_label_values(&[namespace, &hit.to_string()])
            .inc();
    }

    pub fn record_graph_expansion_latency(&self, duration_ms: f64) {
        self.graph_expansion_latency_ms
            .with_label_values(&[])
            .observe(duration_ms);
    }

    pub fn record_bundle_assembly(&self, from_cache: bool, duration_ms: f64) {
        self.bundle_assembly_duration_ms
            .with_label_values(&[&from_cache.to_string()])
            .observe(duration_ms);
    }

    pub fn set_circuit_state(&self, phase: &str, state: u8) {
        self.circuit_state
            .with_label_values(&[phase])
            .set(state as f64);
    }

    pub fn record_budget_exhaustion(&self) {
        self.budget_exhaustion_total.with_label_values(&[]).inc();
    }
}

/// Render all registered metrics in Prometheus text exposition format.
pub fn render() -> Result<Vec<u8>, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Encode {
            reason: e.to_string(),
        })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_initialize_without_error() {
        assert!(METRICS.as_ref().is_ok());
    }

    #[test]
    fn recording_does_not_panic() {
        let metrics = METRICS.as_ref().expect("metrics init");
        metrics.record_search_latency("search", true, 12.5);
        metrics.record_cache_operation("bundle", false);
        metrics.record_graph_expansion_latency(3.0);
        metrics.record_bundle_assembly(true, 4.0);
        metrics.set_circuit_state("storage", 0);
        metrics.record_budget_exhaustion();
    }

    #[test]
    fn render_produces_nonempty_text() {
        let _ = METRICS.as_ref().expect("metrics init");
        let text = render().expect("render should succeed");
        assert!(!text.is_empty());
    }
}
