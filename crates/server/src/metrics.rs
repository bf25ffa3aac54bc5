//! Prometheus metrics for observability.
//!
//! HTTP request metrics are recorded by middleware; orchestrator gauges are
//! refreshed from the orchestrator status on every scrape of `/metrics`.
//! Core metrics (instances, extractions, fetches, publishing) are registered
//! from `scrapeflow_core::metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scrapeflow_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scrapeflow_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrapeflow_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrapeflow_orchestrator_running",
        "Whether the orchestrator is running",
    )
    .unwrap()
});

/// Workflow tasks executing in this process.
pub static INSTANCES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scrapeflow_instances_active",
        "Number of instance tasks currently executing",
    )
    .unwrap()
});

/// Non-terminal instances in the store, by state.
pub static INSTANCES_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "scrapeflow_instances_by_state",
            "Number of non-terminal instances by state",
        ),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(INSTANCES_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(INSTANCES_BY_STATE.clone()))
        .unwrap();

    // Core metrics (instances, extractions, fetches, publishing)
    for metric in scrapeflow_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh the orchestrator gauges before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status();

    ORCHESTRATOR_RUNNING.set(if status.running { 1 } else { 0 });
    INSTANCES_ACTIVE.set(status.active_instances as i64);
    INSTANCES_BY_STATE
        .with_label_values(&["pending"])
        .set(status.pending_count as i64);
    INSTANCES_BY_STATE
        .with_label_values(&["running"])
        .set(status.running_count as i64);
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/scrape/instance/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/scrape/instance/{id}");
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/scrape/instance/12345"), "/scrape/instance/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_registry_contains_http_and_core_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        ORCHESTRATOR_RUNNING.set(0);
        INSTANCES_BY_STATE.with_label_values(&["pending"]).set(0);
        scrapeflow_core::metrics::INSTANCES_STARTED.inc();

        let output = encode_metrics();
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
        assert!(output.contains("scrapeflow_http_requests_total"));
        assert!(output.contains("scrapeflow_http_request_duration_seconds"));
        assert!(output.contains("scrapeflow_orchestrator_running"));
        assert!(output.contains("scrapeflow_instances_by_state"));
        assert!(output.contains("scrapeflow_instances_started_total"));
    }
}
