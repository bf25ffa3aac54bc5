//! Prometheus metrics for core components.
//!
//! Covers orchestration instances, per-connector extraction steps, document
//! fetches and snapshot publishing. The server registers [`all_metrics`] in
//! its registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator - Instance Metrics
// =============================================================================

/// Orchestration instances created.
pub static INSTANCES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrapeflow_instances_started_total",
        "Total orchestration instances started",
    )
    .unwrap()
});

/// Instances that reached a terminal state, by result.
pub static INSTANCES_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapeflow_instances_finished_total",
            "Total orchestration instances finished",
        ),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Non-terminal instances picked up again after a restart.
pub static INSTANCES_RESUMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrapeflow_instances_resumed_total",
        "Total orchestration instances resumed on startup",
    )
    .unwrap()
});

/// Workflow steps answered from the step log instead of being executed.
pub static STEPS_REPLAYED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scrapeflow_steps_replayed_total",
        "Total workflow steps replayed from the step log",
    )
    .unwrap()
});

// =============================================================================
// Dispatcher - Extraction Metrics
// =============================================================================

/// Connector extractions by result.
pub static EXTRACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapeflow_extractions_total",
            "Total connector extractions",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Duration of a single connector extraction (fetch + parse).
pub static EXTRACTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scrapeflow_extraction_duration_seconds",
            "Duration of a connector extraction",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Document fetches
// =============================================================================

/// Document fetch duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scrapeflow_fetch_duration_seconds",
            "Duration of document fetches",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["status"],
    )
    .unwrap()
});

/// Document fetch requests by status.
pub static FETCH_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scrapeflow_fetch_requests_total",
            "Total document fetch requests",
        ),
        &["status"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Publisher
// =============================================================================

/// Snapshot publications by backend and result.
pub static PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scrapeflow_publish_total", "Total snapshot publications"),
        &["backend", "result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Instances
        Box::new(INSTANCES_STARTED.clone()),
        Box::new(INSTANCES_FINISHED.clone()),
        Box::new(INSTANCES_RESUMED.clone()),
        Box::new(STEPS_REPLAYED.clone()),
        // Extractions
        Box::new(EXTRACTIONS.clone()),
        Box::new(EXTRACTION_DURATION.clone()),
        // Fetches
        Box::new(FETCH_DURATION.clone()),
        Box::new(FETCH_REQUESTS.clone()),
        // Publisher
        Box::new(PUBLISH_TOTAL.clone()),
    ]
}
