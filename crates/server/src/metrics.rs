//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the chaptergrab server:
//! - HTTP request metrics (latency, counts)
//! - Progress stream connections
//! - Jobs by status (collected dynamically)
//!
//! Core metrics (launches, outcomes, listeners) are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use chaptergrab_core::JobStatus;

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
            "chaptergrab_http_request_duration_seconds",
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
        Opts::new("chaptergrab_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chaptergrab_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Progress Stream Metrics
// =============================================================================

/// Open progress streams.
pub static PROGRESS_STREAMS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chaptergrab_progress_streams_active",
        "Number of open progress streams",
    )
    .unwrap()
});

/// Progress streams opened (cumulative).
pub static PROGRESS_STREAMS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chaptergrab_progress_streams_total",
        "Total progress streams opened since startup",
    )
    .unwrap()
});

/// Progress records a slow stream skipped because its buffer was full.
pub static PROGRESS_RECORDS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chaptergrab_progress_records_dropped_total",
        "Progress records skipped for streams that fell behind",
    )
    .unwrap()
});

// =============================================================================
// Job Metrics (collected dynamically)
// =============================================================================

/// Jobs by current status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("chaptergrab_jobs_by_status", "Current job count by status"),
        &["status"],
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

    // Progress streams
    registry
        .register(Box::new(PROGRESS_STREAMS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_STREAMS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_RECORDS_DROPPED.clone()))
        .unwrap();

    // Jobs
    registry
        .register(Box::new(JOBS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (launches, outcomes, event fan-out)
    for metric in chaptergrab_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let jobs = state.registry().list();
    for status in [
        JobStatus::Idle,
        JobStatus::Running,
        JobStatus::Pausing,
        JobStatus::Paused,
        JobStatus::Done,
        JobStatus::Error,
    ] {
        let count = jobs.iter().filter(|job| job.status == status).count();
        JOBS_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }
}
