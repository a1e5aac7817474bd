//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job lifecycle (starts by mode, terminal outcomes, pause requests)
//! - Event fan-out (published records, active listeners)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Process launches by mode.
pub static JOBS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("chaptergrab_jobs_started_total", "Downloader launches"),
        &["mode"], // "fresh", "restart", "resume"
    )
    .unwrap()
});

/// Terminal outcomes per process instance.
pub static JOB_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "chaptergrab_job_outcomes_total",
            "Terminal outcomes of downloader processes",
        ),
        &["outcome"], // "done", "error", "paused", "launch_failure"
    )
    .unwrap()
});

/// Pause requests that found a running process.
pub static PAUSE_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chaptergrab_pause_requests_total",
        "Pause requests accepted for running jobs",
    )
    .unwrap()
});

/// Processes that ignored SIGTERM and had to be killed.
pub static FORCED_KILLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "chaptergrab_forced_kills_total",
        "Downloader processes killed after the grace period",
    )
    .unwrap()
});

// =============================================================================
// Events
// =============================================================================

/// Records published on the event bus by type.
pub static RECORDS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "chaptergrab_records_published_total",
            "Progress records published",
        ),
        &["type"],
    )
    .unwrap()
});

/// Listeners currently subscribed across all jobs.
pub static LISTENERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "chaptergrab_listeners_active",
        "Progress listeners currently subscribed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOB_OUTCOMES.clone()),
        Box::new(PAUSE_REQUESTS.clone()),
        Box::new(FORCED_KILLS.clone()),
        Box::new(RECORDS_PUBLISHED.clone()),
        Box::new(LISTENERS_ACTIVE.clone()),
    ]
}
