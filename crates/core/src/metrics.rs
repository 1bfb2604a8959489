//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Engine (activity attempts and durations, workflow runs)
//! - Activities (bytes uploaded, heartbeats, catalogue lookups)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Engine Metrics
// =============================================================================

/// Activity attempts by activity name and result.
pub static ACTIVITY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("beeb_activity_attempts_total", "Total activity attempts"),
        &["activity", "result"], // "success", "retryable", "permanent"
    )
    .unwrap()
});

/// Duration of individual activity attempts.
pub static ACTIVITY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "beeb_activity_duration_seconds",
            "Duration of a single activity attempt",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["activity"],
    )
    .unwrap()
});

/// Workflow runs by kind and result.
pub static WORKFLOW_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("beeb_workflow_runs_total", "Total finished workflow runs"),
        &["kind", "result"], // kind: "download", "parse"
    )
    .unwrap()
});

// =============================================================================
// Activity Metrics
// =============================================================================

/// Bytes uploaded to the object store.
pub static BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "beeb_bytes_uploaded_total",
        "Total bytes uploaded to the object store",
    )
    .unwrap()
});

/// Heartbeats recorded by long-running activities.
pub static HEARTBEATS_SENT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("beeb_heartbeats_total", "Total heartbeats recorded").unwrap()
});

/// Catalogue lookups by result.
pub static CATALOGUE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("beeb_catalogue_lookups_total", "Total catalogue lookups"),
        &["result"], // "found", "unknown", "error"
    )
    .unwrap()
});

/// Returns every core metric for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Engine
        Box::new(ACTIVITY_ATTEMPTS.clone()),
        Box::new(ACTIVITY_DURATION.clone()),
        Box::new(WORKFLOW_RUNS.clone()),
        // Activities
        Box::new(BYTES_UPLOADED.clone()),
        Box::new(HEARTBEATS_SENT.clone()),
        Box::new(CATALOGUE_LOOKUPS.clone()),
    ]
}
