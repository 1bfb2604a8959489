//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the beeb server:
//! - HTTP request metrics (latency, counts)
//! - Log stream WebSocket metrics
//! - Download runs by phase (collected dynamically)
//!
//! Activity and workflow metrics live in `beeb_core::metrics` and are
//! registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use beeb_core::DownloadPhase;

use crate::state::AppState;

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
            "beeb_http_request_duration_seconds",
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
        Opts::new("beeb_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "beeb_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active log stream connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "beeb_ws_connections_active",
        "Number of active log stream connections",
    )
    .unwrap()
});

/// Total log stream connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "beeb_ws_connections_total",
        "Total log stream connections since startup",
    )
    .unwrap()
});

/// Log lines relayed to clients.
pub static WS_MESSAGES_SENT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("beeb_ws_messages_sent_total", "Log lines relayed to clients").unwrap()
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Download runs accepted by the API.
pub static DOWNLOADS_STARTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "beeb_downloads_started_total",
        "Download runs started through the API",
    )
    .unwrap()
});

/// Runs by current phase (collected dynamically).
pub static RUNS_BY_PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("beeb_runs_by_phase", "Current run count by phase"),
        &["phase"],
    )
    .unwrap()
});

/// Workflow ids currently held by the scheduler, children included.
pub static WORKFLOWS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "beeb_workflows_running",
        "Workflows currently running, children included",
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

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();

    // Runs
    registry
        .register(Box::new(DOWNLOADS_STARTED_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(RUNS_BY_PHASE.clone())).unwrap();
    registry
        .register(Box::new(WORKFLOWS_RUNNING.clone()))
        .unwrap();

    // Core metrics (activities, workflows, uploads, heartbeats)
    for metric in beeb_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh gauges from current application state before a scrape.
pub fn collect_dynamic_metrics(state: &AppState) {
    WORKFLOWS_RUNNING.set(state.scheduler().running_count() as i64);

    let counts = state.runs().count_by_phase();
    for phase in [
        DownloadPhase::Fetching,
        DownloadPhase::FanningOut,
        DownloadPhase::Aggregating,
        DownloadPhase::Succeeded,
        DownloadPhase::Failed,
    ] {
        let count = counts.get(&phase).copied().unwrap_or(0);
        RUNS_BY_PHASE
            .with_label_values(&[phase.as_str()])
            .set(count as i64);
    }
}

/// Normalize a path for metric labels (replace run ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    static RUN_ID: Lazy<regex_lite::Regex> = Lazy::new(|| {
        regex_lite::Regex::new(r"/download-pid-[a-z0-9]+-[0-9a-f]+").unwrap()
    });
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    let result = RUN_ID.replace_all(path, "/{id}");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    result.to_string()
}
