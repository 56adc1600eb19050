//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Ticketwright server:
//! - HTTP request metrics (latency, counts, errors)
//! - Ticket and project counts (collected dynamically)
//! - Sync connection gauges (collected dynamically)
//!
//! Generation and sync counters live in the core crate and are registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use ticketwright_core::{TicketFilter, TicketStatus};

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
            "ticketwright_http_request_duration_seconds",
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
        Opts::new("ticketwright_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketwright_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// HTTP authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketwright_http_auth_failures_total",
            "Total HTTP authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics (collected dynamically)
// =============================================================================

/// Tickets by current status.
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "ticketwright_tickets_by_status",
            "Current ticket count by status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Generations currently running.
pub static GENERATIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketwright_generations_in_flight",
        "Number of generation runs currently executing",
    )
    .unwrap()
});

// =============================================================================
// Sync Metrics (collected dynamically)
// =============================================================================

/// Sockets that have not authenticated yet.
pub static SYNC_UNAUTHENTICATED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketwright_sync_unauthenticated_connections",
        "Connected sockets that have not authenticated yet",
    )
    .unwrap()
});

/// Total project subscriptions across all connections.
pub static SYNC_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketwright_sync_subscriptions",
        "Project subscriptions across all connections",
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
    registry
        .register(Box::new(AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    // Tickets
    registry
        .register(Box::new(TICKETS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(GENERATIONS_IN_FLIGHT.clone()))
        .unwrap();

    // Sync
    registry
        .register(Box::new(SYNC_UNAUTHENTICATED.clone()))
        .unwrap();
    registry
        .register(Box::new(SYNC_SUBSCRIPTIONS.clone()))
        .unwrap();

    // Core metrics (generation pipeline, sync coordinator, LLM)
    for metric in ticketwright_core::metrics::all_metrics() {
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

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the store and coordinator.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(stats) = state.sync().stats().await {
        SYNC_UNAUTHENTICATED.set(stats.unauthenticated as i64);
        SYNC_SUBSCRIPTIONS.set(stats.subscriptions as i64);
    }

    GENERATIONS_IN_FLIGHT.set(state.generations_in_flight() as i64);

    let ticket_store = state.ticket_store();
    for status in [
        TicketStatus::Pending,
        TicketStatus::Ready,
        TicketStatus::Assigned,
        TicketStatus::InProgress,
        TicketStatus::Review,
        TicketStatus::Blocked,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ] {
        let filter = TicketFilter::new().with_status(status);
        if let Ok(count) = ticket_store.count(&filter) {
            TICKETS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
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
