//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Generation pipeline (runs, duration, cycles, tickets)
//! - Sync coordinator (connections, evictions, broadcasts, auth)
//! - LLM usage

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Generation Metrics
// =============================================================================

/// Generation runs total by result.
pub static GENERATION_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketwright_generation_runs_total",
            "Total ticket generation runs",
        ),
        &["result"], // "success", "fallback", "failed"
    )
    .unwrap()
});

/// Generation run duration in seconds.
pub static GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketwright_generation_duration_seconds",
            "Duration of a generation run",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Generation runs aborted by a dependency cycle.
pub static CYCLES_DETECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketwright_cycles_detected_total",
        "Generation runs aborted by a cyclic dependency",
    )
    .unwrap()
});

/// Tickets persisted by generation runs.
pub static TICKETS_GENERATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketwright_tickets_generated_total",
        "Total tickets written by generation runs",
    )
    .unwrap()
});

// =============================================================================
// Sync Metrics
// =============================================================================

/// Live sockets attached to the coordinator.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketwright_ws_connections_active",
        "Number of live sockets attached to the sync coordinator",
    )
    .unwrap()
});

/// Sockets attached since startup.
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketwright_ws_connections_total",
        "Total sockets attached since startup",
    )
    .unwrap()
});

/// Connections evicted by the heartbeat timeout.
pub static WS_EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketwright_ws_evictions_total",
        "Connections evicted for missing heartbeats",
    )
    .unwrap()
});

/// Broadcast deliveries by event type.
pub static BROADCAST_DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketwright_broadcast_deliveries_total",
            "Events delivered to subscribed connections",
        ),
        &["event"],
    )
    .unwrap()
});

/// Broadcast delivery failures by event type.
pub static BROADCAST_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketwright_broadcast_failures_total",
            "Events that could not be handed to a connection",
        ),
        &["event"],
    )
    .unwrap()
});

/// Socket authentication failures by reason.
pub static WS_AUTH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketwright_ws_auth_failures_total",
            "WebSocket authentication failures",
        ),
        &["reason"],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketwright_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Generation
        Box::new(GENERATION_RUNS.clone()),
        Box::new(GENERATION_DURATION.clone()),
        Box::new(CYCLES_DETECTED.clone()),
        Box::new(TICKETS_GENERATED.clone()),
        // Sync
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(WS_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_EVICTIONS.clone()),
        Box::new(BROADCAST_DELIVERIES.clone()),
        Box::new(BROADCAST_FAILURES.clone()),
        Box::new(WS_AUTH_FAILURES.clone()),
        // External services
        Box::new(LLM_TOKENS.clone()),
    ]
}
