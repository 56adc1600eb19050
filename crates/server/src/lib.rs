//! HTTP and WebSocket host for the ticket orchestration engine.

pub mod api;
pub mod metrics;
pub mod state;
