use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use ticketwright_core::{ConnectionStats, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Absent when the sync coordinator has stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<ConnectionStats>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sync = state.sync().stats().await.ok();
    Json(HealthResponse {
        status: if sync.is_some() { "ok" } else { "degraded" }.to_string(),
        sync,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus text exposition.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
