use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, projects, tickets, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes, behind bearer-token auth
    let api_routes = Router::new()
        .route("/config", get(handlers::get_config))
        // Projects
        .route("/projects", post(projects::create_project))
        .route("/projects/{id}", get(projects::get_project))
        .route("/projects/{id}/generate", post(projects::generate))
        .route("/projects/{id}/tickets", get(projects::list_tickets))
        .route("/projects/{id}/status", post(projects::update_project_status))
        // Tickets
        .route(
            "/tickets/{id}",
            get(tickets::get_ticket).patch(tickets::update_ticket),
        )
        .route("/tickets/{id}/status", post(tickets::update_status))
        .route("/tickets/{id}/assign", post(tickets::assign_ticket))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ))
        // Added after the auth layer so probes need no token
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        // The socket authenticates in-band
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
