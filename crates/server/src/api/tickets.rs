//! Ticket API handlers.
//!
//! Reads go straight to the store; every mutation goes through the
//! `TicketService` so subscribers hear about it.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketwright_core::ticket::DependencyEdge;
use ticketwright_core::{ServiceError, Ticket, TicketPatch, TicketStatus};
use tracing::error;

use super::middleware::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: TicketStatus,
}

/// Request body for assigning a ticket
#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub assignee: String,
}

/// Ticket with the tickets it depends on
#[derive(Debug, Serialize)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub dependencies: Vec<DependencyEdge>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

impl From<ServiceError> for ErrorResponse {
    fn from(e: ServiceError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// Map a service failure onto an HTTP status.
pub fn service_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::TicketNotFound(_) | ServiceError::ProjectNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
        ServiceError::Store(msg) => {
            error!("Store failure: {}", msg);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::from(e)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Get a ticket by ID, with its dependency edges
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketDetailResponse>, ApiError> {
    let ticket = state.service().get_ticket(&id).map_err(service_error)?;
    let dependencies = state
        .ticket_store()
        .dependencies(&id)
        .map_err(|e| service_error(e.into()))?;

    Ok(Json(TicketDetailResponse {
        ticket,
        dependencies,
    }))
}

/// Patch editable ticket fields
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(patch): Json<TicketPatch>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .service()
        .update_ticket(&id, &patch, &user_id)
        .await
        .map(Json)
        .map_err(service_error)
}

/// Move a ticket to a new workflow status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .service()
        .update_status(&id, body.status, &user_id)
        .await
        .map(Json)
        .map_err(service_error)
}

/// Assign a ticket to someone
pub async fn assign_ticket(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Ticket>, ApiError> {
    state
        .service()
        .assign(&id, &body.assignee, &user_id)
        .await
        .map(Json)
        .map_err(service_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_mapping() {
        let cases = [
            (ServiceError::TicketNotFound("t".into()), StatusCode::NOT_FOUND),
            (ServiceError::ProjectNotFound("p".into()), StatusCode::NOT_FOUND),
            (ServiceError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ServiceError::InvalidTransition("no".into()), StatusCode::CONFLICT),
            (ServiceError::Store("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = service_error(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_update_status_body_uses_snake_case() {
        let body: UpdateStatusBody = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(body.status, TicketStatus::InProgress);
        assert!(serde_json::from_str::<UpdateStatusBody>(r#"{"status":"done"}"#).is_err());
    }
}
