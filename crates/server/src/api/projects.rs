//! Project API handlers: creation, generation runs and ticket listing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketwright_core::{
    FileManifest, GenerationError, GenerationOutcome, GenerationRequest, Project, ProjectStatus,
    Ticket, TicketFilter, TicketStatus, TicketType,
};
use tracing::info;

use super::tickets::{api_error, service_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProjectBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    /// Relative paths of the prototype's files
    pub files: Vec<String>,
    /// Overrides the stored project description for this run
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectStatusBody {
    pub status: ProjectStatus,
}

/// Query parameters for listing a project's tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct GenerationErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycles: Option<Vec<Vec<String>>>,
}

impl From<&GenerationError> for GenerationErrorBody {
    fn from(e: &GenerationError) -> Self {
        let cycles = match e {
            GenerationError::CyclicDependency { cycles } => Some(cycles.clone()),
            _ => None,
        };
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            cycles,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub project_id: String,
    pub status: ProjectStatus,
    pub fallback: bool,
    pub critical_path: Vec<String>,
    pub tickets: Vec<Ticket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationErrorBody>,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            error: outcome.error.as_ref().map(GenerationErrorBody::from),
            project_id: outcome.project_id,
            status: outcome.status,
            fallback: outcome.fallback,
            critical_path: outcome.critical_path,
            tickets: outcome.tickets,
        }
    }
}

fn generation_status(e: &GenerationError) -> StatusCode {
    match e {
        GenerationError::NoFiles | GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
        GenerationError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        GenerationError::CyclicDependency { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GenerationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProjectBody>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state
        .project_store()
        .create_project(body.name.trim(), &body.description)
        .map_err(|e| service_error(e.into()))?;

    info!(project_id = %project.id, name = %project.name, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .service()
        .get_project(&id)
        .map(Json)
        .map_err(service_error)
}

/// Run the generation pipeline for a project.
///
/// The response body always describes the outcome; failures carry an
/// `error` object and a non-2xx status.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<GenerateResponse>)> {
    let Some(_guard) = state.try_begin_generation(&id) else {
        let error = GenerationErrorBody {
            code: "generation_in_progress".to_string(),
            message: format!("a generation run is already in progress for {}", id),
            cycles: None,
        };
        return Err((
            StatusCode::CONFLICT,
            Json(GenerateResponse {
                project_id: id,
                status: ProjectStatus::Analyzing,
                fallback: false,
                critical_path: Vec::new(),
                tickets: Vec::new(),
                error: Some(error),
            }),
        ));
    };

    let mut request = GenerationRequest::new(&id, FileManifest::new(body.files));
    if let Some(description) = body.description {
        request = request.with_description(description);
    }

    let outcome = state.pipeline().run(request).await;
    match outcome.error.as_ref().map(generation_status) {
        None => Ok(Json(GenerateResponse::from(outcome))),
        Some(status) => Err((status, Json(GenerateResponse::from(outcome)))),
    }
}

/// List a project's tickets in execution order.
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    state.service().get_project(&id).map_err(service_error)?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::for_project(&id)
        .with_limit(limit)
        .with_offset(offset);

    if let Some(ref status) = params.status {
        let status: TicketStatus = status
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_status(status);
    }

    if let Some(ref ticket_type) = params.ticket_type {
        let ticket_type: TicketType = ticket_type
            .parse()
            .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_type(ticket_type);
    }

    let store = state.ticket_store();
    let tickets = store.list(&filter).map_err(|e| service_error(e.into()))?;
    let total = store.count(&filter).map_err(|e| service_error(e.into()))?;

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Move a project through review, approval and delivery.
pub async fn update_project_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ProjectStatusBody>,
) -> Result<Json<Project>, ApiError> {
    state
        .service()
        .update_project_status(&id, body.status)
        .await
        .map(Json)
        .map_err(service_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_status_mapping() {
        assert_eq!(generation_status(&GenerationError::NoFiles), StatusCode::BAD_REQUEST);
        assert_eq!(
            generation_status(&GenerationError::ProjectNotFound("p".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            generation_status(&GenerationError::CyclicDependency { cycles: vec![] }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_error_body_carries_cycles() {
        let err = GenerationError::CyclicDependency {
            cycles: vec![vec!["a".into(), "b".into(), "a".into()]],
        };
        let body = GenerationErrorBody::from(&err);
        assert_eq!(body.code, "cyclic_dependency");
        assert_eq!(body.cycles.unwrap().len(), 1);

        let body = GenerationErrorBody::from(&GenerationError::NoFiles);
        assert_eq!(body.code, "no_files");
        assert!(body.cycles.is_none());
    }
}
