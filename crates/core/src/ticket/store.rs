//! Ticket storage trait and types.

use std::fmt;

use crate::generation::ContextSnapshot;
use crate::ticket::{DependencyEdge, Ticket, TicketPatch, TicketStatus, TicketType};

/// Error type for ticket and project storage operations.
#[derive(Debug)]
pub enum TicketError {
    /// Ticket not found.
    NotFound(String),
    /// Project not found.
    ProjectNotFound(String),
    /// Cannot perform operation due to current state.
    InvalidState {
        ticket_id: String,
        current_state: String,
        operation: String,
    },
    /// Project cannot change status from its current state.
    InvalidProjectState {
        project_id: String,
        current_state: String,
        operation: String,
    },
    /// Malformed input.
    Validation(String),
    /// Database error.
    Database(String),
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::NotFound(id) => write!(f, "Ticket not found: {}", id),
            TicketError::ProjectNotFound(id) => write!(f, "Project not found: {}", id),
            TicketError::InvalidState {
                ticket_id,
                current_state,
                operation,
            } => write!(
                f,
                "Cannot {} ticket {}: current state is {}",
                operation, ticket_id, current_state
            ),
            TicketError::InvalidProjectState {
                project_id,
                current_state,
                operation,
            } => write!(
                f,
                "Cannot {} project {}: current state is {}",
                operation, project_id, current_state
            ),
            TicketError::Validation(msg) => write!(f, "Validation error: {}", msg),
            TicketError::Database(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TicketError {}

impl From<rusqlite::Error> for TicketError {
    fn from(e: rusqlite::Error) -> Self {
        TicketError::Database(e.to_string())
    }
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Filter by project.
    pub project_id: Option<String>,
    /// Filter by status.
    pub status: Option<TicketStatus>,
    /// Filter by ticket type.
    pub ticket_type: Option<TicketType>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            project_id: None,
            status: None,
            ticket_type: None,
            limit: 500,
            offset: 0,
        }
    }

    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self::new().with_project(project_id)
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, ticket_type: TicketType) -> Self {
        self.ticket_type = Some(ticket_type);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Result of a write that may have changed a ticket's status.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub previous: TicketStatus,
    pub ticket: Ticket,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.ticket.status
    }
}

/// Trait for ticket storage backends.
pub trait TicketStore: Send + Sync {
    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, in `order_index` order.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter.
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Edges whose dependent is the given ticket.
    fn dependencies(&self, ticket_id: &str) -> Result<Vec<DependencyEdge>, TicketError>;

    /// All edges between a project's tickets.
    fn edges_for_project(&self, project_id: &str) -> Result<Vec<DependencyEdge>, TicketError>;

    /// Context snapshots staged by the last generation run.
    fn contexts_for_project(&self, project_id: &str)
        -> Result<Vec<ContextSnapshot>, TicketError>;

    /// Move a ticket to a new status, rejecting illegal transitions.
    fn update_status(
        &self,
        id: &str,
        status: TicketStatus,
    ) -> Result<StatusTransition, TicketError>;

    /// Set the assignee, moving `pending`/`ready` tickets to `assigned`.
    fn assign(&self, id: &str, assignee: &str) -> Result<StatusTransition, TicketError>;

    /// Apply a partial update.
    fn apply_patch(&self, id: &str, patch: &TicketPatch) -> Result<Ticket, TicketError>;
}
