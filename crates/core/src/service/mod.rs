//! Post-generation mutations: persist first, then notify.

mod tickets;

pub use tickets::TicketService;

use thiserror::Error;

use crate::ticket::TicketError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<TicketError> for ServiceError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound(id) => ServiceError::TicketNotFound(id),
            TicketError::ProjectNotFound(id) => ServiceError::ProjectNotFound(id),
            TicketError::Validation(msg) => ServiceError::Validation(msg),
            err @ (TicketError::InvalidState { .. } | TicketError::InvalidProjectState { .. }) => {
                ServiceError::InvalidTransition(err.to_string())
            }
            TicketError::Database(msg) => ServiceError::Store(msg),
        }
    }
}
