use std::sync::Arc;

use tracing::info;

use super::ServiceError;
use crate::project::{Project, ProjectStatus, ProjectStore};
use crate::sync::SyncNotifier;
use crate::ticket::{Ticket, TicketPatch, TicketStatus, TicketStore};

/// The only writer of ticket and project changes after generation.
///
/// Every method writes to the store first and only then notifies, so clients
/// never hear about a change that was not persisted.
pub struct TicketService {
    tickets: Arc<dyn TicketStore>,
    projects: Arc<dyn ProjectStore>,
    notifier: Arc<dyn SyncNotifier>,
}

impl TicketService {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        projects: Arc<dyn ProjectStore>,
        notifier: Arc<dyn SyncNotifier>,
    ) -> Self {
        Self {
            tickets,
            projects,
            notifier,
        }
    }

    pub fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, ServiceError> {
        self.tickets
            .get(ticket_id)?
            .ok_or_else(|| ServiceError::TicketNotFound(ticket_id.to_string()))
    }

    pub fn get_project(&self, project_id: &str) -> Result<Project, ServiceError> {
        self.projects
            .get_project(project_id)?
            .ok_or_else(|| ServiceError::ProjectNotFound(project_id.to_string()))
    }

    pub async fn update_status(
        &self,
        ticket_id: &str,
        new_status: TicketStatus,
        changed_by: &str,
    ) -> Result<Ticket, ServiceError> {
        let transition = self.tickets.update_status(ticket_id, new_status)?;
        let ticket = transition.ticket;

        info!(
            ticket_id = %ticket.id,
            project_id = %ticket.project_id,
            from = %transition.previous,
            to = %ticket.status,
            "Ticket status changed"
        );
        self.notifier
            .broadcast_ticket_status_change(
                &ticket.project_id,
                &ticket.id,
                transition.previous,
                ticket.status,
                changed_by,
            )
            .await;
        Ok(ticket)
    }

    pub async fn assign(
        &self,
        ticket_id: &str,
        assignee: &str,
        assigned_by: &str,
    ) -> Result<Ticket, ServiceError> {
        let assignee = assignee.trim();
        if assignee.is_empty() {
            return Err(ServiceError::Validation("assignee must not be empty".to_string()));
        }

        let transition = self.tickets.assign(ticket_id, assignee)?;
        let status_changed = transition.changed();
        let previous = transition.previous;
        let ticket = transition.ticket;

        info!(ticket_id = %ticket.id, assignee = %assignee, "Ticket assigned");
        self.notifier
            .broadcast_ticket_update(
                &ticket.project_id,
                &ticket.id,
                vec!["assignee".to_string()],
                assigned_by,
            )
            .await;
        if status_changed {
            self.notifier
                .broadcast_ticket_status_change(
                    &ticket.project_id,
                    &ticket.id,
                    previous,
                    ticket.status,
                    assigned_by,
                )
                .await;
        }
        Ok(ticket)
    }

    pub async fn update_ticket(
        &self,
        ticket_id: &str,
        patch: &TicketPatch,
        updated_by: &str,
    ) -> Result<Ticket, ServiceError> {
        let changes = patch.changed_fields();
        if changes.is_empty() {
            return Err(ServiceError::Validation("patch changes nothing".to_string()));
        }

        let ticket = self.tickets.apply_patch(ticket_id, patch)?;
        self.notifier
            .broadcast_ticket_update(&ticket.project_id, &ticket.id, changes, updated_by)
            .await;
        Ok(ticket)
    }

    /// Move a project between review, approval and delivery states.
    ///
    /// `analyzing` is entered and left only by a generation run; a project
    /// still in it is rejected with `InvalidTransition`.
    pub async fn update_project_status(
        &self,
        project_id: &str,
        new_status: ProjectStatus,
    ) -> Result<Project, ServiceError> {
        if new_status == ProjectStatus::Analyzing {
            return Err(ServiceError::Validation(
                "projects enter analyzing only through generation".to_string(),
            ));
        }

        let transition = self.projects.update_project_status(project_id, new_status)?;
        if transition.previous != new_status {
            info!(
                project_id = %project_id,
                from = %transition.previous,
                to = %new_status,
                "Project status changed"
            );
            self.notifier
                .broadcast_project_status_change(project_id, transition.previous, new_status)
                .await;
        }
        Ok(transition.project)
    }
}
