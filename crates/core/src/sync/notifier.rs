use async_trait::async_trait;

use crate::project::ProjectStatus;
use crate::ticket::TicketStatus;

/// Outbound seam for change notifications.
///
/// Calls are fire-and-forget: delivery problems are logged by the
/// implementation and never surface to the mutation that triggered them.
#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn broadcast_ticket_update(
        &self,
        project_id: &str,
        ticket_id: &str,
        changes: Vec<String>,
        updated_by: &str,
    );

    async fn broadcast_ticket_status_change(
        &self,
        project_id: &str,
        ticket_id: &str,
        old_status: TicketStatus,
        new_status: TicketStatus,
        changed_by: &str,
    );

    async fn broadcast_project_status_change(
        &self,
        project_id: &str,
        old_status: ProjectStatus,
        new_status: ProjectStatus,
    );
}

/// Notifier that drops every event.
pub struct NoopNotifier;

#[async_trait]
impl SyncNotifier for NoopNotifier {
    async fn broadcast_ticket_update(&self, _: &str, _: &str, _: Vec<String>, _: &str) {}

    async fn broadcast_ticket_status_change(
        &self,
        _: &str,
        _: &str,
        _: TicketStatus,
        _: TicketStatus,
        _: &str,
    ) {
    }

    async fn broadcast_project_status_change(&self, _: &str, _: ProjectStatus, _: ProjectStatus) {}
}
