//! Notifier that records events instead of sending them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::project::ProjectStatus;
use crate::sync::{ServerMessage, SyncNotifier};
use crate::ticket::TicketStatus;

/// Records every notification as the `ServerMessage` that would have been
/// broadcast.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<RwLock<Vec<ServerMessage>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ServerMessage> {
        self.events.read().await.clone()
    }

    /// Event types in the order they were recorded.
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .read()
            .await
            .iter()
            .map(ServerMessage::event_type)
            .collect()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    async fn record(&self, message: ServerMessage) {
        self.events.write().await.push(message);
    }
}

#[async_trait]
impl SyncNotifier for RecordingNotifier {
    async fn broadcast_ticket_update(
        &self,
        project_id: &str,
        ticket_id: &str,
        changes: Vec<String>,
        updated_by: &str,
    ) {
        self.record(ServerMessage::TicketUpdated {
            project_id: project_id.to_string(),
            ticket_id: ticket_id.to_string(),
            changes,
            updated_by: updated_by.to_string(),
        })
        .await;
    }

    async fn broadcast_ticket_status_change(
        &self,
        project_id: &str,
        ticket_id: &str,
        old_status: TicketStatus,
        new_status: TicketStatus,
        changed_by: &str,
    ) {
        self.record(ServerMessage::TicketStatusChanged {
            project_id: project_id.to_string(),
            ticket_id: ticket_id.to_string(),
            old_status,
            new_status,
            changed_by: changed_by.to_string(),
        })
        .await;
    }

    async fn broadcast_project_status_change(
        &self,
        project_id: &str,
        old_status: ProjectStatus,
        new_status: ProjectStatus,
    ) {
        self.record(ServerMessage::ProjectStatusChanged {
            project_id: project_id.to_string(),
            old_status,
            new_status,
        })
        .await;
    }
}
