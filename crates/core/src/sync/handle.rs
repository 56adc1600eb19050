use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{
    ConnectionId, ConnectionSnapshotStore, ConnectionStats, Outbound, ServerMessage,
    SyncCoordinator, SyncError, SyncNotifier,
};
use crate::auth::Authenticator;
use crate::config::SyncConfig;
use crate::project::ProjectStatus;
use crate::ticket::TicketStatus;

pub(crate) enum Command {
    Attach {
        outbound: mpsc::UnboundedSender<Outbound>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Frame {
        connection_id: ConnectionId,
        text: String,
    },
    Detach {
        connection_id: ConnectionId,
    },
    Broadcast {
        message: ServerMessage,
    },
    Stats {
        reply: oneshot::Sender<ConnectionStats>,
    },
}

/// Handle to the sync coordinator task.
///
/// Cheap to clone. Every call is queued on the coordinator's command channel
/// and processed in arrival order.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
}

impl SyncHandle {
    /// Register a socket whose writer drains `outbound`.
    pub async fn attach(
        &self,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Result<ConnectionId, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Attach { outbound, reply })
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    pub async fn client_frame(
        &self,
        connection_id: &str,
        text: impl Into<String>,
    ) -> Result<(), SyncError> {
        self.tx
            .send(Command::Frame {
                connection_id: connection_id.to_string(),
                text: text.into(),
            })
            .await
            .map_err(|_| SyncError::Closed)
    }

    pub async fn detach(&self, connection_id: &str) {
        let command = Command::Detach {
            connection_id: connection_id.to_string(),
        };
        if self.tx.send(command).await.is_err() {
            tracing::debug!(connection_id, "Coordinator gone; detach ignored");
        }
    }

    pub async fn stats(&self) -> Result<ConnectionStats, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)
    }

    async fn broadcast(&self, message: ServerMessage) {
        let event = message.event_type();
        if let Err(e) = self.tx.send(Command::Broadcast { message }).await {
            tracing::error!(event, "Failed to queue broadcast: {}", e);
        }
    }
}

#[async_trait]
impl SyncNotifier for SyncHandle {
    async fn broadcast_ticket_update(
        &self,
        project_id: &str,
        ticket_id: &str,
        changes: Vec<String>,
        updated_by: &str,
    ) {
        self.broadcast(ServerMessage::TicketUpdated {
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
        self.broadcast(ServerMessage::TicketStatusChanged {
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
        self.broadcast(ServerMessage::ProjectStatusChanged {
            project_id: project_id.to_string(),
            old_status,
            new_status,
        })
        .await;
    }
}

/// Background task owning the [`SyncCoordinator`].
pub struct SyncActor {
    rx: mpsc::Receiver<Command>,
    coordinator: SyncCoordinator,
    heartbeat_interval: Duration,
    snapshot_interval: Option<Duration>,
    snapshot_store: Option<Arc<dyn ConnectionSnapshotStore>>,
}

impl SyncActor {
    /// Run until every [`SyncHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!("Sync coordinator started");

        let start = Instant::now();
        let mut heartbeat = interval_at(start + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let snapshot_period = self.snapshot_interval.unwrap_or(Duration::from_secs(3600));
        let mut snapshot = interval_at(start + snapshot_period, snapshot_period);
        snapshot.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let snapshots_enabled = self.snapshot_interval.is_some() && self.snapshot_store.is_some();

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = heartbeat.tick() => {
                    self.coordinator.heartbeat_tick(Instant::now());
                }
                _ = snapshot.tick(), if snapshots_enabled => {
                    self.save_snapshot();
                }
            }
        }

        self.save_snapshot();
        self.coordinator.close_all("server shutting down");
        tracing::info!("Sync coordinator shutting down");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Attach { outbound, reply } => {
                let id = self.coordinator.attach(outbound, Instant::now());
                if reply.send(id.clone()).is_err() {
                    self.coordinator.detach(&id);
                }
            }
            Command::Frame {
                connection_id,
                text,
            } => {
                self.coordinator
                    .handle_frame(&connection_id, &text, Instant::now())
                    .await;
            }
            Command::Detach { connection_id } => {
                self.coordinator.detach(&connection_id);
            }
            Command::Broadcast { message } => {
                self.coordinator.broadcast(&message);
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.coordinator.stats());
            }
        }
    }

    fn save_snapshot(&self) {
        let Some(store) = &self.snapshot_store else {
            return;
        };
        let snapshot = self.coordinator.snapshot();
        match store.save(&snapshot) {
            Ok(()) => tracing::debug!(connections = snapshot.len(), "Connection snapshot saved"),
            Err(e) => tracing::error!("Failed to save connection snapshot: {}", e),
        }
    }
}

/// Build the sync coordinator.
///
/// Loads the last connection snapshot (if a store is given) so that the
/// recovered count is reported. Spawn [`SyncActor::run`] to start serving.
pub fn create_sync_system(
    authenticator: Arc<dyn Authenticator>,
    snapshot_store: Option<Arc<dyn ConnectionSnapshotStore>>,
    config: &SyncConfig,
) -> (SyncHandle, SyncActor) {
    let recovered = match &snapshot_store {
        Some(store) => match store.load() {
            Ok(snapshot) => {
                if !snapshot.is_empty() {
                    tracing::info!(
                        connections = snapshot.len(),
                        "Found connection snapshot from previous run; clients must reconnect"
                    );
                }
                snapshot.len()
            }
            Err(e) => {
                tracing::warn!("Failed to load connection snapshot: {}", e);
                0
            }
        },
        None => 0,
    };

    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let coordinator =
        SyncCoordinator::new(authenticator, config.heartbeat_timeout()).with_recovered(recovered);

    let actor = SyncActor {
        rx,
        coordinator,
        heartbeat_interval: config.heartbeat_interval(),
        snapshot_interval: config.snapshot_interval(),
        snapshot_store,
    };
    (SyncHandle { tx }, actor)
}
