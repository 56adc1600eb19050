//! Real-time sync: socket protocol, connection registry and broadcasts.

mod coordinator;
mod handle;
mod notifier;
mod protocol;
mod snapshot;

pub use coordinator::{ConnectionId, ConnectionStats, Outbound, SyncCoordinator};
pub use handle::{create_sync_system, SyncActor, SyncHandle};
pub use notifier::{NoopNotifier, SyncNotifier};
pub use protocol::{codes, ClientMessage, ClientType, ServerMessage};
pub use snapshot::{ConnectionMetadata, ConnectionSnapshotStore, SqliteConnectionSnapshotStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync coordinator is not running")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
