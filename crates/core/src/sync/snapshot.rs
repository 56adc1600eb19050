//! Periodic persistence of connection metadata.
//!
//! Snapshots are informational: after a restart the coordinator reports how
//! many connections were live, but clients must reconnect and authenticate
//! again.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{ClientType, SyncError};

/// Metadata for one authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    pub connection_id: String,
    pub user_id: String,
    pub client_type: ClientType,
    pub subscriptions: Vec<String>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

pub trait ConnectionSnapshotStore: Send + Sync {
    /// Replace the stored snapshot with `connections`.
    fn save(&self, connections: &[ConnectionMetadata]) -> Result<(), SyncError>;

    /// Load the most recent snapshot.
    fn load(&self) -> Result<Vec<ConnectionMetadata>, SyncError>;
}

pub struct SqliteConnectionSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteConnectionSnapshotStore {
    pub fn new(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SyncError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS connection_snapshots (
                connection_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                client_type TEXT NOT NULL,
                subscriptions TEXT NOT NULL,
                connected_at TEXT NOT NULL,
                last_heartbeat_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl ConnectionSnapshotStore for SqliteConnectionSnapshotStore {
    fn save(&self, connections: &[ConnectionMetadata]) -> Result<(), SyncError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM connection_snapshots", [])?;
        for meta in connections {
            let subscriptions = serde_json::to_string(&meta.subscriptions)
                .map_err(|e| SyncError::Snapshot(e.to_string()))?;
            tx.execute(
                r#"INSERT INTO connection_snapshots
                   (connection_id, user_id, client_type, subscriptions, connected_at, last_heartbeat_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    meta.connection_id,
                    meta.user_id,
                    meta.client_type.as_str(),
                    subscriptions,
                    meta.connected_at.to_rfc3339(),
                    meta.last_heartbeat_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load(&self) -> Result<Vec<ConnectionMetadata>, SyncError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT connection_id, user_id, client_type, subscriptions, connected_at, last_heartbeat_at
               FROM connection_snapshots ORDER BY connected_at"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut snapshot = Vec::new();
        for row in rows {
            let (connection_id, user_id, client_type, subscriptions, connected_at, last_seen) =
                row?;
            snapshot.push(ConnectionMetadata {
                connection_id,
                user_id,
                client_type: serde_json::from_value(serde_json::Value::String(client_type))
                    .map_err(|e| SyncError::Snapshot(e.to_string()))?,
                subscriptions: serde_json::from_str(&subscriptions)
                    .map_err(|e| SyncError::Snapshot(e.to_string()))?,
                connected_at: parse_time(&connected_at)?,
                last_heartbeat_at: parse_time(&last_seen)?,
            });
        }
        Ok(snapshot)
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Snapshot(format!("bad timestamp {}: {}", value, e)))
}
