//! Connection registry and protocol state machine.
//!
//! `SyncCoordinator` owns every connection and is driven from a single task
//! (see [`SyncActor`](super::SyncActor)), so registry mutations are serialized
//! without locks. Time is passed in explicitly to keep the heartbeat logic
//! deterministic under test.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::protocol::codes;
use super::{ClientMessage, ClientType, ConnectionMetadata, ServerMessage, SyncError};
use crate::auth::{AuthRequest, Authenticator};
use crate::metrics;

pub type ConnectionId = String;

/// Instruction for a socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    Close { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Authenticated connections.
    pub live: usize,
    pub unauthenticated: usize,
    /// Total subscriptions across authenticated connections.
    pub subscriptions: usize,
    /// Connections listed in the snapshot loaded at startup.
    pub recovered: usize,
}

enum ConnectionState {
    Unauthenticated,
    Authenticated {
        user_id: String,
        client_type: ClientType,
        subscriptions: BTreeSet<String>,
        connected_at: DateTime<Utc>,
    },
}

struct Connection {
    outbound: mpsc::UnboundedSender<Outbound>,
    state: ConnectionState,
    last_seen: Instant,
    last_seen_at: DateTime<Utc>,
}

impl Connection {
    fn send(&self, message: ServerMessage) -> Result<(), SyncError> {
        self.outbound
            .send(Outbound::Message(message))
            .map_err(|_| SyncError::Transport("connection writer closed".to_string()))
    }

    fn is_subscribed(&self, project_id: &str) -> bool {
        match &self.state {
            ConnectionState::Authenticated { subscriptions, .. } => {
                subscriptions.contains(project_id)
            }
            ConnectionState::Unauthenticated => false,
        }
    }
}

pub struct SyncCoordinator {
    authenticator: Arc<dyn Authenticator>,
    connections: HashMap<ConnectionId, Connection>,
    heartbeat_timeout: Duration,
    recovered: usize,
}

impl SyncCoordinator {
    pub fn new(authenticator: Arc<dyn Authenticator>, heartbeat_timeout: Duration) -> Self {
        Self {
            authenticator,
            connections: HashMap::new(),
            heartbeat_timeout,
            recovered: 0,
        }
    }

    pub fn with_recovered(mut self, recovered: usize) -> Self {
        self.recovered = recovered;
        self
    }

    /// Register a new socket. It starts unauthenticated.
    pub fn attach(&mut self, outbound: mpsc::UnboundedSender<Outbound>, now: Instant) -> ConnectionId {
        let id = uuid::Uuid::new_v4().to_string();
        self.connections.insert(
            id.clone(),
            Connection {
                outbound,
                state: ConnectionState::Unauthenticated,
                last_seen: now,
                last_seen_at: Utc::now(),
            },
        );
        metrics::WS_CONNECTIONS_TOTAL.inc();
        metrics::WS_CONNECTIONS_ACTIVE.inc();
        tracing::debug!(connection_id = %id, "Connection attached");
        id
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn detach(&mut self, id: &str) -> bool {
        match self.connections.remove(id) {
            Some(conn) => {
                metrics::WS_CONNECTIONS_ACTIVE.dec();
                if let ConnectionState::Authenticated { user_id, .. } = &conn.state {
                    tracing::info!(connection_id = %id, user_id = %user_id, "Connection closed");
                } else {
                    tracing::debug!(connection_id = %id, "Unauthenticated connection closed");
                }
                true
            }
            None => false,
        }
    }

    /// Process one inbound text frame.
    pub async fn handle_frame(&mut self, id: &str, text: &str, now: Instant) {
        let Some(conn) = self.connections.get(id) else {
            tracing::debug!(connection_id = %id, "Frame for unknown connection dropped");
            return;
        };
        let authenticated = matches!(conn.state, ConnectionState::Authenticated { .. });

        let message = match ClientMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                let _ = conn.send(ServerMessage::error(
                    codes::INVALID_MESSAGE,
                    format!("Invalid message: {}", e),
                    true,
                ));
                return;
            }
        };

        match (authenticated, message) {
            (
                false,
                ClientMessage::Authenticate {
                    token,
                    client_type,
                    project_id,
                },
            ) => {
                self.authenticate(id, &token, client_type, project_id, now)
                    .await;
            }
            (false, other) => {
                let _ = conn.send(ServerMessage::error(
                    codes::NOT_AUTHENTICATED,
                    format!("Authenticate before sending {}", other.message_type()),
                    true,
                ));
            }
            (true, ClientMessage::Authenticate { .. }) => {
                let _ = conn.send(ServerMessage::error(
                    codes::ALREADY_AUTHENTICATED,
                    "Connection is already authenticated",
                    true,
                ));
            }
            (true, ClientMessage::Subscribe { project_id }) => {
                self.subscribe(id, project_id);
            }
            (true, ClientMessage::Unsubscribe { project_id }) => {
                self.unsubscribe(id, &project_id);
            }
            (true, ClientMessage::Pong { .. }) => {
                if let Some(conn) = self.connections.get_mut(id) {
                    conn.last_seen = now;
                    conn.last_seen_at = Utc::now();
                }
            }
        }
    }

    async fn authenticate(
        &mut self,
        id: &str,
        token: &str,
        client_type: ClientType,
        project_id: Option<String>,
        now: Instant,
    ) {
        let authenticator = Arc::clone(&self.authenticator);
        let result = authenticator.authenticate(&AuthRequest::bearer(token)).await;

        // The socket may have gone away while the authenticator was running.
        let Some(conn) = self.connections.get_mut(id) else {
            return;
        };

        match result {
            Ok(identity) => {
                let mut subscriptions = BTreeSet::new();
                if let Some(project_id) = project_id.filter(|p| !p.is_empty()) {
                    subscriptions.insert(project_id);
                }
                let ack = ServerMessage::AuthSuccess {
                    user_id: identity.user_id.clone(),
                    connection_id: id.to_string(),
                    subscriptions: subscriptions.iter().cloned().collect(),
                };
                tracing::info!(
                    connection_id = %id,
                    user_id = %identity.user_id,
                    client_type = client_type.as_str(),
                    "Connection authenticated"
                );
                conn.state = ConnectionState::Authenticated {
                    user_id: identity.user_id,
                    client_type,
                    subscriptions,
                    connected_at: Utc::now(),
                };
                conn.last_seen = now;
                conn.last_seen_at = Utc::now();
                let _ = conn.send(ack);
            }
            Err(e) => {
                metrics::WS_AUTH_FAILURES.with_label_values(&[e.code()]).inc();
                tracing::warn!(connection_id = %id, error = %e, "Socket authentication failed");
                let _ = conn.send(ServerMessage::error(e.code(), e.to_string(), false));
                let _ = conn.outbound.send(Outbound::Close {
                    reason: "authentication failed".to_string(),
                });
                self.detach(id);
            }
        }
    }

    fn subscribe(&mut self, id: &str, project_id: String) {
        let Some(conn) = self.connections.get_mut(id) else {
            return;
        };
        if project_id.is_empty() {
            let _ = conn.send(ServerMessage::error(
                codes::INVALID_MESSAGE,
                "projectId must not be empty",
                true,
            ));
            return;
        }
        if let ConnectionState::Authenticated { subscriptions, .. } = &mut conn.state {
            if subscriptions.insert(project_id.clone()) {
                tracing::debug!(connection_id = %id, project_id = %project_id, "Subscribed");
            }
        }
    }

    fn unsubscribe(&mut self, id: &str, project_id: &str) {
        let Some(conn) = self.connections.get_mut(id) else {
            return;
        };
        let removed = match &mut conn.state {
            ConnectionState::Authenticated { subscriptions, .. } => {
                subscriptions.remove(project_id)
            }
            ConnectionState::Unauthenticated => false,
        };
        if !removed {
            let _ = conn.send(ServerMessage::error(
                codes::NOT_SUBSCRIBED,
                format!("Not subscribed to project {}", project_id),
                true,
            ));
        }
    }

    /// Deliver a project event to every authenticated subscriber.
    ///
    /// Returns the number of connections the event was handed to. A closed
    /// writer is counted as a failure and left for its own detach to clean up.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let Some(project_id) = message.project_id() else {
            tracing::warn!(event = message.event_type(), "Refusing to broadcast non-project event");
            return 0;
        };
        let event = message.event_type();

        let mut delivered = 0;
        for (id, conn) in &self.connections {
            if !conn.is_subscribed(project_id) {
                continue;
            }
            match conn.send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    metrics::BROADCAST_DELIVERIES.with_label_values(&[event]).inc();
                }
                Err(e) => {
                    metrics::BROADCAST_FAILURES.with_label_values(&[event]).inc();
                    tracing::debug!(connection_id = %id, event, error = %e, "Broadcast delivery failed");
                }
            }
        }
        tracing::debug!(project_id = %project_id, event, delivered, "Broadcast sent");
        delivered
    }

    /// Evict silent connections, then ping the survivors.
    ///
    /// Unauthenticated connections are measured from attach time and never
    /// receive heartbeats. Returns the evicted connection ids.
    pub fn heartbeat_tick(&mut self, now: Instant) -> Vec<ConnectionId> {
        let expired: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, conn)| now.saturating_duration_since(conn.last_seen) > self.heartbeat_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(conn) = self.connections.get(id) {
                let _ = conn.outbound.send(Outbound::Close {
                    reason: "heartbeat timeout".to_string(),
                });
            }
            self.detach(id);
            metrics::WS_EVICTIONS.inc();
            tracing::info!(connection_id = %id, "Evicted connection after heartbeat timeout");
        }

        let timestamp = Utc::now().timestamp_millis();
        for conn in self.connections.values() {
            if matches!(conn.state, ConnectionState::Authenticated { .. }) {
                let _ = conn.send(ServerMessage::Heartbeat { timestamp });
            }
        }

        expired
    }

    pub fn stats(&self) -> ConnectionStats {
        let mut stats = ConnectionStats {
            recovered: self.recovered,
            ..ConnectionStats::default()
        };
        for conn in self.connections.values() {
            match &conn.state {
                ConnectionState::Authenticated { subscriptions, .. } => {
                    stats.live += 1;
                    stats.subscriptions += subscriptions.len();
                }
                ConnectionState::Unauthenticated => stats.unauthenticated += 1,
            }
        }
        stats
    }

    /// Metadata for every authenticated connection.
    pub fn snapshot(&self) -> Vec<ConnectionMetadata> {
        let mut snapshot: Vec<ConnectionMetadata> = self
            .connections
            .iter()
            .filter_map(|(id, conn)| match &conn.state {
                ConnectionState::Authenticated {
                    user_id,
                    client_type,
                    subscriptions,
                    connected_at,
                } => Some(ConnectionMetadata {
                    connection_id: id.clone(),
                    user_id: user_id.clone(),
                    client_type: *client_type,
                    subscriptions: subscriptions.iter().cloned().collect(),
                    connected_at: *connected_at,
                    last_heartbeat_at: conn.last_seen_at,
                }),
                ConnectionState::Unauthenticated => None,
            })
            .collect();
        snapshot.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        snapshot
    }

    /// Close and forget every connection.
    pub fn close_all(&mut self, reason: &str) {
        for (_, conn) in self.connections.drain() {
            let _ = conn.outbound.send(Outbound::Close {
                reason: reason.to_string(),
            });
            metrics::WS_CONNECTIONS_ACTIVE.dec();
        }
    }
}
