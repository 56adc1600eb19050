//! Wire protocol: JSON text frames discriminated by a `type` field.

use serde::{Deserialize, Serialize};

use crate::project::ProjectStatus;
use crate::ticket::TicketStatus;

/// Protocol error codes sent in `error` frames.
pub mod codes {
    pub const INVALID_MESSAGE: &str = "invalid_message";
    pub const NOT_AUTHENTICATED: &str = "not_authenticated";
    pub const ALREADY_AUTHENTICATED: &str = "already_authenticated";
    pub const NOT_SUBSCRIBED: &str = "not_subscribed";
    pub const AUTH_FAILED: &str = "auth_failed";
    pub const TOKEN_EXPIRED: &str = "token_expired";
    pub const AUTH_UNAVAILABLE: &str = "auth_unavailable";
}

/// Kind of client on the other end of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Web,
    Ide,
    Cli,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Web => "web",
            ClientType::Ide => "ide",
            ClientType::Cli => "cli",
        }
    }
}

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Authenticate {
        token: String,
        client_type: ClientType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
    },
    Subscribe {
        project_id: String,
    },
    Unsubscribe {
        project_id: String,
    },
    Pong {
        timestamp: i64,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            ClientMessage::Authenticate { .. } => "authenticate",
            ClientMessage::Subscribe { .. } => "subscribe",
            ClientMessage::Unsubscribe { .. } => "unsubscribe",
            ClientMessage::Pong { .. } => "pong",
        }
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    AuthSuccess {
        user_id: String,
        connection_id: String,
        subscriptions: Vec<String>,
    },
    TicketUpdated {
        project_id: String,
        ticket_id: String,
        changes: Vec<String>,
        updated_by: String,
    },
    TicketStatusChanged {
        project_id: String,
        ticket_id: String,
        old_status: TicketStatus,
        new_status: TicketStatus,
        changed_by: String,
    },
    ProjectStatusChanged {
        project_id: String,
        old_status: ProjectStatus,
        new_status: ProjectStatus,
    },
    Heartbeat {
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
        recoverable: bool,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>, recoverable: bool) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
            recoverable,
        }
    }

    /// Project a broadcast event belongs to.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            ServerMessage::TicketUpdated { project_id, .. }
            | ServerMessage::TicketStatusChanged { project_id, .. }
            | ServerMessage::ProjectStatusChanged { project_id, .. } => Some(project_id),
            _ => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ServerMessage::AuthSuccess { .. } => "auth_success",
            ServerMessage::TicketUpdated { .. } => "ticket_updated",
            ServerMessage::TicketStatusChanged { .. } => "ticket_status_changed",
            ServerMessage::ProjectStatusChanged { .. } => "project_status_changed",
            ServerMessage::Heartbeat { .. } => "heartbeat",
            ServerMessage::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
