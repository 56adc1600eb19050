//! WebSocket endpoint bound to the sync coordinator.
//!
//! The socket task owns the transport only: inbound text frames are handed to
//! the coordinator verbatim, and whatever the coordinator queues on the
//! connection's outbound channel is written back. Authentication happens
//! in-band through the `authenticate` message.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use ticketwright_core::sync::Outbound;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let sync = state.sync().clone();
    let connection_id = match sync.attach(tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting socket, coordinator unavailable: {}", e);
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                })))
                .await;
            return;
        }
    };

    // Forward coordinator output to the client until it asks us to close
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Message(message) => {
                    let json = match message.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize ServerMessage: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Outbound::Close { reason } => {
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => {
                debug!(connection_id = %connection_id, "Server closed the socket");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = sync.client_frame(&connection_id, text.as_str()).await {
                        warn!(connection_id = %connection_id, "Dropping frame: {}", e);
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(connection_id = %connection_id, "WebSocket client closed");
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong are handled by axum; binary frames are not part of the protocol
                }
                Some(Err(e)) => {
                    warn!(connection_id = %connection_id, "WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    }

    send_task.abort();
    sync.detach(&connection_id).await;
}
