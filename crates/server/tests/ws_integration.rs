//! WebSocket protocol tests against a bound listener.

mod common;

use std::time::Duration;

use common::{fixtures, TestConfig, TestFixture};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(fixture: &TestFixture) -> Socket {
    let addr = fixture.spawn_listener().await;
    let (socket, _) = connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("WebSocket handshake failed");
    socket
}

async fn send(socket: &mut Socket, value: Value) {
    socket
        .send(Message::text(value.to_string()))
        .await
        .expect("send failed");
}

/// Next JSON frame, skipping heartbeats. `None` on close or timeout.
async fn next_event(socket: &mut Socket) -> Option<Value> {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next()).await.ok()??;
        match frame.ok()? {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str()).expect("invalid JSON");
                if value["type"] != "heartbeat" {
                    return Some(value);
                }
            }
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

async fn authenticate(socket: &mut Socket, token: &str, project_id: Option<&str>) -> Value {
    send(
        socket,
        json!({
            "type": "authenticate",
            "token": token,
            "clientType": "web",
            "projectId": project_id,
        }),
    )
    .await;
    next_event(socket).await.expect("no auth reply")
}

#[tokio::test]
async fn test_authenticate_returns_connection_details() {
    let fixture = TestFixture::new().await;
    let mut socket = connect(&fixture).await;

    let reply = authenticate(&mut socket, "dana", Some("p1")).await;

    assert_eq!(reply["type"], "auth_success");
    assert_eq!(reply["userId"], "dana");
    assert!(reply["connectionId"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(reply["subscriptions"], json!(["p1"]));
}

#[tokio::test]
async fn test_messages_before_auth_are_rejected_recoverably() {
    let fixture = TestFixture::new().await;
    let mut socket = connect(&fixture).await;

    send(&mut socket, json!({ "type": "subscribe", "projectId": "p1" })).await;
    let reply = next_event(&mut socket).await.unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "not_authenticated");
    assert_eq!(reply["recoverable"], true);

    // The socket is still usable
    let reply = authenticate(&mut socket, "dana", None).await;
    assert_eq!(reply["type"], "auth_success");
}

#[tokio::test]
async fn test_malformed_frame_is_invalid_message() {
    let fixture = TestFixture::new().await;
    let mut socket = connect(&fixture).await;

    socket.send(Message::text("{not json")).await.unwrap();

    let reply = next_event(&mut socket).await.unwrap();
    assert_eq!(reply["code"], "invalid_message");
    assert_eq!(reply["recoverable"], true);
}

#[tokio::test]
async fn test_bad_token_closes_socket() {
    let fixture = TestFixture::with_config(TestConfig {
        signed_tokens: true,
        ..Default::default()
    })
    .await;
    let mut socket = connect(&fixture).await;

    let reply = authenticate(&mut socket, "forged.123.abc", None).await;

    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "auth_failed");
    assert_eq!(reply["recoverable"], false);
    assert!(next_event(&mut socket).await.is_none(), "socket should close");
}

#[tokio::test]
async fn test_unsubscribe_unknown_project() {
    let fixture = TestFixture::new().await;
    let mut socket = connect(&fixture).await;
    authenticate(&mut socket, "dana", None).await;

    send(&mut socket, json!({ "type": "unsubscribe", "projectId": "p9" })).await;

    let reply = next_event(&mut socket).await.unwrap();
    assert_eq!(reply["code"], "not_subscribed");
}

#[tokio::test]
async fn test_status_change_reaches_subscribers_only() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.generated_project().await;
    let other_project = fixture.create_project("Elsewhere").await;

    let mut watcher = connect(&fixture).await;
    authenticate(&mut watcher, "watcher", Some(&project_id)).await;
    let mut bystander = connect(&fixture).await;
    authenticate(&mut bystander, "bystander", Some(&other_project)).await;

    let tickets = fixture
        .get(&format!("/api/v1/projects/{}/tickets?type=setup", project_id))
        .await;
    let ticket_id = tickets.body["tickets"][0]["id"].as_str().unwrap().to_string();

    let response = fixture
        .post(
            &format!("/api/v1/tickets/{}/status", ticket_id),
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_eq!(response.status, axum::http::StatusCode::OK);

    let event = next_event(&mut watcher).await.expect("watcher got nothing");
    assert_eq!(event["type"], "ticket_status_changed");
    assert_eq!(event["projectId"], project_id.as_str());
    assert_eq!(event["ticketId"], ticket_id.as_str());
    assert_eq!(event["oldStatus"], "pending");
    assert_eq!(event["newStatus"], "in_progress");
    assert_eq!(event["changedBy"], "anonymous");

    let stray = timeout(Duration::from_millis(200), bystander.next()).await;
    assert!(stray.is_err(), "bystander should hear nothing");
}

#[tokio::test]
async fn test_generation_announces_review() {
    let fixture = TestFixture::new().await;
    let project_id = fixture.create_project("Live").await;

    let mut watcher = connect(&fixture).await;
    authenticate(&mut watcher, "watcher", Some(&project_id)).await;

    let response = fixture
        .post(
            &format!("/api/v1/projects/{}/generate", project_id),
            json!({ "files": fixtures::web_manifest().files }),
        )
        .await;
    assert_eq!(response.status, axum::http::StatusCode::OK);

    let mut saw_review = false;
    while let Some(event) = next_event(&mut watcher).await {
        if event["type"] == "project_status_changed" && event["newStatus"] == "review" {
            assert_eq!(event["oldStatus"], "analyzing");
            saw_review = true;
            break;
        }
    }
    assert!(saw_review);
}

#[tokio::test]
async fn test_heartbeat_and_eviction() {
    let fixture = TestFixture::with_config(TestConfig {
        heartbeat_interval_ms: 50,
        heartbeat_timeout_ms: 200,
        ..Default::default()
    })
    .await;
    let mut socket = connect(&fixture).await;
    authenticate(&mut socket, "quiet", None).await;

    // A heartbeat arrives first, then silence gets us evicted
    let mut saw_heartbeat = false;
    let closed = timeout(Duration::from_secs(3), async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    if value["type"] == "heartbeat" {
                        assert!(value["timestamp"].as_i64().is_some());
                        saw_heartbeat = true;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return,
                _ => {}
            }
        }
    })
    .await;

    assert!(saw_heartbeat);
    assert!(closed.is_ok(), "silent socket was not evicted");
}

#[tokio::test]
async fn test_pong_keeps_socket_alive() {
    let fixture = TestFixture::with_config(TestConfig {
        heartbeat_interval_ms: 50,
        heartbeat_timeout_ms: 200,
        ..Default::default()
    })
    .await;
    let mut socket = connect(&fixture).await;
    authenticate(&mut socket, "chatty", None).await;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(600);
    while tokio::time::Instant::now() < deadline {
        let frame = timeout(Duration::from_millis(500), socket.next())
            .await
            .expect("socket went quiet")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(value["type"], "heartbeat");
            send(&mut socket, json!({ "type": "pong", "timestamp": value["timestamp"] })).await;
        }
    }

    let stats = fixture.sync.stats().await.unwrap();
    assert_eq!(stats.live, 1);
}
