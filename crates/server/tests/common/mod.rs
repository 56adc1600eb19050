//! Common test utilities for in-process server testing.
//!
//! `TestFixture` wires the real router to a temp-dir SQLite store, a live
//! sync coordinator and a mock feature extractor, so HTTP and WebSocket
//! behavior can be exercised without an LLM.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ticketwright_core::{
    create_sync_system, load_config_from_str, Authenticator, GenerationPipeline,
    NoneAuthenticator, ProjectStore, SignedTokenAuthenticator, SqliteTicketStore, SyncHandle,
    TicketStore,
    testing::MockFeatureExtractor,
};

/// Re-export fixtures for test convenience
pub use ticketwright_core::testing::fixtures;

pub const SECRET: &str = "integration-secret";

/// Knobs for building a fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Use signed-token auth instead of none.
    pub signed_tokens: bool,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            signed_tokens: false,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 60_000,
        }
    }
}

pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock extractor - configure the features a generation run sees
    pub extractor: MockFeatureExtractor,
    /// Handle to the live coordinator
    pub sync: SyncHandle,
    pub ticket_store: Arc<dyn TicketStore>,
    /// Temporary directory holding the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let auth_section = if test_config.signed_tokens {
            format!("method = \"signed_token\"\nsecret = \"{}\"", SECRET)
        } else {
            "method = \"none\"".to_string()
        };
        let config = load_config_from_str(&format!(
            r#"
[auth]
{}

[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

[sync]
heartbeat_interval_ms = {}
heartbeat_timeout_ms = {}
snapshot_interval_ms = 0
"#,
            auth_section,
            db_path.display(),
            test_config.heartbeat_interval_ms,
            test_config.heartbeat_timeout_ms,
        ))
        .expect("Failed to parse test config");

        let authenticator: Arc<dyn Authenticator> = if test_config.signed_tokens {
            Arc::new(SignedTokenAuthenticator::new(SECRET))
        } else {
            Arc::new(NoneAuthenticator::new())
        };

        let store = Arc::new(
            SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"),
        );
        let ticket_store: Arc<dyn TicketStore> = store.clone();
        let project_store: Arc<dyn ProjectStore> = store;

        let (sync, actor) = create_sync_system(Arc::clone(&authenticator), None, &config.sync);
        tokio::spawn(actor.run());

        let extractor = MockFeatureExtractor::new();
        let pipeline = GenerationPipeline::new(Arc::clone(&project_store))
            .with_extractor(Arc::new(extractor.clone()))
            .with_notifier(Arc::new(sync.clone()));

        let state = Arc::new(ticketwright_server::state::AppState::new(
            config,
            authenticator,
            Arc::clone(&ticket_store),
            project_store,
            Arc::new(pipeline),
            sync.clone(),
        ));

        let router = ticketwright_server::api::create_router(state);

        Self {
            router,
            extractor,
            sync,
            ticket_store,
            temp_dir,
        }
    }

    /// Serve the router on an ephemeral port (for WebSocket tests).
    pub async fn spawn_listener(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("No local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        addr
    }

    /// Mint a signed token for `user_id` valid for an hour.
    pub fn token(&self, user_id: &str) -> String {
        SignedTokenAuthenticator::new(SECRET).issue(user_id, Utc::now() + chrono::Duration::hours(1))
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> TestResponse {
        self.request("PATCH", path, Some(body), None).await
    }

    /// Send a request carrying a bearer token.
    pub async fn request_with_token(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: &str,
    ) -> TestResponse {
        self.request(method, path, body, Some(token)).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = if let Some(json_body) = body {
            builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&json_body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();

        let body = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).to_string()))
        };

        TestResponse { status, body }
    }

    /// Create a project and return its id.
    pub async fn create_project(&self, name: &str) -> String {
        let response = self
            .post(
                "/api/v1/projects",
                serde_json::json!({ "name": name, "description": "A prototype" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Create a project, run generation over the web manifest with two
    /// features, and return the project id.
    pub async fn generated_project(&self) -> String {
        self.extractor
            .set_outcome(ticketwright_core::ExtractionOutcome::Extracted(fixtures::analysis(vec![
                fixtures::feature("f1", "Login", 6, &["src/auth/login.tsx", "src/auth/session.ts"]),
                fixtures::feature("f2", "Dashboard", 5, &["src/dashboard/Dashboard.tsx"]),
            ])))
            .await;

        let project_id = self.create_project("Demo").await;
        let response = self
            .post(
                &format!("/api/v1/projects/{}/generate", project_id),
                serde_json::json!({ "files": fixtures::web_manifest().files }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        project_id
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
