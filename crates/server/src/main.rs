use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticketwright_core::config::LogFormat;
use ticketwright_core::sync::ConnectionSnapshotStore;
use ticketwright_core::{
    create_authenticator, create_pipeline, create_sync_system, load_config, validate_config,
    Authenticator, ProjectStore, SqliteConnectionSnapshotStore, SqliteTicketStore, TicketStore,
};

use ticketwright_server::api::create_router;
use ticketwright_server::state::AppState;

/// How long to wait for the sync actor to flush its final snapshot.
const ACTOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be initialized yet if config loading failed
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("TICKETWRIGHT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    init_logging(config.logging.format);

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Configuration loaded from {:?} (hash {})",
        config_path,
        &config_hash[..16]
    );
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite ticket/project store
    let store = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    let ticket_store: Arc<dyn TicketStore> = store.clone();
    let project_store: Arc<dyn ProjectStore> = store;
    info!("Ticket store initialized");

    let snapshot_store: Arc<dyn ConnectionSnapshotStore> = Arc::new(
        SqliteConnectionSnapshotStore::new(&config.database.path)
            .context("Failed to create connection snapshot store")?,
    );

    // Create the sync coordinator and spawn its actor
    let (sync, actor) = create_sync_system(
        Arc::clone(&authenticator),
        Some(snapshot_store),
        &config.sync,
    );
    let actor_handle = tokio::spawn(actor.run());

    // Create generation pipeline
    let pipeline = create_pipeline(
        &config.generation,
        Arc::clone(&project_store),
        Arc::new(sync.clone()),
    )
    .context("Failed to create generation pipeline")?;
    info!(
        "Generation pipeline ready (extractor: {:?}, enrich: {})",
        config.generation.extractor, config.generation.enrich
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let state = Arc::new(AppState::new(
        config,
        authenticator,
        ticket_store,
        project_store,
        Arc::new(pipeline),
        sync,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Once the last SyncHandle drops, the actor writes its final snapshot and
    // exits. Sockets still draining hold handles, so bound the wait.
    info!("Server shutting down...");
    match tokio::time::timeout(ACTOR_SHUTDOWN_TIMEOUT, actor_handle).await {
        Ok(_) => info!("Sync coordinator stopped"),
        Err(_) => warn!("Sync coordinator did not stop within {:?}", ACTOR_SHUTDOWN_TIMEOUT),
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
