//! Clinic Sync Agent - runs the local store, the outbox relay and the control surface.

use std::sync::Arc;

use clinic_sync_agent::config::Config;
use clinic_sync_agent::connectivity::{Connectivity, ConnectivitySignal};
use clinic_sync_agent::dispatcher::HttpDispatcher;
use clinic_sync_agent::session::{BearerToken, MemorySession};
use clinic_sync_agent::store::{LocalStore, StoreConfig};
use clinic_sync_agent::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_sync_agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        "Starting Clinic Sync Agent on {}:{} relaying to {}",
        config.host,
        config.port,
        config.api_base_url
    );

    let store = LocalStore::open(&StoreConfig::new(config.db_path.clone())).await?;
    let pending = store.pending_count().await?;
    if pending > 0 {
        tracing::info!(pending, "Unsynced records found from a previous session");
    }

    let dispatcher = Arc::new(HttpDispatcher::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    let session = Arc::new(MemorySession::new(
        config.session_token.clone().and_then(BearerToken::new),
    ));
    let connectivity = Arc::new(ConnectivitySignal::new(Connectivity::from_online(
        config.start_online,
    )));

    let state = AppState::new(store.clone(), dispatcher, session, connectivity.clone());
    let watcher = state.orchestrator.clone().watch(connectivity.subscribe());

    // Start control surface
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Control surface listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    store.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
