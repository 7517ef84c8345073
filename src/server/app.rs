//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::Config;
use crate::fallback::Generator;
use crate::provider::Adapters;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state from configuration, constructing the HTTP client and adapters once.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let http_client = config.http.build_client()?;
        let adapters = Adapters::new(http_client, &config);
        let generator = Generator::new(adapters, &config.fallback);

        Ok(Self {
            generator: Arc::new(generator),
            config: Arc::new(config),
        })
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(handlers::generate))
        .route("/v1/models", get(handlers::list_models))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();
    let state = AppState::from_config(config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting modelfall server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
