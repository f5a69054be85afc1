//! HTTP server lifecycle management.
//!
//! Provides [`start_server`] which binds to a TCP port and serves the
//! router until `Ctrl-C` is received, then drains in-flight requests.

use std::net::SocketAddr;
use std::sync::Arc;

use sensorhub_core::config::HttpConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Serve the API on `config.host:config.port` until `Ctrl-C`.
///
/// In-flight requests finish before this returns. Open `WebSocket`
/// connections are dropped with the runtime.
///
/// # Errors
///
/// [`ServerError::Bind`] if the address is bad or taken,
/// [`ServerError::Serve`] if accepting connections fails.
pub async fn start_server(config: &HttpConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let raw = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address {raw}: {e}")))?;

    let router = build_router(state, &config.cors_origin);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

    info!(%addr, cors_origin = %config.cors_origin, "Sensor hub listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// The HTTP server could not start or stopped abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address is invalid or unavailable.
    #[error("cannot listen: {0}")]
    Bind(String),

    /// Accepting or serving connections failed.
    #[error("server failed: {0}")]
    Serve(String),
}
