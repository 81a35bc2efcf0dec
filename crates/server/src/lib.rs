//! Prism server library.
//!
//! Provides a reusable server function to serve Prism either for the binary,
//! or for integration tests.

#![deny(missing_docs)]

mod auth;
mod health;
mod logger;
mod request_id;

use std::net::SocketAddr;

use anyhow::anyhow;
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// Configuration for serving Prism.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to.
    pub listen_address: SocketAddr,
    /// The configuration snapshot channel, fed by the hot-reload watcher.
    pub config: config::ConfigReceiver,
    /// Cancellation token for graceful shutdown.
    pub shutdown_signal: CancellationToken,
    /// Log filter string (e.g., "info" or "translator=debug,server=debug").
    pub log_filter: String,
    /// The version string to log on startup.
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if
    /// port 0 was specified).
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the Prism server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    logger::init(&log_filter);

    // Log the version as the first message after logger initialization.
    log::info!("Prism {version}");

    let state = translator::ProxyState::new(config.clone());

    let api = translator::router(state).layer(axum::middleware::from_fn_with_state(
        config.clone(),
        auth::require_api_key,
    ));

    let app = Router::new()
        .merge(api)
        .route("/health", get(health::health))
        .fallback(not_found)
        .layer(axum::middleware::from_fn(request_id::propagate_request_id))
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    let bound_address = listener.local_addr()?;

    if let Some(sender) = bound_addr_sender
        && sender.send(bound_address).is_err()
    {
        log::warn!("Nobody is listening for the bound address");
    }

    log::info!("Messages endpoint: http://{bound_address}/v1/messages");
    log::info!("Health endpoint: http://{bound_address}/health");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            result.map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
        _ = shutdown_signal.cancelled() => {
            log::info!("Received shutdown signal, shutting down gracefully...");
        }
    }

    Ok(())
}

async fn not_found() -> axum::response::Response {
    use axum::response::IntoResponse;

    translator::Error::NotFound("The requested resource does not exist".to_string()).into_response()
}
