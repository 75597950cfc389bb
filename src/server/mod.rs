//! HTTP surface: the live WebSocket endpoint, health and metrics.

pub mod metrics;
pub mod state;
mod websocket;

pub use state::ServerState;

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

use state::GuardedClientRegistry;
use websocket::ws_handler;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    live_clients: usize,
    uptime_secs: u64,
}

async fn health(
    State(registry): State<GuardedClientRegistry>,
    State(state): State<ServerState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        live_clients: registry.total_count().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(state)
}

/// Serves until `shutdown` is cancelled.
pub async fn run_server(state: ServerState, port: u16, shutdown: CancellationToken) -> Result<()> {
    let app = make_app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;
    Ok(())
}
