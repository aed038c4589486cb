//! Admin HTTP endpoint
//!
//! `GET /health` and `GET /` answer `200 OK` while the event source answers its
//! probe, `503` otherwise. Without an event source (interval-only mode) they
//! always answer `200 OK`.

use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use dnsync_core::traits::EventSource;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared admin state
#[derive(Clone, Default)]
pub struct AdminState {
    /// Event source to probe; `None` in interval-only mode
    pub probe: Option<Arc<dyn EventSource>>,
}

/// Admin routes
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serve the admin endpoint until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!("Admin HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

/// GET /health - event source liveness
async fn health_check(State(state): State<AdminState>) -> impl IntoResponse {
    let Some(probe) = state.probe else {
        return (StatusCode::OK, "OK");
    };

    match probe.probe().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!("Health probe failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
        }
    }
}
