//! Health checks.

use axum::{extract::State, http::StatusCode};
use tracing::warn;

use crate::pool::Connector;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the shared store. Returns 503 if it is not reachable.
pub async fn readiness<C: Connector>(State(state): State<AppState<C>>) -> StatusCode {
    let resolver = state.resolver();
    match resolver.ping(resolver.shared_handle()).await {
        Ok(()) => StatusCode::OK,
        Err(message) => {
            warn!(%message, "Shared store failed readiness probe");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
