//! Health check endpoints.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// Liveness check.
///
/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness check: the profile document must be readable.
///
/// GET /health/ready
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store().check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "profile store unavailable")
        }
    }
}
