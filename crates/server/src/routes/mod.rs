//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (profile document readable)
//!
//! # Profiles
//! POST /api/updateUserData          - Replace a profile record
//! GET  /api/profiles/{pin}          - Fetch a profile record
//!
//! # Verification (rate limited per IP when enabled)
//! POST /api/send-verification       - Send a browser-chosen code
//! POST /api/verification/issue      - Generate and send a code
//! POST /api/verification/verify     - Check an entered code
//! ```

pub mod health;
pub mod profiles;
pub mod verification;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::verification_rate_limiter;
use crate::state::AppState;

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/updateUserData", post(profiles::update_user_data))
        .route("/profiles/{pin}", get(profiles::show))
}

/// Create the verification routes router.
pub fn verification_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/send-verification", post(verification::send_verification))
        .route("/verification/issue", post(verification::issue))
        .route("/verification/verify", post(verification::verify));

    if rate_limit {
        router.layer(verification_rate_limiter())
    } else {
        router
    }
}

/// Create all API routes.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest(
            "/api",
            profile_routes().merge(verification_routes(rate_limit)),
        )
}
