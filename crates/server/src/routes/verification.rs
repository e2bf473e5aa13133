//! Email verification API routes.
//!
//! Errors here answer `{"message": ...}`, with `error` and `details` added
//! when the email provider failed.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storynest_core::{ProfileId, VerifyOutcome};

use crate::db::StoreError;
use crate::error::add_breadcrumb;
use crate::services::VerificationError;
use crate::state::AppState;

/// Error response for verification endpoints.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            error: None,
            details: None,
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Delivery(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    sentry_event_id = %event_id,
                    "Verification email delivery failed"
                );
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Failed to send verification email".to_string(),
                    details: Some(e.details()),
                    error: Some(e.to_string()),
                }
            }
            VerificationError::Store(StoreError::NotFound(_)) => Self {
                status: StatusCode::NOT_FOUND,
                message: "Profile not found".to_string(),
                error: None,
                details: None,
            },
            VerificationError::Store(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    sentry_event_id = %event_id,
                    "Failed to mark profile verified"
                );
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Failed to save verification".to_string(),
                    error: None,
                    details: None,
                }
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

// ============================================================================
// Sending
// ============================================================================

/// Request to send a browser-chosen code.
#[derive(Debug, Deserialize)]
pub struct SendVerificationRequest {
    pub email: Option<String>,
    pub code: Option<String>,
}

/// Generic success message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Send a verification email with the code chosen by the browser.
///
/// POST /api/send-verification
///
/// The code is retained as well, so `/api/verification/verify` accepts it.
///
/// # Errors
///
/// Returns 400 for missing or malformed fields and 500 with provider
/// details if delivery fails.
#[instrument(skip_all)]
pub async fn send_verification(
    State(state): State<AppState>,
    payload: Result<Json<SendVerificationRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (email, code) = match (request.email, request.code) {
        (Some(email), Some(code)) if !email.trim().is_empty() && !code.is_empty() => (email, code),
        _ => return Err(ApiError::bad_request("Email and code are required")),
    };

    state
        .verification()
        .issue_with_code(&email, &code)
        .await?;

    add_breadcrumb("verification", "Verification email sent", None);
    Ok(Json(MessageResponse {
        message: "Verification email sent successfully".to_string(),
    }))
}

/// Request to issue a server-generated code.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    pub email: Option<String>,
}

/// Response from issuing a code.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub message: String,
    /// Seconds until the code expires; absent when codes never expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
}

/// Generate a code and email it.
///
/// POST /api/verification/issue
///
/// # Errors
///
/// Returns 400 for a missing or malformed email and 500 with provider
/// details if delivery fails.
#[instrument(skip_all)]
pub async fn issue(
    State(state): State<AppState>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let email = required(request.email, "email")?;

    let verification = state.verification();
    verification.issue(&email).await?;

    add_breadcrumb("verification", "Verification code issued", None);
    Ok(Json(IssueResponse {
        message: "Verification email sent successfully".to_string(),
        expires_in_seconds: verification.config().code_ttl.map(|ttl| ttl.as_secs()),
    }))
}

// ============================================================================
// Verifying
// ============================================================================

/// Request to check an entered code.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: Option<String>,
    pub code: Option<String>,
    /// Profile to mark verified on success.
    pub pin: Option<String>,
}

/// Result of a verify attempt.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyOutcome>,
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(outcome: VerifyOutcome) -> Self {
        match outcome {
            VerifyOutcome::Verified => Self {
                verified: true,
                reason: None,
            },
            other => Self {
                verified: false,
                reason: Some(other),
            },
        }
    }
}

/// Check an entered code.
///
/// POST /api/verification/verify
///
/// A mismatch or expired code is a normal `200` answer with
/// `verified: false` and a `reason`.
///
/// # Errors
///
/// Returns 400 for missing fields or when no code was issued for the email,
/// 404 if `pin` names no profile, and 500 if the profile cannot be updated.
#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let email = required(request.email, "email")?;
    let code = required(request.code, "code")?;
    let pin = request
        .pin
        .map(|pin| ProfileId::parse(&pin))
        .transpose()
        .map_err(|e| ApiError::from(VerificationError::InvalidProfileId(e.to_string())))?;

    let outcome = state
        .verification()
        .verify(&email, &code, pin.as_ref())
        .await?;

    Ok(Json(outcome.into()))
}
