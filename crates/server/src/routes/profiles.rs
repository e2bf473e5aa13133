//! Profile API routes.
//!
//! Profiles are opaque JSON objects keyed by the family's PIN. The browser
//! writes the whole record at once; the server never merges fields.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use storynest_core::{ProfileId, ProfileRecord};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Request to store a profile.
#[derive(Debug, Deserialize)]
pub struct UpdateUserDataRequest {
    pub pin: Option<String>,
    #[serde(rename = "userData")]
    pub user_data: Option<Value>,
}

/// Response from storing a profile.
#[derive(Debug, Serialize)]
pub struct UpdateUserDataResponse {
    pub success: bool,
}

/// Stored profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub pin: ProfileId,
    #[serde(rename = "userData")]
    pub user_data: ProfileRecord,
}

/// Replace the record stored under `pin` with `userData`.
///
/// POST /api/updateUserData
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a missing or invalid `pin` or a
/// non-object `userData`, and `AppError::Store` if the document cannot be
/// read or written.
#[instrument(skip_all, fields(profile_id))]
pub async fn update_user_data(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateUserDataRequest>, JsonRejection>,
) -> Result<Json<UpdateUserDataResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let pin = request
        .pin
        .ok_or_else(|| AppError::BadRequest("pin is required".to_string()))?;
    let pin = ProfileId::parse(&pin).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = request
        .user_data
        .and_then(ProfileRecord::from_value)
        .ok_or_else(|| AppError::BadRequest("userData must be a JSON object".to_string()))?;

    tracing::Span::current().record("profile_id", tracing::field::display(&pin));
    add_breadcrumb("profile", "Profile saved", Some(&[("pin", pin.as_str())]));

    state.store().put(&pin, record).await?;
    Ok(Json(UpdateUserDataResponse { success: true }))
}

/// Fetch the record stored under `pin`.
///
/// GET /api/profiles/{pin}
///
/// # Errors
///
/// Returns `AppError::NotFound` if no record exists, `AppError::BadRequest`
/// for an invalid `pin`, and `AppError::Store` on read failures.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(pin): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let pin = ProfileId::parse(&pin).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = state
        .store()
        .get(&pin)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(ProfileResponse {
        pin,
        user_data: record,
    }))
}
