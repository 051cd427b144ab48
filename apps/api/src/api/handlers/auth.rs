use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::extract::json_body;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::domain::user::UserView;

/// Request body for credential verification
#[derive(Debug, Deserialize)]
pub struct VerifyCredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Verify an email/password pair and return the account
///
/// POST /api/auth/verify
pub async fn verify_credentials(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCredentialsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let req = json_body(payload)?;
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = state
        .users
        .verify_credentials(&req.email, &req.password)
        .await?;

    Ok(Json(ApiResponse::new(user)))
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
