use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::users::{CreateUserRequest, UpdateUserRequest};
use crate::api::errors::ApiError;
use crate::api::extract::json_body;
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::domain::user::UserIdentifier;
use crate::services::{BulkOperationResult, BulkUserUpdate};

#[derive(Debug, Deserialize)]
pub struct BulkCreateUsersRequest {
    pub users: Vec<CreateUserRequest>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateItem {
    pub identifier: String,
    pub data: UpdateUserRequest,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateUsersRequest {
    pub updates: Vec<BulkUpdateItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteUsersRequest {
    pub identifiers: Vec<String>,
}

/// Prefix a validation error with the offending item's position
fn at_index(field: &'static str, index: usize) -> impl FnOnce(ApiError) -> ApiError {
    move |err| ApiError::bad_request(format!("{}[{}]: {}", field, index, err.message))
}

/// Create users in bulk
///
/// POST /users/bulk
pub async fn create_bulk_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkCreateUsersRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<BulkOperationResult>>), ApiError> {
    let commands = json_body(payload)?
        .users
        .into_iter()
        .enumerate()
        .map(|(i, user)| user.into_command().map_err(at_index("users", i)))
        .collect::<Result<Vec<_>, _>>()?;

    let result = state.users.create_bulk_users(commands).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(result))))
}

/// Update users in bulk; per-item failures are reported in the result
///
/// PUT /users/bulk
pub async fn update_bulk_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkUpdateUsersRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BulkOperationResult>>, ApiError> {
    let updates = json_body(payload)?
        .updates
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let patch = item.data.into_patch().map_err(at_index("updates", i))?;
            Ok(BulkUserUpdate::new(item.identifier, patch))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    let result = state.users.update_bulk_users(updates).await?;

    Ok(Json(ApiResponse::new(result)))
}

/// Delete users in bulk; unknown identifiers are ignored
///
/// DELETE /users/bulk
pub async fn delete_bulk_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkDeleteUsersRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let identifiers = json_body(payload)?
        .identifiers
        .iter()
        .map(|raw| UserIdentifier::parse(raw))
        .collect();

    state.users.delete_bulk_users(identifiers).await?;

    Ok(StatusCode::NO_CONTENT)
}
