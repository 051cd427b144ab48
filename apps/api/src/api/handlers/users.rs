use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::extract::{json_body, query_params};
use crate::api::response::ApiResponse;
use crate::api::state::AppState;
use crate::domain::user::filter::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::domain::user::{
    Email, NewUser, UserFilter, UserIdentifier, UserPatch, UserRole, UserStatus, UserView,
};

/// Query string for listing users
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
    pub role: Option<UserRole>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListUsersQuery {
    pub fn into_filter(self) -> Result<UserFilter, ApiError> {
        let filter = UserFilter {
            name: self.name,
            email: self.email,
            phone: self.phone,
            status: self.status,
            role: self.role,
            page: self.page.unwrap_or(DEFAULT_PAGE),
            size: self.size.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        filter.validate().map_err(ApiError::bad_request)?;
        Ok(filter)
    }
}

/// Request body for creating a user
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
}

impl CreateUserRequest {
    /// Validate into a create command
    pub fn into_command(self) -> Result<NewUser, ApiError> {
        let email = Email::new(self.email).map_err(ApiError::bad_request)?;
        if self.password.is_empty() {
            return Err(ApiError::bad_request("Password must not be empty"));
        }

        let mut command = NewUser::new(email, self.password);
        command.name = self.name;
        command.phone = self.phone;
        command.role = self.role.unwrap_or_default();
        command.status = self.status.unwrap_or_default();
        command.avatar = self.avatar;
        command.address = self.address;
        command.billing_address = self.billing_address;
        Ok(command)
    }
}

/// Request body for updating a user; absent fields are left untouched
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub billing_address: Option<String>,
    pub wallet_balance: Option<Decimal>,
    pub is_verified: Option<bool>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> Result<UserPatch, ApiError> {
        let email = self
            .email
            .map(Email::new)
            .transpose()
            .map_err(ApiError::bad_request)?;

        if matches!(self.password.as_deref(), Some("")) {
            return Err(ApiError::bad_request("Password must not be empty"));
        }

        if let Some(balance) = self.wallet_balance {
            if balance < Decimal::ZERO {
                return Err(ApiError::bad_request("walletBalance must not be negative"));
            }
            if balance.scale() > 2 {
                return Err(ApiError::bad_request(
                    "walletBalance must have at most two decimal places",
                ));
            }
        }

        Ok(UserPatch {
            email,
            name: self.name,
            phone: self.phone,
            password: self.password,
            role: self.role,
            status: self.status,
            avatar: self.avatar,
            address: self.address,
            billing_address: self.billing_address,
            wallet_balance: self.wallet_balance,
            is_verified: self.is_verified,
        })
    }
}

/// List users matching the query
///
/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<UserView>>>, ApiError> {
    let filter = query_params(query)?.into_filter()?;
    let page = state.users.get_users(&filter).await?;

    Ok(Json(ApiResponse::from(page)))
}

/// Create a user
///
/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ApiError> {
    let command = json_body(payload)?.into_command()?;
    let user = state.users.create_user(command).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(user))))
}

/// Update a user by id or email
///
/// PUT /users/:identifier
pub async fn update_user(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserView>>, ApiError> {
    let patch = json_body(payload)?.into_patch()?;
    let identifier = UserIdentifier::parse(&identifier);
    let user = state.users.find_user_and_update(&identifier, patch).await?;

    Ok(Json(ApiResponse::new(user)))
}

/// Delete a user by id or email
///
/// DELETE /users/:identifier
pub async fn delete_user(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<StatusCode, ApiError> {
    let identifier = UserIdentifier::parse(&identifier);
    state.users.delete_user(&identifier).await?;

    Ok(StatusCode::NO_CONTENT)
}
