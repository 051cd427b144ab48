use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::{auth, bulk_users, users};
use super::state::AppState;

/// All routes, without transport middleware
///
/// `main` layers tracing and CORS on top; tests drive this directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(auth::health_check))
        // Auth routes
        .route("/api/auth/verify", post(auth::verify_credentials))
        // User routes
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/bulk",
            post(bulk_users::create_bulk_users)
                .put(bulk_users::update_bulk_users)
                .delete(bulk_users::delete_bulk_users),
        )
        .route(
            "/users/:identifier",
            put(users::update_user).delete(users::delete_user),
        )
        .with_state(state)
}
