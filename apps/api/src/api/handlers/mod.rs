// HTTP handlers
// Thin adapters: validate input, call UserService, shape the response.

pub mod auth;
pub mod bulk_users;
pub mod users;
