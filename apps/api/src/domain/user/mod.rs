// User domain module
// Contains the user entity, commands, list filters and value objects

#![allow(clippy::module_inception)]

pub mod filter;
pub mod user;
pub mod value_objects;

// Re-export main types for convenience
pub use filter::{PageMeta, PaginatedUsers, UserFilter};
pub use user::{NewUser, NewUserRecord, User, UserPatch, UserView};
pub use value_objects::{Email, UserIdentifier, UserRole, UserStatus};
