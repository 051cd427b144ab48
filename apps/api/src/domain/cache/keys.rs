//! Cache key scheme for user data
//!
//! | Entry              | Key                                 |
//! |--------------------|-------------------------------------|
//! | all-users list     | `users:list`                        |
//! | user by identifier | `user:{id or email}`                |
//! | user by email      | `user:email:{lowercased email}`     |
//! | filtered page      | `users:filtered:{canonical filter}` |

use crate::domain::user::{Email, UserFilter, UserIdentifier};

pub const USER_LIST: &str = "users:list";
pub const USER_DETAIL_PREFIX: &str = "user:";
pub const USER_EMAIL_PREFIX: &str = "user:email:";
pub const USERS_FILTERED_PREFIX: &str = "users:filtered:";

pub fn user_list() -> String {
    USER_LIST.to_string()
}

/// Detail key for an identifier, in its canonical form
pub fn user_detail(identifier: &UserIdentifier) -> String {
    format!("{}{}", USER_DETAIL_PREFIX, identifier)
}

pub fn user_email(email: &str) -> String {
    format!("{}{}", USER_EMAIL_PREFIX, Email::normalize(email))
}

/// Key for one filtered page
///
/// Equivalent filters map to the same key: the filter is normalized first and
/// serialized with a fixed field order.
pub fn users_filtered(filter: &UserFilter) -> String {
    let normalized = filter.normalized();
    let canonical =
        serde_json::to_string(&normalized).unwrap_or_else(|_| format!("{:?}", normalized));
    format!("{}{}", USERS_FILTERED_PREFIX, canonical)
}
