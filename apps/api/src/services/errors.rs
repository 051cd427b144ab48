use std::fmt::Display;

use thiserror::Error;

use crate::domain::repositories::RepositoryError;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "Email already exists";
pub const NOT_FOUND_MESSAGE: &str = "User not found";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

/// Failures surfaced by [`UserService`](super::UserService)
///
/// `DuplicateEmail`, `NotFound` and `InvalidCredentials` are deliberate and
/// reach the caller unchanged. Everything else is logged where it happens
/// and collapsed into `Internal` with a generic message.
#[derive(Debug, Error)]
pub enum UserServiceError {
    /// Offending emails, when known
    #[error("{}", duplicate_message(.0))]
    DuplicateEmail(Vec<String>),

    #[error("User not found")]
    NotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, UserServiceError>;

fn duplicate_message(emails: &[String]) -> String {
    if emails.is_empty() {
        DUPLICATE_EMAIL_MESSAGE.to_string()
    } else {
        format!("{}: {}", DUPLICATE_EMAIL_MESSAGE, emails.join(", "))
    }
}

impl UserServiceError {
    pub fn duplicate(email: impl Into<String>) -> Self {
        Self::DuplicateEmail(vec![email.into()])
    }

    /// Logs `err` and masks it behind `message`
    pub(crate) fn internal<E: Display>(message: &'static str) -> impl FnOnce(E) -> Self {
        move |err| {
            tracing::error!(error = %err, "{}", message);
            Self::Internal(message.to_string())
        }
    }

    /// Like [`internal`](Self::internal), but a unique-email violation from
    /// the store becomes `DuplicateEmail`
    pub(crate) fn store(message: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |err| match err {
            RepositoryError::UniqueViolation(email) => {
                Self::DuplicateEmail(email.into_iter().collect())
            }
            other => Self::internal(message)(other),
        }
    }

    /// Short reason recorded against a failed bulk item
    pub fn item_message(&self) -> String {
        match self {
            Self::DuplicateEmail(_) => DUPLICATE_EMAIL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_message_lists_offenders() {
        let err = UserServiceError::DuplicateEmail(vec![
            "a@example.com".to_string(),
            "b@example.com".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Email already exists: a@example.com, b@example.com"
        );
        assert_eq!(err.item_message(), "Email already exists");
    }

    #[test]
    fn duplicate_without_offenders() {
        assert_eq!(
            UserServiceError::DuplicateEmail(Vec::new()).to_string(),
            "Email already exists"
        );
    }

    #[test]
    fn unique_violation_maps_to_duplicate() {
        let err = UserServiceError::store("Error creating user")(RepositoryError::UniqueViolation(
            Some("x@example.com".to_string()),
        ));
        assert!(matches!(err, UserServiceError::DuplicateEmail(ref e) if e == &["x@example.com"]));
    }

    #[test]
    fn other_store_errors_are_masked() {
        let err = UserServiceError::store("Error creating user")(RepositoryError::Database(
            "connection reset by peer".to_string(),
        ));
        match err {
            UserServiceError::Internal(message) => assert_eq!(message, "Error creating user"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn item_messages() {
        assert_eq!(UserServiceError::NotFound.item_message(), "User not found");
        assert_eq!(
            UserServiceError::Internal("Error updating user".to_string()).item_message(),
            "Error updating user"
        );
    }
}
