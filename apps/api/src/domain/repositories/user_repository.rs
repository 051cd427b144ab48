use async_trait::async_trait;
use thiserror::Error;

use crate::domain::user::{NewUserRecord, User, UserFilter, UserIdentifier};

/// Errors raised by user store adapters
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The store's unique constraint on email rejected the write; carries
    /// the email when the adapter can tell which one
    #[error("Email already exists")]
    UniqueViolation(Option<String>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid row in store: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Repository trait for the User aggregate
///
/// Point lookups, filtered pages, batch insert and a transactional unit of
/// work. Implementations must enforce email uniqueness themselves and report
/// violations as [`RepositoryError::UniqueViolation`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;

    /// Find a user by (normalized) email address
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;

    /// Resolve an id-or-email identifier
    ///
    /// Numeric identifiers try the id first and fall back to an email match.
    async fn find_by_identifier(
        &self,
        identifier: &UserIdentifier,
    ) -> RepositoryResult<Option<User>> {
        if let UserIdentifier::Id(id) = identifier {
            if let Some(user) = self.find_by_id(*id).await? {
                return Ok(Some(user));
            }
        }
        self.find_by_email(&identifier.email_fallback()).await
    }

    /// One page of users matching `filter`, plus the total match count
    async fn find_page(&self, filter: &UserFilter) -> RepositoryResult<(Vec<User>, u64)>;

    /// Which of `emails` already belong to a user
    async fn find_existing_emails(&self, emails: &[String]) -> RepositoryResult<Vec<String>>;

    /// Insert a single user, returning the stored row
    async fn insert(&self, record: NewUserRecord) -> RepositoryResult<User>;

    /// Insert all records in one statement; either all rows land or none do
    async fn insert_many(&self, records: &[NewUserRecord]) -> RepositoryResult<u64>;

    /// Persist every mutable field of `user`, bumping `updated_at`
    ///
    /// Returns `None` if the row no longer exists.
    async fn update(&self, user: &User) -> RepositoryResult<Option<User>>;

    /// Hard delete; returns whether a row was removed
    async fn delete(&self, id: i64) -> RepositoryResult<bool>;

    /// Stamp the last successful login
    async fn update_last_login(&self, id: i64) -> RepositoryResult<()>;

    /// Open a unit of work
    async fn begin(&self) -> RepositoryResult<Box<dyn UserTransaction>>;
}

/// A unit of work over the user store
///
/// Each write is applied under its own savepoint, so a failed write leaves
/// the earlier writes of the same transaction intact. Dropping the
/// transaction without [`commit`](UserTransaction::commit) discards it.
#[async_trait]
pub trait UserTransaction: Send {
    async fn find_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>>;

    async fn find_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>>;

    async fn find_by_identifier(
        &mut self,
        identifier: &UserIdentifier,
    ) -> RepositoryResult<Option<User>> {
        if let UserIdentifier::Id(id) = identifier {
            if let Some(user) = self.find_by_id(*id).await? {
                return Ok(Some(user));
            }
        }
        self.find_by_email(&identifier.email_fallback()).await
    }

    async fn update(&mut self, user: &User) -> RepositoryResult<Option<User>>;

    async fn delete(&mut self, id: i64) -> RepositoryResult<bool>;

    async fn commit(self: Box<Self>) -> RepositoryResult<()>;
}
