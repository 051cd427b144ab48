//! Shared fixtures for integration tests
//!
//! In-memory adapters plus a few doubles that fail on purpose.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use accounts_api::auth::BcryptHasher;
use accounts_api::domain::cache::{CacheError, CacheResult, CacheStore};
use accounts_api::domain::repositories::{
    RepositoryError, RepositoryResult, UserRepository, UserTransaction,
};
use accounts_api::domain::user::{Email, NewUser, NewUserRecord, User, UserFilter};
use accounts_api::infrastructure::cache::InMemoryCacheStore;
use accounts_api::infrastructure::repositories::InMemoryUserRepository;
use accounts_api::services::{ServiceConfig, UserService};
use async_trait::async_trait;

/// Lowest cost bcrypt accepts
pub const TEST_BCRYPT_COST: u32 = 4;
pub const PASSWORD: &str = "password123";

pub struct Harness {
    pub service: UserService,
    pub repo: InMemoryUserRepository,
    pub cache: InMemoryCacheStore,
}

pub fn harness() -> Harness {
    harness_with(ServiceConfig::default())
}

pub fn harness_with(config: ServiceConfig) -> Harness {
    let repo = InMemoryUserRepository::new();
    let cache = InMemoryCacheStore::new();
    let service = service(Arc::new(repo.clone()), Arc::new(cache.clone()), config);
    Harness {
        service,
        repo,
        cache,
    }
}

pub fn service(
    repo: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheStore>,
    config: ServiceConfig,
) -> UserService {
    UserService::new(
        repo,
        cache,
        Arc::new(BcryptHasher::new(TEST_BCRYPT_COST)),
        config,
    )
}

pub fn new_user(email: &str) -> NewUser {
    NewUser::new(Email::new(email).expect("valid email"), PASSWORD)
}

pub fn named_user(email: &str, name: &str) -> NewUser {
    let mut user = new_user(email);
    user.name = Some(name.to_string());
    user
}

pub fn email_filter(email: &str) -> UserFilter {
    UserFilter {
        email: Some(email.to_string()),
        ..Default::default()
    }
}

pub fn name_filter(name: &str) -> UserFilter {
    UserFilter {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Cache whose backend is always down
#[derive(Debug, Default, Clone)]
pub struct UnreachableCache;

fn down() -> CacheError {
    CacheError::Backend("connection refused".to_string())
}

#[async_trait]
impl CacheStore for UnreachableCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(down())
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Err(down())
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> CacheResult<Vec<String>> {
        Err(down())
    }
}

/// In-memory repository that fails selected transactional operations
#[derive(Clone, Default)]
pub struct FlakyRepository {
    pub inner: InMemoryUserRepository,
    /// Transactional updates of these ids fail with a database error
    pub failing_updates: HashSet<i64>,
    pub fail_commit: bool,
}

#[async_trait]
impl UserRepository for FlakyRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn find_page(&self, filter: &UserFilter) -> RepositoryResult<(Vec<User>, u64)> {
        self.inner.find_page(filter).await
    }

    async fn find_existing_emails(&self, emails: &[String]) -> RepositoryResult<Vec<String>> {
        self.inner.find_existing_emails(emails).await
    }

    async fn insert(&self, record: NewUserRecord) -> RepositoryResult<User> {
        self.inner.insert(record).await
    }

    async fn insert_many(&self, records: &[NewUserRecord]) -> RepositoryResult<u64> {
        self.inner.insert_many(records).await
    }

    async fn update(&self, user: &User) -> RepositoryResult<Option<User>> {
        self.inner.update(user).await
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        self.inner.delete(id).await
    }

    async fn update_last_login(&self, id: i64) -> RepositoryResult<()> {
        self.inner.update_last_login(id).await
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn UserTransaction>> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            failing_updates: self.failing_updates.clone(),
            fail_commit: self.fail_commit,
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn UserTransaction>,
    failing_updates: HashSet<i64>,
    fail_commit: bool,
}

#[async_trait]
impl UserTransaction for FlakyTransaction {
    async fn find_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn update(&mut self, user: &User) -> RepositoryResult<Option<User>> {
        if self.failing_updates.contains(&user.id) {
            return Err(RepositoryError::Database("deadlock detected".to_string()));
        }
        self.inner.update(user).await
    }

    async fn delete(&mut self, id: i64) -> RepositoryResult<bool> {
        self.inner.delete(id).await
    }

    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        let FlakyTransaction {
            inner, fail_commit, ..
        } = *self;
        if fail_commit {
            return Err(RepositoryError::Database("connection lost".to_string()));
        }
        inner.commit().await
    }
}

/// Store where every email check misses but every insert loses a race
///
/// Models a concurrent writer taking the email between the existence check
/// and the insert, leaving the unique constraint to reject it.
#[derive(Clone, Default)]
pub struct RacingRepository {
    pub inner: InMemoryUserRepository,
}

#[async_trait]
impl UserRepository for RacingRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, _email: &str) -> RepositoryResult<Option<User>> {
        Ok(None)
    }

    async fn find_page(&self, filter: &UserFilter) -> RepositoryResult<(Vec<User>, u64)> {
        self.inner.find_page(filter).await
    }

    async fn find_existing_emails(&self, _emails: &[String]) -> RepositoryResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn insert(&self, record: NewUserRecord) -> RepositoryResult<User> {
        Err(RepositoryError::UniqueViolation(Some(record.email.to_string())))
    }

    async fn insert_many(&self, _records: &[NewUserRecord]) -> RepositoryResult<u64> {
        Err(RepositoryError::UniqueViolation(None))
    }

    async fn update(&self, user: &User) -> RepositoryResult<Option<User>> {
        self.inner.update(user).await
    }

    async fn delete(&self, id: i64) -> RepositoryResult<bool> {
        self.inner.delete(id).await
    }

    async fn update_last_login(&self, id: i64) -> RepositoryResult<()> {
        self.inner.update_last_login(id).await
    }

    async fn begin(&self) -> RepositoryResult<Box<dyn UserTransaction>> {
        self.inner.begin().await
    }
}
