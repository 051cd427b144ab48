use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::errors::{ServiceResult, UserServiceError};
use crate::auth::password::PasswordHasher;
use crate::domain::cache::{keys, CacheStore, CacheStoreExt};
use crate::domain::repositories::UserRepository;
use crate::domain::user::{
    Email, NewUser, PageMeta, PaginatedUsers, User, UserFilter, UserIdentifier, UserPatch,
    UserView,
};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CREATE_CHUNK_SIZE: usize = 500;
pub const DEFAULT_MUTATION_CHUNK_SIZE: usize = 100;

/// Tunables for [`UserService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub cache_ttl: Duration,
    /// Rows per insert statement in bulk create
    pub create_chunk_size: usize,
    /// Items per transaction in bulk update and delete
    pub mutation_chunk_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            create_chunk_size: DEFAULT_CREATE_CHUNK_SIZE,
            mutation_chunk_size: DEFAULT_MUTATION_CHUNK_SIZE,
        }
    }
}

/// User account service
///
/// The store is authoritative; the cache is consulted first on reads and
/// invalidated after every successful write. Cache failures are logged and
/// never fail an operation.
#[derive(Clone)]
pub struct UserService {
    pub(super) repository: Arc<dyn UserRepository>,
    pub(super) cache: Arc<dyn CacheStore>,
    pub(super) hasher: Arc<dyn PasswordHasher>,
    pub(super) config: ServiceConfig,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheStore>,
        hasher: Arc<dyn PasswordHasher>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            hasher,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create a single account
    ///
    /// A cached email entry short-circuits to `DuplicateEmail`. A cache miss
    /// proves nothing, so the store is checked next, and its unique
    /// constraint settles any race between that check and the insert.
    pub async fn create_user(&self, mut command: NewUser) -> ServiceResult<UserView> {
        const FAILED: &str = "Error creating user";

        // A detail entry for an email like `email:x@y` shares this key, so
        // only an entry for the same address counts
        let email_key = keys::user_email(command.email.as_str());
        let cached = self.cache_get::<UserView>(&email_key).await;
        if cached.is_some_and(|view| view.email == command.email.as_str()) {
            debug!(email = %command.email, "duplicate email found in cache");
            return Err(UserServiceError::duplicate(command.email.as_str()));
        }

        if let Some(existing) = self
            .repository
            .find_by_email(command.email.as_str())
            .await
            .map_err(UserServiceError::store(FAILED))?
        {
            self.cache_set(&email_key, &UserView::from(&existing)).await;
            return Err(UserServiceError::duplicate(command.email.as_str()));
        }

        let password = std::mem::take(&mut command.password);
        let password_hash = self.hash_password(password).await?;

        let user = self
            .repository
            .insert(command.into_record(password_hash))
            .await
            .map_err(UserServiceError::store(FAILED))?;

        info!(user_id = user.id, "user created");
        self.evict_lists().await;
        self.evict_keys(identity_keys(None, &user, None)).await;

        Ok(UserView::from(user))
    }

    /// One filtered page of users, served from cache when possible
    pub async fn get_users(&self, filter: &UserFilter) -> ServiceResult<PaginatedUsers> {
        let filter = filter.normalized();
        let key = keys::users_filtered(&filter);

        if let Some(page) = self.cache_get::<PaginatedUsers>(&key).await {
            return Ok(page);
        }

        let (users, total) = self
            .repository
            .find_page(&filter)
            .await
            .map_err(UserServiceError::store("Error fetching users"))?;

        let page = PaginatedUsers {
            data: users.iter().map(UserView::from).collect(),
            meta: PageMeta::new(total, filter.page, filter.size),
        };
        self.cache_set(&key, &page).await;

        Ok(page)
    }

    /// Apply `patch` to the user behind `identifier`
    ///
    /// A patch that leaves the record unchanged is not persisted and evicts
    /// nothing.
    pub async fn find_user_and_update(
        &self,
        identifier: &UserIdentifier,
        mut patch: UserPatch,
    ) -> ServiceResult<UserView> {
        const FAILED: &str = "Error updating user";

        let detail_key = keys::user_detail(identifier);
        let mut user = self
            .load_user(identifier, &detail_key)
            .await?
            .ok_or(UserServiceError::NotFound)?;

        if patch.is_empty() {
            return Ok(UserView::from(user));
        }

        if let Some(email) = &patch.email {
            if *email != user.email {
                let owner = self
                    .repository
                    .find_by_email(email.as_str())
                    .await
                    .map_err(UserServiceError::store(FAILED))?;
                if matches!(owner, Some(ref other) if other.id != user.id) {
                    return Err(UserServiceError::duplicate(email.as_str()));
                }
            }
        }

        let password_hash = match patch.password.take() {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        let previous_email = user.email.clone();
        if !user.merge(patch, password_hash) {
            return Ok(UserView::from(user));
        }

        let saved = match self
            .repository
            .update(&user)
            .await
            .map_err(UserServiceError::store(FAILED))?
        {
            Some(saved) => saved,
            None => {
                // The cached record outlived the row
                self.evict(&detail_key).await;
                return Err(UserServiceError::NotFound);
            }
        };

        info!(user_id = saved.id, "user updated");
        self.evict_lists().await;
        self.evict_keys(identity_keys(Some(identifier), &saved, Some(&previous_email)))
            .await;

        Ok(UserView::from(saved))
    }

    /// Hard-delete the user behind `identifier`
    pub async fn delete_user(&self, identifier: &UserIdentifier) -> ServiceResult<()> {
        const FAILED: &str = "Error deleting user";

        let user = self
            .repository
            .find_by_identifier(identifier)
            .await
            .map_err(UserServiceError::store(FAILED))?
            .ok_or(UserServiceError::NotFound)?;

        if !self
            .repository
            .delete(user.id)
            .await
            .map_err(UserServiceError::store(FAILED))?
        {
            return Err(UserServiceError::NotFound);
        }

        info!(user_id = user.id, "user deleted");
        self.evict_lists().await;
        self.evict_keys(identity_keys(Some(identifier), &user, None))
            .await;

        Ok(())
    }

    /// Check an email/password pair and record the login
    ///
    /// Unknown emails and wrong passwords are indistinguishable to the
    /// caller.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> ServiceResult<UserView> {
        const FAILED: &str = "Error verifying credentials";

        let mut user = self
            .repository
            .find_by_email(&Email::normalize(email))
            .await
            .map_err(UserServiceError::store(FAILED))?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let hasher = Arc::clone(&self.hasher);
        let plaintext = password.to_string();
        let digest = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(UserServiceError::internal(FAILED))?
            .map_err(UserServiceError::internal(FAILED))?;

        if !valid {
            return Err(UserServiceError::InvalidCredentials);
        }

        match self.repository.update_last_login(user.id).await {
            Ok(()) => {
                let now = Utc::now();
                user.last_login_at = Some(now);
                user.updated_at = now;
            }
            Err(e) => warn!(user_id = user.id, error = %e, "failed to record last login"),
        }

        self.evict_lists().await;
        self.evict_keys(identity_keys(None, &user, None)).await;

        Ok(UserView::from(user))
    }

    /// Two-tier lookup: detail cache entry, then the store, backfilling the
    /// cache on a store hit
    async fn load_user(
        &self,
        identifier: &UserIdentifier,
        detail_key: &str,
    ) -> ServiceResult<Option<User>> {
        if let Some(user) = self.cache_get::<User>(detail_key).await {
            return Ok(Some(user));
        }

        let user = self
            .repository
            .find_by_identifier(identifier)
            .await
            .map_err(UserServiceError::store("Error fetching user"))?;

        if let Some(user) = &user {
            self.cache_set(detail_key, user).await;
        }
        Ok(user)
    }

    /// Hash on the blocking pool; bcrypt is CPU-bound
    pub(super) async fn hash_password(&self, password: String) -> ServiceResult<String> {
        const FAILED: &str = "Error hashing password";

        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(UserServiceError::internal(FAILED))?
            .map_err(UserServiceError::internal(FAILED))
    }

    pub(super) async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get_json::<T>(key).await {
            Ok(Some(value)) => {
                debug!(key, "cache hit");
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }

    pub(super) async fn cache_set<T: Serialize + Sync>(&self, key: &str, value: &T) {
        if let Err(e) = self.cache.set_json(key, value, self.config.cache_ttl).await {
            warn!(key, error = %e, "cache write failed");
        }
    }

    pub(super) async fn evict(&self, key: &str) {
        match self.cache.delete(key).await {
            Ok(()) => debug!(key, "cache entry evicted"),
            Err(e) => warn!(key, error = %e, "cache eviction failed"),
        }
    }

    pub(super) async fn evict_keys(&self, keys: impl IntoIterator<Item = String>) {
        for key in keys {
            self.evict(&key).await;
        }
    }

    /// Evict the all-users list and sweep every filtered page
    pub(super) async fn evict_lists(&self) {
        self.evict(&keys::user_list()).await;

        match self.cache.keys_with_prefix(keys::USERS_FILTERED_PREFIX).await {
            Ok(filtered) => self.evict_keys(filtered).await,
            Err(e) => warn!(error = %e, "filtered cache sweep failed"),
        }
    }
}

/// Every per-user cache key that may hold `user`
///
/// Covers the id and email detail keys, the email lookup key, the key of the
/// identifier the caller used, and the same for a replaced email.
pub(super) fn identity_keys(
    identifier: Option<&UserIdentifier>,
    user: &User,
    previous_email: Option<&Email>,
) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    found.insert(keys::user_detail(&UserIdentifier::Id(user.id)));
    if let Some(identifier) = identifier {
        found.insert(keys::user_detail(identifier));
    }

    for email in std::iter::once(&user.email).chain(previous_email) {
        found.insert(keys::user_detail(&UserIdentifier::Email(
            email.as_str().to_string(),
        )));
        found.insert(keys::user_email(email.as_str()));
    }
    found
}
