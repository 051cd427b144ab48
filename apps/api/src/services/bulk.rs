use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::errors::{ServiceResult, UserServiceError};
use super::user_service::{identity_keys, UserService};
use crate::domain::repositories::UserTransaction;
use crate::domain::user::{NewUser, NewUserRecord, UserIdentifier, UserPatch};

/// Outcome of a bulk command; partial success is a normal result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    pub successful: usize,
    pub failed: usize,
    /// Failed items in input order
    pub errors: Vec<BulkItemError>,
}

impl BulkOperationResult {
    fn record_failure(&mut self, identifier: &str, error: &UserServiceError) {
        self.failed += 1;
        self.errors.push(BulkItemError {
            identifier: identifier.to_string(),
            error: error.item_message(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    pub identifier: String,
    pub error: String,
}

/// One item of a bulk update
///
/// Keeps the identifier as the caller wrote it; failures echo it verbatim.
#[derive(Debug, Clone)]
pub struct BulkUserUpdate {
    pub raw_identifier: String,
    pub identifier: UserIdentifier,
    pub patch: UserPatch,
}

impl BulkUserUpdate {
    pub fn new(raw_identifier: impl Into<String>, patch: UserPatch) -> Self {
        let raw_identifier = raw_identifier.into();
        let identifier = UserIdentifier::parse(&raw_identifier);
        Self {
            raw_identifier,
            identifier,
            patch,
        }
    }
}

impl UserService {
    /// Create many accounts
    ///
    /// Colliding emails inside the batch reject it before anything is
    /// written. Chunks are then inserted one statement each; an email that
    /// already exists aborts the call, leaving earlier chunks committed.
    pub async fn create_bulk_users(&self, users: Vec<NewUser>) -> ServiceResult<BulkOperationResult> {
        const FAILED: &str = "Error creating users";

        let mut result = BulkOperationResult::default();
        if users.is_empty() {
            return Ok(result);
        }

        let mut seen = HashSet::new();
        let collisions: BTreeSet<String> = users
            .iter()
            .filter(|u| !seen.insert(u.email.as_str()))
            .map(|u| u.email.to_string())
            .collect();
        if !collisions.is_empty() {
            return Err(UserServiceError::DuplicateEmail(
                collisions.into_iter().collect(),
            ));
        }

        let digests = self
            .hash_all(users.iter().map(|u| u.password.clone()).collect())
            .await?;
        let records: Vec<NewUserRecord> = users
            .into_iter()
            .zip(digests)
            .map(|(user, digest)| user.into_record(digest))
            .collect();

        for chunk in records.chunks(self.config.create_chunk_size.max(1)) {
            let emails: Vec<String> = chunk.iter().map(|r| r.email.to_string()).collect();
            let existing = self
                .repository
                .find_existing_emails(&emails)
                .await
                .map_err(UserServiceError::store(FAILED))?;
            if !existing.is_empty() {
                warn!(
                    committed = result.successful,
                    conflicts = existing.len(),
                    "bulk create aborted on existing emails"
                );
                return Err(UserServiceError::DuplicateEmail(existing));
            }

            let inserted = self
                .repository
                .insert_many(chunk)
                .await
                .map_err(UserServiceError::store(FAILED))?;
            result.successful += inserted as usize;

            self.evict_lists().await;
        }

        info!(created = result.successful, "bulk create finished");
        Ok(result)
    }

    /// Update many accounts, one transaction per chunk
    ///
    /// Items fail independently: a missing user, a taken email or a store
    /// error is recorded against the item and the rest of the chunk still
    /// commits. Failing to open or commit a chunk aborts the remaining
    /// chunks.
    pub async fn update_bulk_users(
        &self,
        updates: Vec<BulkUserUpdate>,
    ) -> ServiceResult<BulkOperationResult> {
        const FAILED: &str = "Error updating users";

        let mut result = BulkOperationResult::default();

        for chunk in updates.chunks(self.config.mutation_chunk_size.max(1)) {
            let mut tx = self
                .repository
                .begin()
                .await
                .map_err(UserServiceError::internal(FAILED))?;
            let mut stale = BTreeSet::new();

            for update in chunk {
                match self.apply_update(tx.as_mut(), update).await {
                    Ok(keys) => {
                        result.successful += 1;
                        stale.extend(keys);
                    }
                    Err(e) => result.record_failure(&update.raw_identifier, &e),
                }
            }

            tx.commit().await.map_err(UserServiceError::internal(FAILED))?;

            if !stale.is_empty() {
                self.evict_keys(stale).await;
                self.evict_lists().await;
            }
        }

        info!(
            successful = result.successful,
            failed = result.failed,
            "bulk update finished"
        );
        Ok(result)
    }

    /// Delete many accounts, one transaction per chunk
    ///
    /// Identifiers that resolve to nothing are skipped without being
    /// reported.
    pub async fn delete_bulk_users(&self, identifiers: Vec<UserIdentifier>) -> ServiceResult<()> {
        const FAILED: &str = "Error deleting users";

        let mut removed = 0usize;
        let mut skipped = 0usize;

        for chunk in identifiers.chunks(self.config.mutation_chunk_size.max(1)) {
            let mut tx = self
                .repository
                .begin()
                .await
                .map_err(UserServiceError::internal(FAILED))?;
            let mut stale = BTreeSet::new();

            for identifier in chunk {
                let user = tx
                    .find_by_identifier(identifier)
                    .await
                    .map_err(UserServiceError::internal(FAILED))?;
                let Some(user) = user else {
                    skipped += 1;
                    continue;
                };

                if tx
                    .delete(user.id)
                    .await
                    .map_err(UserServiceError::internal(FAILED))?
                {
                    removed += 1;
                    stale.extend(identity_keys(Some(identifier), &user, None));
                } else {
                    skipped += 1;
                }
            }

            tx.commit().await.map_err(UserServiceError::internal(FAILED))?;

            if !stale.is_empty() {
                self.evict_keys(stale).await;
                self.evict_lists().await;
            }
        }

        info!(removed, skipped, "bulk delete finished");
        Ok(())
    }

    /// Apply one bulk update inside `tx`
    ///
    /// Returns the cache keys made stale; empty when nothing changed.
    async fn apply_update(
        &self,
        tx: &mut dyn UserTransaction,
        update: &BulkUserUpdate,
    ) -> ServiceResult<BTreeSet<String>> {
        const FAILED: &str = "Error updating user";

        let mut user = tx
            .find_by_identifier(&update.identifier)
            .await
            .map_err(UserServiceError::store(FAILED))?
            .ok_or(UserServiceError::NotFound)?;

        let mut patch = update.patch.clone();
        if let Some(email) = &patch.email {
            if *email != user.email {
                let owner = tx
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
            return Ok(BTreeSet::new());
        }

        let saved = tx
            .update(&user)
            .await
            .map_err(UserServiceError::store(FAILED))?
            .ok_or(UserServiceError::NotFound)?;

        Ok(identity_keys(
            Some(&update.identifier),
            &saved,
            Some(&previous_email),
        ))
    }

    /// Hash every password concurrently, keeping input order
    async fn hash_all(&self, passwords: Vec<String>) -> ServiceResult<Vec<String>> {
        const FAILED: &str = "Error hashing password";

        let mut tasks = JoinSet::new();
        for (index, password) in passwords.into_iter().enumerate() {
            let hasher = Arc::clone(&self.hasher);
            tasks.spawn_blocking(move || (index, hasher.hash(&password)));
        }

        let mut digests = vec![String::new(); tasks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, digest) = joined.map_err(UserServiceError::internal(FAILED))?;
            digests[index] = digest.map_err(UserServiceError::internal(FAILED))?;
        }
        Ok(digests)
    }
}
