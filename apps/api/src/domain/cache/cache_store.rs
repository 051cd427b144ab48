use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors raised by cache adapters
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store with per-entry TTL
///
/// Values are opaque strings; typed access goes through [`CacheStoreExt`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live entry
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set an entry that expires after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Delete an entry; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Enumerate live keys starting with `prefix`
    ///
    /// This is a scan, proportional to the number of matching keys.
    async fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>>;
}

/// JSON helpers over any [`CacheStore`]
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl).await
    }
}

impl<C: CacheStore + ?Sized> CacheStoreExt for C {}
