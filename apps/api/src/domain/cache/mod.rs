// Cache port and key derivation
// The cache is advisory: every read falls back to the repository

pub mod cache_store;
pub mod keys;

pub use cache_store::{CacheError, CacheResult, CacheStore, CacheStoreExt};
