// Cache adapters implementing the domain CacheStore port

pub mod in_memory_cache;
pub mod redis_cache;

pub use in_memory_cache::InMemoryCacheStore;
pub use redis_cache::RedisCacheStore;
