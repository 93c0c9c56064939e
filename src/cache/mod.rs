//! Cache layer
//!
//! In-process caching for hot read paths (the category list and the public
//! announcement feed). Entries are stored as JSON so any serializable value
//! can be cached, each with its own TTL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use schoolnet::cache::{create_cache, CacheLayer};
//! use schoolnet::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("categories:list", &categories, cache.default_ttl()).await?;
//! cache.delete_prefix("announcements:").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The methods are generic over the cached type, so the trait is not object
/// safe; services hold the concrete [`MemoryCache`] behind an `Arc`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}
