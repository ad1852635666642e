//! Post cache
//!
//! A cache-aside layer for single-post reads. [`CachedPostStore`] wraps any
//! [`PostStore`](crate::application::posts::PostStore) and consults a
//! [`PostCache`] before reading through:
//!
//! - **memory**: in-process LRU with a per-entry TTL
//! - **redis**: shared cache, behind the `redis-cache` feature
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"
//! ttl_seconds = 3600
//! capacity = 10000
//! ```

mod config;
mod decorator;
#[cfg(feature = "redis-cache")]
mod redis;
mod store;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::Post;

pub use config::{CacheBackendKind, CacheConfig};
pub use decorator::CachedPostStore;
#[cfg(feature = "redis-cache")]
pub use redis::RedisPostCache;
pub use store::MemoryPostCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache entry could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Storage for post snapshots keyed by post ID.
#[async_trait]
pub trait PostCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Post>, CacheError>;

    /// Store the snapshot for `post.id` and restart its TTL, unless the
    /// cache already holds a higher version of the same post.
    async fn put(&self, post: &Post) -> Result<(), CacheError>;

    async fn invalidate(&self, id: Uuid) -> Result<(), CacheError>;
}
