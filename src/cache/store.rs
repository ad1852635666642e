//! In-process post cache: LRU eviction plus a per-entry TTL.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use uuid::Uuid;

use crate::domain::entities::Post;
use crate::util::lock::{rw_read, rw_write};

use super::config::CacheConfig;
use super::{CacheError, PostCache};

const SOURCE: &str = "cache::store";

struct Entry {
    post: Post,
    stored_at: Instant,
}

/// Post snapshots keyed by ID. Expired entries are dropped lazily when read.
pub struct MemoryPostCache {
    ttl: Duration,
    posts_by_id: RwLock<LruCache<Uuid, Entry>>,
}

impl MemoryPostCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            posts_by_id: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.posts_by_id, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_post(&self, id: Uuid) -> Option<Post> {
        let mut posts = rw_write(&self.posts_by_id, SOURCE, "get_post");
        let expired = match posts.get(&id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.post.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            posts.pop(&id);
        }
        None
    }

    /// Returns `false` when a live entry holds a higher version.
    pub fn set_post(&self, post: Post) -> bool {
        let mut posts = rw_write(&self.posts_by_id, SOURCE, "set_post");
        if let Some(stored) = posts.peek(&post.id)
            && stored.stored_at.elapsed() < self.ttl
            && !post.supersedes(stored.post.version)
        {
            return false;
        }
        let entry = Entry {
            stored_at: Instant::now(),
            post,
        };
        posts.put(entry.post.id, entry);
        true
    }

    pub fn invalidate_post(&self, id: Uuid) {
        rw_write(&self.posts_by_id, SOURCE, "invalidate_post").pop(&id);
    }
}

#[async_trait]
impl PostCache for MemoryPostCache {
    async fn get(&self, id: Uuid) -> Result<Option<Post>, CacheError> {
        Ok(self.get_post(id))
    }

    async fn put(&self, post: &Post) -> Result<(), CacheError> {
        self.set_post(post.clone());
        Ok(())
    }

    async fn invalidate(&self, id: Uuid) -> Result<(), CacheError> {
        self.invalidate_post(id);
        Ok(())
    }
}
