//! Cache-aside decorator over any [`PostStore`].
//!
//! Single-post reads are served from the cache when possible; every other
//! operation goes to the wrapped store first and only touches the cache once
//! the store has answered. The cache is never authoritative and never fails
//! a request: cache errors are logged, counted and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::error::MicroblogError;
use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
use crate::application::posts::PostStore;
use crate::domain::entities::{NewPost, Post};
use crate::domain::types::UserId;

use super::PostCache;

const TARGET: &str = "microblog::cache";

const METRIC_CACHE_HIT: &str = "microblog_cache_hit_total";
const METRIC_CACHE_MISS: &str = "microblog_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "microblog_cache_error_total";

pub struct CachedPostStore<S> {
    inner: S,
    cache: Arc<dyn PostCache>,
}

impl<S: PostStore> CachedPostStore<S> {
    pub fn new(inner: S, cache: Arc<dyn PostCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn remember(&self, post: &Post, op: &'static str) -> bool {
        match self.cache.put(post).await {
            Ok(()) => true,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
                warn!(
                    target = TARGET,
                    op,
                    post_id = %post.id,
                    error = %err,
                    "failed to write post to cache"
                );
                false
            }
        }
    }

    /// Drop whatever the cache holds for `id` so the next read goes to the store.
    async fn forget(&self, id: Uuid, op: &'static str) {
        if let Err(err) = self.cache.invalidate(id).await {
            counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
            warn!(
                target = TARGET,
                op,
                post_id = %id,
                error = %err,
                "failed to evict post from cache; reads may be stale until it expires"
            );
        }
    }
}

#[async_trait]
impl<S: PostStore> PostStore for CachedPostStore<S> {
    async fn create_post(&self, post: NewPost) -> Result<Post, MicroblogError> {
        let stored = self.inner.create_post(post).await?;
        self.remember(&stored, "create_post").await;
        Ok(stored)
    }

    async fn get_post(&self, id: Uuid) -> Result<Post, MicroblogError> {
        match self.cache.get(id).await {
            Ok(Some(post)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                return Ok(post);
            }
            Ok(None) => counter!(METRIC_CACHE_MISS).increment(1),
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "get_post").increment(1);
                warn!(
                    target = TARGET,
                    post_id = %id,
                    error = %err,
                    "cache read failed; falling back to store"
                );
            }
        }

        let post = self.inner.get_post(id).await?;
        self.remember(&post, "get_post").await;
        Ok(post)
    }

    async fn change_post_text(
        &self,
        id: Uuid,
        requester: &UserId,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, MicroblogError> {
        let updated = self
            .inner
            .change_post_text(id, requester, text, modified_at)
            .await?;
        if !self.remember(&updated, "change_post_text").await {
            self.forget(updated.id, "change_post_text").await;
        }
        Ok(updated)
    }

    async fn get_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, MicroblogError> {
        let page = self.inner.get_post_line(author, page).await?;
        for post in &page.items {
            self.remember(post, "get_post_line").await;
        }
        Ok(page)
    }
}
