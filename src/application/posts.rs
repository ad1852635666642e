//! Post Store: canonical posts plus per-author post-lines.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::error::MicroblogError;
use crate::application::fanout::FanoutEngine;
use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
use crate::application::repos::PostsRepo;
use crate::application::retry::{MAX_INSERT_ATTEMPTS, retry_on_collision};
use crate::domain::entities::{NewPost, Post};
use crate::domain::types::UserId;

/// Contract of a post store. Implemented by [`PostService`] and by
/// decorators layered over it.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Store a new post and replicate it to the author's subscribers.
    ///
    /// `post.id` is used for the first attempt; should it collide, later
    /// attempts draw fresh IDs, so the returned post carries the ID that
    /// was actually stored.
    async fn create_post(&self, post: NewPost) -> Result<Post, MicroblogError>;

    async fn get_post(&self, id: Uuid) -> Result<Post, MicroblogError>;

    async fn change_post_text(
        &self,
        id: Uuid,
        requester: &UserId,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, MicroblogError>;

    /// Page through `author`'s posts, newest first. The cursor has already
    /// been validated as issued for this author's post-line.
    async fn get_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, MicroblogError>;
}

/// Repository-backed [`PostStore`] driving feed fan-out on writes.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    fanout: FanoutEngine,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostsRepo>, fanout: FanoutEngine) -> Self {
        Self { posts, fanout }
    }
}

#[async_trait]
impl PostStore for PostService {
    #[instrument(skip(self, post), fields(author = %post.author_id))]
    async fn create_post(&self, post: NewPost) -> Result<Post, MicroblogError> {
        let repo = &self.posts;
        let draft = &post;
        let stored = retry_on_collision("create_post", MAX_INSERT_ATTEMPTS, move |attempt| {
            let mut candidate = draft.clone();
            if attempt > 1 {
                candidate.id = Uuid::new_v4();
            }
            async move { repo.insert_post(candidate).await }
        })
        .await?;

        info!(
            target = "microblog::application::posts",
            post_id = %stored.id,
            sequence = stored.sequence,
            "post created"
        );

        self.fanout.publish(&stored).await;
        Ok(stored)
    }

    async fn get_post(&self, id: Uuid) -> Result<Post, MicroblogError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or_else(|| MicroblogError::not_found("post"))
    }

    #[instrument(skip(self, text))]
    async fn change_post_text(
        &self,
        id: Uuid,
        requester: &UserId,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, MicroblogError> {
        let existing = self.get_post(id).await?;
        if &existing.author_id != requester {
            return Err(MicroblogError::Unauthorized {
                actor: requester.clone(),
                post_id: id,
            });
        }

        let modified_at = modified_at.max(existing.created_at);
        let updated = self
            .posts
            .update_post_text(id, text, modified_at)
            .await
            .map_err(|err| match MicroblogError::from(err) {
                MicroblogError::NotFound { .. } => MicroblogError::not_found("post"),
                other => other,
            })?;

        self.fanout.propagate_edit(&updated).await;
        Ok(updated)
    }

    async fn get_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, MicroblogError> {
        Ok(self.posts.list_post_line(author, page).await?)
    }
}
