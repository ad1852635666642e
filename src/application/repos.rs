//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, PaginationError, SequenceCursor};
use crate::domain::entities::{FeedEntry, NewPost, Post, Subscription};
use crate::domain::types::UserId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        Self::Duplicate {
            constraint: constraint.into(),
        }
    }
}

/// Canonical post storage plus the per-author post-line index.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Insert a post under its pre-assigned ID and append it to the author's
    /// post-line. Reports [`RepoError::Duplicate`] when the ID is taken.
    async fn insert_post(&self, post: NewPost) -> Result<Post, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    async fn update_post_text(
        &self,
        id: Uuid,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, RepoError>;

    /// Page through an author's posts, newest first. The cursor has already
    /// been checked against the author; an unknown cursor position yields
    /// [`PaginationError::StaleCursor`].
    async fn list_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError>;

    /// Every post by `author`, oldest first.
    async fn list_all_by_author(&self, author: &UserId) -> Result<Vec<Post>, RepoError>;
}

#[async_trait]
pub trait SubscriptionsRepo: Send + Sync {
    async fn subscription_exists(&self, edge: &Subscription) -> Result<bool, RepoError>;

    /// Reports [`RepoError::Duplicate`] when the edge already exists.
    async fn insert_subscription(&self, edge: &Subscription) -> Result<(), RepoError>;

    /// Targets of edges whose source is `user`.
    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError>;

    /// Sources of edges whose target is `user`.
    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError>;
}

#[async_trait]
pub trait FeedRepo: Send + Sync {
    /// Store a feed entry keyed by `(user, post_id)`; storing the same pair
    /// again replaces the snapshot.
    async fn upsert_feed_entry(&self, entry: FeedEntry) -> Result<(), RepoError>;

    /// Replace the embedded snapshot of every entry referencing `post.id`.
    /// Returns the number of entries touched.
    async fn refresh_feed_entries(&self, post: &Post) -> Result<u64, RepoError>;

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError>;
}
