//! Feed reads over the materialized per-viewer collections.

use std::sync::Arc;

use crate::application::error::MicroblogError;
use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
use crate::application::repos::FeedRepo;
use crate::domain::entities::Post;
use crate::domain::types::UserId;

#[derive(Clone)]
pub struct FeedService {
    feeds: Arc<dyn FeedRepo>,
}

impl FeedService {
    pub fn new(feeds: Arc<dyn FeedRepo>) -> Self {
        Self { feeds }
    }

    /// Newest-first page of `user`'s feed.
    pub async fn feed_page(
        &self,
        user: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, MicroblogError> {
        Ok(self.feeds.list_feed(user, page).await?)
    }
}
