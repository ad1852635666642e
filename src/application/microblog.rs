//! Entry point the boundary layer talks to.
//!
//! Turns validated boundary input into store calls: assigns post IDs and
//! timestamps, resolves page sizes and tokens, and returns typed results or
//! [`MicroblogError`]s.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::application::error::MicroblogError;
use crate::application::fanout::FanoutEngine;
use crate::application::feed::FeedService;
use crate::application::pagination::{CursorPage, CursorScope, PageLimits};
use crate::application::posts::{PostService, PostStore};
use crate::application::repos::{FeedRepo, PostsRepo, SubscriptionsRepo};
use crate::application::subscriptions::SubscriptionService;
use crate::cache::{CachedPostStore, PostCache};
use crate::domain::entities::{NewPost, Post};
use crate::domain::types::{UserId, now_utc_seconds};

#[derive(Clone)]
pub struct Microblog {
    posts: Arc<dyn PostStore>,
    subscriptions: SubscriptionService,
    feed: FeedService,
    limits: PageLimits,
}

impl Microblog {
    pub fn new(
        posts: Arc<dyn PostStore>,
        subscriptions: SubscriptionService,
        feed: FeedService,
        limits: PageLimits,
    ) -> Self {
        Self {
            posts,
            subscriptions,
            feed,
            limits,
        }
    }

    /// Wire every service over one set of repositories, optionally putting a
    /// post cache in front of the post store.
    pub fn assemble<R>(
        repos: Arc<R>,
        cache: Option<Arc<dyn PostCache>>,
        limits: PageLimits,
    ) -> Self
    where
        R: PostsRepo + SubscriptionsRepo + FeedRepo + 'static,
    {
        let fanout = FanoutEngine::new(repos.clone(), repos.clone(), repos.clone());
        let service = PostService::new(repos.clone(), fanout.clone());
        let posts: Arc<dyn PostStore> = match cache {
            Some(cache) => Arc::new(CachedPostStore::new(service, cache)),
            None => Arc::new(service),
        };

        Self::new(
            posts,
            SubscriptionService::new(repos.clone(), fanout),
            FeedService::new(repos),
            limits,
        )
    }

    #[instrument(skip(self, author, text), fields(author = %author))]
    pub async fn create_post(&self, author: UserId, text: String) -> Result<Post, MicroblogError> {
        let post = NewPost {
            id: Uuid::new_v4(),
            author_id: author,
            text,
            created_at: now_utc_seconds(),
        };
        self.posts.create_post(post).await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, MicroblogError> {
        self.posts.get_post(id).await
    }

    #[instrument(skip(self, text))]
    pub async fn change_post_text(
        &self,
        id: Uuid,
        requester: &UserId,
        text: &str,
    ) -> Result<Post, MicroblogError> {
        self.posts
            .change_post_text(id, requester, text, now_utc_seconds())
            .await
    }

    /// `page_token` empty or absent starts from the newest post; `size`
    /// absent uses the configured default.
    pub async fn get_post_line(
        &self,
        user: &UserId,
        page_token: Option<&str>,
        size: Option<i64>,
    ) -> Result<CursorPage<Post>, MicroblogError> {
        let page = self
            .limits
            .request(CursorScope::PostLine, user, page_token, size)?;
        self.posts.get_post_line(user, page).await
    }

    #[instrument(skip(self))]
    pub async fn subscribe(&self, user: &UserId, to_user: &UserId) -> Result<(), MicroblogError> {
        self.subscriptions.subscribe(user, to_user).await
    }

    pub async fn get_subscriptions(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<UserId>, MicroblogError> {
        self.subscriptions.subscriptions_of(user).await
    }

    pub async fn get_subscribers(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<UserId>, MicroblogError> {
        self.subscriptions.subscribers_of(user).await
    }

    pub async fn get_feed(
        &self,
        user: &UserId,
        page_token: Option<&str>,
        size: Option<i64>,
    ) -> Result<CursorPage<Post>, MicroblogError> {
        let page = self
            .limits
            .request(CursorScope::Feed, user, page_token, size)?;
        self.feed.feed_page(user, page).await
    }
}
