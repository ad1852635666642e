//! Write-side feed replication.
//!
//! Every feed is materialized at write time: publishing a post copies it into
//! each current subscriber's feed, subscribing copies the target's history
//! into the new subscriber's feed, and editing a post rewrites every copy.
//! None of these steps is transactional with the write that triggered it;
//! failures are logged and counted, and the primary write stands.
//!
//! Copies only move forward: a snapshot never replaces one with a higher
//! post version, whichever order the writes land in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::error::MicroblogError;
use crate::application::repos::{FeedRepo, PostsRepo, RepoError, SubscriptionsRepo};
use crate::application::retry::{MAX_INSERT_ATTEMPTS, retry_on_collision};
use crate::domain::entities::{FeedEntry, Post};
use crate::domain::types::{PostVersion, UserId};

const TARGET: &str = "microblog::application::fanout";
const FANOUT_CONCURRENCY: usize = 16;

const METRIC_FANOUT_ENTRIES: &str = "microblog_fanout_entries_total";
const METRIC_FANOUT_FAILURES: &str = "microblog_fanout_failures_total";
const METRIC_FANOUT_MS: &str = "microblog_fanout_ms";

/// Outcome of one replication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: u64,
    pub failed: u64,
}

impl FanoutReport {
    fn failed_outright() -> Self {
        Self {
            delivered: 0,
            failed: 1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Clone)]
pub struct FanoutEngine {
    posts: Arc<dyn PostsRepo>,
    subscriptions: Arc<dyn SubscriptionsRepo>,
    feeds: Arc<dyn FeedRepo>,
}

impl FanoutEngine {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        subscriptions: Arc<dyn SubscriptionsRepo>,
        feeds: Arc<dyn FeedRepo>,
    ) -> Self {
        Self {
            posts,
            subscriptions,
            feeds,
        }
    }

    /// Copy a freshly created post into the feed of every current subscriber
    /// of its author.
    pub async fn publish(&self, post: &Post) -> FanoutReport {
        let started_at = Instant::now();
        let subscribers = match self.subscriptions.list_subscribers(&post.author_id).await {
            Ok(subscribers) => subscribers,
            Err(err) => {
                warn!(
                    target = TARGET,
                    post_id = %post.id,
                    author = %post.author_id,
                    error = %err,
                    "failed to load subscribers; post not fanned out"
                );
                return self.finish("publish", started_at, FanoutReport::failed_outright());
            }
        };

        let deliveries = subscribers
            .into_iter()
            .map(|viewer| FeedEntry::for_viewer(viewer, post.clone()));
        let mut report = self.deliver_all(deliveries).await;
        if report.delivered > 0 {
            let current = self
                .posts
                .find_post(post.id)
                .await
                .map(|found| found.into_iter().collect());
            report.failed += self
                .catch_up(&HashMap::from([(post.id, post.version)]), current)
                .await;
        }

        if !report.is_complete() {
            warn!(
                target = TARGET,
                post_id = %post.id,
                author = %post.author_id,
                delivered = report.delivered,
                failed = report.failed,
                "post reached only part of its subscribers"
            );
        }
        self.finish("publish", started_at, report)
    }

    /// Copy every existing post of `to_user` into `user`'s feed, keeping each
    /// post's original ordering key.
    pub async fn backfill(&self, user: &UserId, to_user: &UserId) -> FanoutReport {
        let started_at = Instant::now();
        let history = match self.posts.list_all_by_author(to_user).await {
            Ok(history) => history,
            Err(err) => {
                warn!(
                    target = TARGET,
                    user = %user,
                    to_user = %to_user,
                    error = %err,
                    "failed to load post history; feed not backfilled"
                );
                return self.finish("backfill", started_at, FanoutReport::failed_outright());
            }
        };

        let delivered_versions: HashMap<Uuid, PostVersion> =
            history.iter().map(|post| (post.id, post.version)).collect();
        let deliveries = history
            .into_iter()
            .map(|post| FeedEntry::for_viewer(user.clone(), post));
        let mut report = self.deliver_all(deliveries).await;
        if report.delivered > 0 {
            let current = self.posts.list_all_by_author(to_user).await;
            report.failed += self.catch_up(&delivered_versions, current).await;
        }

        if !report.is_complete() {
            warn!(
                target = TARGET,
                user = %user,
                to_user = %to_user,
                delivered = report.delivered,
                failed = report.failed,
                "feed backfill incomplete"
            );
        }
        self.finish("backfill", started_at, report)
    }

    /// Replace the snapshot held by every feed entry that references `post`.
    pub async fn propagate_edit(&self, post: &Post) -> FanoutReport {
        let started_at = Instant::now();
        let report = match self.feeds.refresh_feed_entries(post).await {
            Ok(touched) => FanoutReport {
                delivered: touched,
                failed: 0,
            },
            Err(err) => {
                warn!(
                    target = TARGET,
                    post_id = %post.id,
                    error = %err,
                    "failed to propagate post edit to feeds"
                );
                FanoutReport::failed_outright()
            }
        };
        self.finish("edit", started_at, report)
    }

    /// Push edits that committed while copies were being written. Such an
    /// edit propagated before the new copies existed, so they still hold the
    /// snapshot read before it. Returns the number of failed refreshes.
    async fn catch_up(
        &self,
        delivered: &HashMap<Uuid, PostVersion>,
        current: Result<Vec<Post>, RepoError>,
    ) -> u64 {
        let current = match current {
            Ok(current) => current,
            Err(err) => {
                warn!(
                    target = TARGET,
                    error = %err,
                    "failed to re-read delivered posts; late edits may be missing from feeds"
                );
                return 1;
            }
        };

        let mut failed = 0;
        for post in current {
            let stale = delivered
                .get(&post.id)
                .is_some_and(|version| post.version > *version);
            if !stale {
                continue;
            }
            debug!(
                target = TARGET,
                post_id = %post.id,
                version = post.version,
                "edit raced fan-out; refreshing copies"
            );
            if let Err(err) = self.feeds.refresh_feed_entries(&post).await {
                warn!(
                    target = TARGET,
                    post_id = %post.id,
                    error = %err,
                    "failed to refresh copies after a racing edit"
                );
                failed += 1;
            }
        }
        failed
    }

    async fn deliver_all(&self, entries: impl Iterator<Item = FeedEntry>) -> FanoutReport {
        let outcomes: Vec<Result<(), MicroblogError>> = stream::iter(entries)
            .map(|entry| self.deliver(entry))
            .buffer_unordered(FANOUT_CONCURRENCY)
            .collect()
            .await;

        outcomes
            .into_iter()
            .fold(FanoutReport::default(), |mut report, outcome| {
                match outcome {
                    Ok(()) => report.delivered += 1,
                    Err(_) => report.failed += 1,
                }
                report
            })
    }

    async fn deliver(&self, entry: FeedEntry) -> Result<(), MicroblogError> {
        let feeds = &self.feeds;
        let pending = &entry;
        retry_on_collision("feed_entry", MAX_INSERT_ATTEMPTS, move |_| {
            feeds.upsert_feed_entry(pending.clone())
        })
        .await
        .inspect_err(|err| {
            warn!(
                target = TARGET,
                viewer = %entry.user,
                post_id = %entry.post_id,
                error = %err,
                "failed to write feed entry"
            );
        })
    }

    fn finish(
        &self,
        mode: &'static str,
        started_at: Instant,
        report: FanoutReport,
    ) -> FanoutReport {
        counter!(METRIC_FANOUT_ENTRIES, "mode" => mode).increment(report.delivered);
        if report.failed > 0 {
            counter!(METRIC_FANOUT_FAILURES, "mode" => mode).increment(report.failed);
        }
        histogram!(METRIC_FANOUT_MS, "mode" => mode)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            target = TARGET,
            mode,
            delivered = report.delivered,
            failed = report.failed,
            "fan-out pass complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
    use crate::domain::entities::{NewPost, Subscription};
    use crate::infra::memory::MemoryRepositories;

    async fn seed_post(repos: &MemoryRepositories, author: &str, text: &str) -> Post {
        repos
            .insert_post(NewPost {
                id: Uuid::new_v4(),
                author_id: UserId::new(author),
                text: text.to_string(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await
            .expect("insert post")
    }

    fn engine(repos: &Arc<MemoryRepositories>) -> FanoutEngine {
        FanoutEngine::new(repos.clone(), repos.clone(), repos.clone())
    }

    async fn feed_of(repos: &MemoryRepositories, user: &str) -> Vec<Post> {
        repos
            .list_feed(&UserId::new(user), PageRequest::new(100, None))
            .await
            .expect("list feed")
            .items
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let repos = Arc::new(MemoryRepositories::new());
        for viewer in ["b1", "c1"] {
            repos
                .insert_subscription(&Subscription {
                    user: UserId::new(viewer),
                    to_user: UserId::new("a1"),
                })
                .await
                .expect("subscribe");
        }
        let post = seed_post(&repos, "a1", "hello").await;

        let report = engine(&repos).publish(&post).await;

        assert_eq!(
            report,
            FanoutReport {
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(feed_of(&repos, "b1").await, vec![post.clone()]);
        assert_eq!(feed_of(&repos, "c1").await, vec![post]);
        assert!(feed_of(&repos, "a1").await.is_empty());
    }

    #[tokio::test]
    async fn backfill_preserves_publish_order() {
        let repos = Arc::new(MemoryRepositories::new());
        let first = seed_post(&repos, "a1", "one").await;
        let other = seed_post(&repos, "z9", "interleaved").await;
        let second = seed_post(&repos, "a1", "two").await;
        repos
            .upsert_feed_entry(FeedEntry::for_viewer(UserId::new("b1"), other.clone()))
            .await
            .expect("seed foreign entry");

        let report = engine(&repos)
            .backfill(&UserId::new("b1"), &UserId::new("a1"))
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(feed_of(&repos, "b1").await, vec![second, other, first]);
    }

    #[tokio::test]
    async fn edit_rewrites_every_copy() {
        let repos = Arc::new(MemoryRepositories::new());
        let post = seed_post(&repos, "a1", "before").await;
        for viewer in ["b1", "c1"] {
            repos
                .upsert_feed_entry(FeedEntry::for_viewer(UserId::new(viewer), post.clone()))
                .await
                .expect("seed entry");
        }
        let edited = repos
            .update_post_text(post.id, "after", OffsetDateTime::UNIX_EPOCH)
            .await
            .expect("update");

        let report = engine(&repos).propagate_edit(&edited).await;

        assert_eq!(report.delivered, 2);
        for viewer in ["b1", "c1"] {
            assert_eq!(feed_of(&repos, viewer).await[0].text, "after");
        }
    }

    #[tokio::test]
    async fn edits_propagated_out_of_order_keep_the_latest_text() {
        let repos = Arc::new(MemoryRepositories::new());
        let post = seed_post(&repos, "a1", "v0").await;
        repos
            .upsert_feed_entry(FeedEntry::for_viewer(UserId::new("b1"), post.clone()))
            .await
            .expect("seed entry");
        let edit_a = repos
            .update_post_text(post.id, "A", OffsetDateTime::UNIX_EPOCH)
            .await
            .expect("edit A");
        let edit_b = repos
            .update_post_text(post.id, "B", OffsetDateTime::UNIX_EPOCH)
            .await
            .expect("edit B");

        let engine = engine(&repos);
        engine.propagate_edit(&edit_b).await;
        let late = engine.propagate_edit(&edit_a).await;

        assert_eq!(late.delivered, 0);
        assert_eq!(feed_of(&repos, "b1").await, vec![edit_b]);
    }

    /// Serves the author's history as read just before an edit committed.
    /// Only the first read races.
    struct EditDuringHistoryRead {
        inner: Arc<MemoryRepositories>,
        edited_text: &'static str,
        raced: AtomicBool,
    }

    #[async_trait]
    impl PostsRepo for EditDuringHistoryRead {
        async fn insert_post(&self, post: NewPost) -> Result<Post, RepoError> {
            self.inner.insert_post(post).await
        }

        async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
            self.inner.find_post(id).await
        }

        async fn update_post_text(
            &self,
            id: Uuid,
            text: &str,
            modified_at: OffsetDateTime,
        ) -> Result<Post, RepoError> {
            self.inner.update_post_text(id, text, modified_at).await
        }

        async fn list_post_line(
            &self,
            author: &UserId,
            page: PageRequest<SequenceCursor>,
        ) -> Result<CursorPage<Post>, RepoError> {
            self.inner.list_post_line(author, page).await
        }

        async fn list_all_by_author(&self, author: &UserId) -> Result<Vec<Post>, RepoError> {
            let history = self.inner.list_all_by_author(author).await?;
            if self.raced.swap(true, Ordering::SeqCst) {
                return Ok(history);
            }
            for post in &history {
                let edited = self
                    .inner
                    .update_post_text(post.id, self.edited_text, OffsetDateTime::UNIX_EPOCH)
                    .await?;
                // The viewer has no copy yet, so this touches nothing.
                self.inner.refresh_feed_entries(&edited).await?;
            }
            Ok(history)
        }
    }

    #[tokio::test]
    async fn backfill_racing_an_edit_ends_on_the_edited_text() {
        let repos = Arc::new(MemoryRepositories::new());
        let post = seed_post(&repos, "a1", "v0").await;
        let posts = Arc::new(EditDuringHistoryRead {
            inner: repos.clone(),
            edited_text: "new",
            raced: AtomicBool::new(false),
        });
        let engine = FanoutEngine::new(posts, repos.clone(), repos.clone());

        let report = engine
            .backfill(&UserId::new("b1"), &UserId::new("a1"))
            .await;

        assert!(report.is_complete());
        let canonical = repos
            .find_post(post.id)
            .await
            .expect("find")
            .expect("post exists");
        assert_eq!(canonical.text, "new");
        assert_eq!(feed_of(&repos, "b1").await, vec![canonical]);
    }

    #[tokio::test]
    async fn publish_of_a_snapshot_edited_meanwhile_ends_on_the_edited_text() {
        let repos = Arc::new(MemoryRepositories::new());
        repos
            .insert_subscription(&Subscription {
                user: UserId::new("b1"),
                to_user: UserId::new("a1"),
            })
            .await
            .expect("subscribe");
        let created = seed_post(&repos, "a1", "v0").await;
        let edited = repos
            .update_post_text(created.id, "v1", OffsetDateTime::UNIX_EPOCH)
            .await
            .expect("edit");
        engine(&repos).propagate_edit(&edited).await;

        let report = engine(&repos).publish(&created).await;

        assert!(report.is_complete());
        assert_eq!(feed_of(&repos, "b1").await, vec![edited]);
    }

    struct BrokenFeeds;

    #[async_trait]
    impl FeedRepo for BrokenFeeds {
        async fn upsert_feed_entry(&self, _entry: FeedEntry) -> Result<(), RepoError> {
            Err(RepoError::from_persistence("feeds offline"))
        }

        async fn refresh_feed_entries(&self, _post: &Post) -> Result<u64, RepoError> {
            Err(RepoError::from_persistence("feeds offline"))
        }

        async fn list_feed(
            &self,
            _user: &UserId,
            _page: PageRequest<SequenceCursor>,
        ) -> Result<CursorPage<Post>, RepoError> {
            Err(RepoError::from_persistence("feeds offline"))
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_not_raised() {
        let repos = Arc::new(MemoryRepositories::new());
        repos
            .insert_subscription(&Subscription {
                user: UserId::new("b1"),
                to_user: UserId::new("a1"),
            })
            .await
            .expect("subscribe");
        let post = seed_post(&repos, "a1", "hello").await;
        let engine = FanoutEngine::new(repos.clone(), repos.clone(), Arc::new(BrokenFeeds));

        let report = engine.publish(&post).await;
        assert_eq!(
            report,
            FanoutReport {
                delivered: 0,
                failed: 1
            }
        );

        let report = engine.propagate_edit(&post).await;
        assert!(!report.is_complete());
    }
}
