//! In-process repositories.
//!
//! Posts live in an arena keyed by ID with a per-author index of IDs in
//! insertion order. Each logical table has its own lock and every operation
//! takes exactly one of them, so there is no lock ordering to get wrong.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{
    CursorPage, PageRequest, PaginationError, SequenceCursor, collect_page,
};
use crate::application::repos::{FeedRepo, PostsRepo, RepoError, SubscriptionsRepo};
use crate::domain::entities::{FeedEntry, NewPost, Post, Subscription};
use crate::domain::types::{Sequence, UserId};
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct PostTable {
    by_id: HashMap<Uuid, Post>,
    /// Post IDs per author, ascending by sequence.
    lines: HashMap<UserId, Vec<Uuid>>,
}

impl PostTable {
    fn sequence_of(&self, id: &Uuid) -> Sequence {
        self.by_id.get(id).map_or(Sequence::MAX, |post| post.sequence)
    }
}

#[derive(Default)]
struct SubscriptionTable {
    outgoing: HashMap<UserId, BTreeSet<UserId>>,
    incoming: HashMap<UserId, BTreeSet<UserId>>,
}

#[derive(Default)]
struct FeedTable {
    by_viewer: HashMap<UserId, BTreeMap<Sequence, FeedEntry>>,
    viewers_by_post: HashMap<Uuid, HashSet<UserId>>,
}

#[derive(Default)]
pub struct MemoryRepositories {
    last_sequence: AtomicI64,
    posts: RwLock<PostTable>,
    subscriptions: RwLock<SubscriptionTable>,
    feeds: RwLock<FeedTable>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn insert_post(&self, post: NewPost) -> Result<Post, RepoError> {
        let mut table = rw_write(&self.posts, SOURCE, "insert_post");
        if table.by_id.contains_key(&post.id) {
            return Err(RepoError::duplicate("posts_pkey"));
        }

        // Assigned under the table lock so post-lines stay sorted by sequence.
        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = Post::from_new(post, sequence);
        table
            .lines
            .entry(stored.author_id.clone())
            .or_default()
            .push(stored.id);
        table.by_id.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(rw_read(&self.posts, SOURCE, "find_post")
            .by_id
            .get(&id)
            .cloned())
    }

    async fn update_post_text(
        &self,
        id: Uuid,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, RepoError> {
        let mut table = rw_write(&self.posts, SOURCE, "update_post_text");
        let post = table.by_id.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.text = text.to_string();
        post.last_modified_at = modified_at;
        post.version += 1;
        Ok(post.clone())
    }

    async fn list_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError> {
        let table = rw_read(&self.posts, SOURCE, "list_post_line");
        let line = table
            .lines
            .get(author)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let end = match &page.cursor {
            None => line.len(),
            Some(cursor) => line
                .binary_search_by_key(&cursor.sequence(), |id| table.sequence_of(id))
                .map_err(|_| PaginationError::StaleCursor)?,
        };

        let newest_first = line[..end]
            .iter()
            .rev()
            .filter_map(|id| table.by_id.get(id))
            .cloned();
        Ok(collect_page(newest_first, page.limit, |post| {
            SequenceCursor::post_line(author.clone(), post.sequence)
        }))
    }

    async fn list_all_by_author(&self, author: &UserId) -> Result<Vec<Post>, RepoError> {
        let table = rw_read(&self.posts, SOURCE, "list_all_by_author");
        let posts = table
            .lines
            .get(author)
            .into_iter()
            .flatten()
            .filter_map(|id| table.by_id.get(id))
            .cloned()
            .collect();
        Ok(posts)
    }
}

#[async_trait]
impl SubscriptionsRepo for MemoryRepositories {
    async fn subscription_exists(&self, edge: &Subscription) -> Result<bool, RepoError> {
        Ok(rw_read(&self.subscriptions, SOURCE, "subscription_exists")
            .outgoing
            .get(&edge.user)
            .is_some_and(|targets| targets.contains(&edge.to_user)))
    }

    async fn insert_subscription(&self, edge: &Subscription) -> Result<(), RepoError> {
        let mut table = rw_write(&self.subscriptions, SOURCE, "insert_subscription");
        let inserted = table
            .outgoing
            .entry(edge.user.clone())
            .or_default()
            .insert(edge.to_user.clone());
        if !inserted {
            return Err(RepoError::duplicate("subscriptions_pkey"));
        }
        table
            .incoming
            .entry(edge.to_user.clone())
            .or_default()
            .insert(edge.user.clone());
        Ok(())
    }

    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let table = rw_read(&self.subscriptions, SOURCE, "list_subscriptions");
        Ok(table
            .outgoing
            .get(user)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let table = rw_read(&self.subscriptions, SOURCE, "list_subscribers");
        Ok(table
            .incoming
            .get(user)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl FeedRepo for MemoryRepositories {
    async fn upsert_feed_entry(&self, entry: FeedEntry) -> Result<(), RepoError> {
        let mut table = rw_write(&self.feeds, SOURCE, "upsert_feed_entry");
        table
            .viewers_by_post
            .entry(entry.post_id)
            .or_default()
            .insert(entry.user.clone());
        let feed = table.by_viewer.entry(entry.user.clone()).or_default();
        match feed.get_mut(&entry.sequence) {
            Some(stored) if !entry.post.supersedes(stored.post.version) => {}
            Some(stored) => *stored = entry,
            None => {
                feed.insert(entry.sequence, entry);
            }
        }
        Ok(())
    }

    async fn refresh_feed_entries(&self, post: &Post) -> Result<u64, RepoError> {
        let mut table = rw_write(&self.feeds, SOURCE, "refresh_feed_entries");
        let FeedTable {
            by_viewer,
            viewers_by_post,
        } = &mut *table;

        let mut touched = 0;
        for viewer in viewers_by_post.get(&post.id).into_iter().flatten() {
            let entry = by_viewer
                .get_mut(viewer)
                .and_then(|feed| feed.get_mut(&post.sequence));
            if let Some(entry) = entry
                && post.supersedes(entry.post.version)
            {
                entry.post = post.clone();
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError> {
        let table = rw_read(&self.feeds, SOURCE, "list_feed");
        let empty = BTreeMap::new();
        let feed = table.by_viewer.get(user).unwrap_or(&empty);

        let upper = match &page.cursor {
            None => Bound::Unbounded,
            Some(cursor) if feed.contains_key(&cursor.sequence()) => {
                Bound::Excluded(cursor.sequence())
            }
            Some(_) => return Err(PaginationError::StaleCursor.into()),
        };

        let newest_first = feed
            .range((Bound::Unbounded, upper))
            .rev()
            .map(|(_, entry)| entry.post.clone());
        Ok(collect_page(newest_first, page.limit, |post| {
            SequenceCursor::feed(user.clone(), post.sequence)
        }))
    }
}
