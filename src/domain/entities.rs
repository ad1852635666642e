//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{FIRST_VERSION, PostVersion, Sequence, UserId};

/// Canonical post record. Identity and authorship are immutable; only the
/// text (and with it `last_modified_at` and `version`) changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub text: String,
    pub author_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified_at: OffsetDateTime,
    pub sequence: Sequence,
    /// Starts at 1 and grows by one with every text change. Copies of the
    /// post (feed entries, cache entries) never replace a higher version.
    pub version: PostVersion,
}

impl Post {
    /// Materialize a post from its creation parameters once the store has
    /// assigned an ordering key.
    pub fn from_new(new: NewPost, sequence: Sequence) -> Self {
        Self {
            id: new.id,
            text: new.text,
            author_id: new.author_id,
            created_at: new.created_at,
            last_modified_at: new.created_at,
            sequence,
            version: FIRST_VERSION,
        }
    }

    /// Whether this snapshot may overwrite a stored copy at `stored` version.
    pub fn supersedes(&self, stored: PostVersion) -> bool {
        self.version >= stored
    }
}

/// A post that has not been stored yet; the ID is pre-assigned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: Uuid,
    pub author_id: UserId,
    pub text: String,
    pub created_at: OffsetDateTime,
}

/// Directed follow edge: `user` receives posts authored by `to_user`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    pub user: UserId,
    pub to_user: UserId,
}

/// Denormalized copy of a post living in one viewer's feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub user: UserId,
    pub post_id: Uuid,
    pub sequence: Sequence,
    pub post: Post,
}

impl FeedEntry {
    pub fn for_viewer(user: UserId, post: Post) -> Self {
        Self {
            user,
            post_id: post.id,
            sequence: post.sequence,
            post,
        }
    }
}
