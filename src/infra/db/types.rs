use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::Post;
use crate::domain::types::UserId;

/// Post columns as stored in `posts`, and as denormalized into
/// `feed_entries` (selected with `post_id AS id`).
#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) author_id: String,
    pub(crate) text: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) last_modified_at: OffsetDateTime,
    pub(crate) sequence: i64,
    pub(crate) version: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: UserId::from(row.author_id),
            created_at: row.created_at,
            last_modified_at: row.last_modified_at,
            sequence: row.sequence,
            version: row.version,
        }
    }
}
