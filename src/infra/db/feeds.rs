use async_trait::async_trait;

use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
use crate::application::repos::{FeedRepo, RepoError};
use crate::domain::entities::{FeedEntry, Post};
use crate::domain::types::UserId;

use super::PostgresRepositories;
use crate::infra::db::map_sqlx_error;

const FEED_COLUMNS: &str =
    "SELECT post_id AS id, author_id, text, created_at, last_modified_at, sequence, version";

#[async_trait]
impl FeedRepo for PostgresRepositories {
    async fn upsert_feed_entry(&self, entry: FeedEntry) -> Result<(), RepoError> {
        let FeedEntry {
            user,
            post_id,
            sequence,
            post,
        } = entry;

        sqlx::query(
            r#"
            INSERT INTO feed_entries (
                user_id, post_id, sequence, author_id, text, created_at, last_modified_at,
                version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, post_id) DO UPDATE
            SET text = EXCLUDED.text,
                last_modified_at = EXCLUDED.last_modified_at,
                version = EXCLUDED.version
            WHERE feed_entries.version <= EXCLUDED.version
            "#,
        )
        .bind(user.as_str())
        .bind(post_id)
        .bind(sequence)
        .bind(post.author_id.as_str())
        .bind(&post.text)
        .bind(post.created_at)
        .bind(post.last_modified_at)
        .bind(post.version)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn refresh_feed_entries(&self, post: &Post) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE feed_entries
            SET text = $2,
                last_modified_at = $3,
                version = $4
            WHERE post_id = $1
              AND version <= $4
            "#,
        )
        .bind(post.id)
        .bind(&post.text)
        .bind(post.last_modified_at)
        .bind(post.version)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn list_feed(
        &self,
        user: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError> {
        self.fetch_sequence_page(
            FEED_COLUMNS,
            "feed_entries",
            "user_id",
            user.as_str(),
            page,
            |post| SequenceCursor::feed(user.clone(), post.sequence),
        )
        .await
    }
}
