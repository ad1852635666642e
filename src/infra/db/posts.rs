use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{CursorPage, PageRequest, SequenceCursor};
use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::{NewPost, Post};
use crate::domain::types::UserId;

use super::PostgresRepositories;
use super::types::PostRow;
use crate::infra::db::map_sqlx_error;

const POST_COLUMNS: &str =
    "SELECT id, author_id, text, created_at, last_modified_at, sequence, version";

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn insert_post(&self, post: NewPost) -> Result<Post, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, author_id, text, created_at, last_modified_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, author_id, text, created_at, last_modified_at, sequence, version
            "#,
        )
        .bind(post.id)
        .bind(post.author_id.as_str())
        .bind(&post.text)
        .bind(post.created_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Post::from(row))
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, author_id, text, created_at, last_modified_at, sequence, version
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Post::from))
    }

    async fn update_post_text(
        &self,
        id: Uuid,
        text: &str,
        modified_at: OffsetDateTime,
    ) -> Result<Post, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2,
                last_modified_at = $3,
                version = version + 1
            WHERE id = $1
            RETURNING id, author_id, text, created_at, last_modified_at, sequence, version
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(modified_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Post::from(row))
    }

    async fn list_post_line(
        &self,
        author: &UserId,
        page: PageRequest<SequenceCursor>,
    ) -> Result<CursorPage<Post>, RepoError> {
        self.fetch_sequence_page(
            POST_COLUMNS,
            "posts",
            "author_id",
            author.as_str(),
            page,
            |post| SequenceCursor::post_line(author.clone(), post.sequence),
        )
        .await
    }

    async fn list_all_by_author(&self, author: &UserId) -> Result<Vec<Post>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, author_id, text, created_at, last_modified_at, sequence, version
            FROM posts
            WHERE author_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(author.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Post::from).collect())
    }
}
