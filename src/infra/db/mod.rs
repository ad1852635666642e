//! Postgres-backed repository implementations.

mod feeds;
mod posts;
mod subscriptions;
mod types;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::pagination::{
    CursorPage, PageRequest, PaginationError, SequenceCursor, collect_page,
};
use crate::application::repos::RepoError;
use crate::domain::entities::Post;

use types::PostRow;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Run a newest-first page query over `table` restricted to
    /// `owner_column = owner`. `select` must yield [`PostRow`] columns.
    ///
    /// A cursor must name a row of the same sequence, otherwise the page is
    /// rejected as stale.
    async fn fetch_sequence_page(
        &self,
        select: &'static str,
        table: &'static str,
        owner_column: &'static str,
        owner: &str,
        page: PageRequest<SequenceCursor>,
        cursor_for: impl Fn(&Post) -> SequenceCursor,
    ) -> Result<CursorPage<Post>, RepoError> {
        if let Some(cursor) = &page.cursor {
            let mut exists = QueryBuilder::<Postgres>::new("SELECT EXISTS (SELECT 1 FROM ");
            exists.push(table);
            exists.push(" WHERE ");
            exists.push(owner_column);
            exists.push(" = ");
            exists.push_bind(owner);
            exists.push(" AND sequence = ");
            exists.push_bind(cursor.sequence());
            exists.push(")");

            let found: bool = exists
                .build_query_scalar()
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;
            if !found {
                return Err(PaginationError::StaleCursor.into());
            }
        }

        if page.limit == 0 {
            return Ok(CursorPage::empty());
        }

        let mut qb = QueryBuilder::<Postgres>::new(select);
        qb.push(" FROM ");
        qb.push(table);
        qb.push(" WHERE ");
        qb.push(owner_column);
        qb.push(" = ");
        qb.push_bind(owner);
        if let Some(cursor) = &page.cursor {
            qb.push(" AND sequence < ");
            qb.push_bind(cursor.sequence());
        }
        qb.push(" ORDER BY sequence DESC LIMIT ");
        qb.push_bind(i64::from(page.limit) + 1);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(collect_page(
            rows.into_iter().map(Post::from),
            page.limit,
            cursor_for,
        ))
    }
}
