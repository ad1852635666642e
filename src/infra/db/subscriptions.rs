use async_trait::async_trait;

use crate::application::repos::{RepoError, SubscriptionsRepo};
use crate::domain::entities::Subscription;
use crate::domain::types::UserId;

use super::PostgresRepositories;
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl SubscriptionsRepo for PostgresRepositories {
    async fn subscription_exists(&self, edge: &Subscription) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions WHERE user_id = $1 AND to_user_id = $2
            )
            "#,
        )
        .bind(edge.user.as_str())
        .bind(edge.to_user.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn insert_subscription(&self, edge: &Subscription) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO subscriptions (user_id, to_user_id) VALUES ($1, $2)")
            .bind(edge.user.as_str())
            .bind(edge.to_user.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_subscriptions(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let targets = sqlx::query_scalar::<_, String>(
            "SELECT to_user_id FROM subscriptions WHERE user_id = $1 ORDER BY to_user_id",
        )
        .bind(user.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(targets.into_iter().map(UserId::from).collect())
    }

    async fn list_subscribers(&self, user: &UserId) -> Result<Vec<UserId>, RepoError> {
        let sources = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM subscriptions WHERE to_user_id = $1 ORDER BY user_id",
        )
        .bind(user.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(sources.into_iter().map(UserId::from).collect())
    }
}
