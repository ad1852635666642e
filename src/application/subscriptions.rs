//! Subscription graph: directed follow edges.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::error::MicroblogError;
use crate::application::fanout::FanoutEngine;
use crate::application::repos::{RepoError, SubscriptionsRepo};
use crate::application::retry::{MAX_INSERT_ATTEMPTS, retry_on_collision};
use crate::domain::entities::Subscription;
use crate::domain::types::UserId;

#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionsRepo>,
    fanout: FanoutEngine,
}

impl SubscriptionService {
    pub fn new(subscriptions: Arc<dyn SubscriptionsRepo>, fanout: FanoutEngine) -> Self {
        Self {
            subscriptions,
            fanout,
        }
    }

    /// Make `user` follow `to_user`. Subscribing twice is a no-op; only the
    /// call that creates the edge backfills the feed.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, user: &UserId, to_user: &UserId) -> Result<(), MicroblogError> {
        let edge = Subscription {
            user: user.clone(),
            to_user: to_user.clone(),
        };
        let repo = &self.subscriptions;
        let edge_ref = &edge;
        let created = retry_on_collision("subscribe", MAX_INSERT_ATTEMPTS, move |_| async move {
            if repo.subscription_exists(edge_ref).await? {
                return Ok(false);
            }
            repo.insert_subscription(edge_ref).await?;
            Ok::<_, RepoError>(true)
        })
        .await?;

        if created {
            info!(
                target = "microblog::application::subscriptions",
                user = %user,
                to_user = %to_user,
                "subscription created"
            );
            self.fanout.backfill(user, to_user).await;
        }
        Ok(())
    }

    pub async fn subscriptions_of(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<UserId>, MicroblogError> {
        let targets = self.subscriptions.list_subscriptions(user).await?;
        Ok(targets.into_iter().collect())
    }

    pub async fn subscribers_of(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<UserId>, MicroblogError> {
        let sources = self.subscriptions.list_subscribers(user).await?;
        Ok(sources.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::application::pagination::PageRequest;
    use crate::application::repos::{FeedRepo, PostsRepo};
    use crate::domain::entities::NewPost;
    use crate::infra::memory::MemoryRepositories;

    fn service(repos: &Arc<MemoryRepositories>) -> SubscriptionService {
        let fanout = FanoutEngine::new(repos.clone(), repos.clone(), repos.clone());
        SubscriptionService::new(repos.clone(), fanout)
    }

    #[tokio::test]
    async fn graph_is_queryable_in_both_directions() {
        let repos = Arc::new(MemoryRepositories::new());
        let service = service(&repos);
        let (a, b, c) = (UserId::new("a1"), UserId::new("b2"), UserId::new("c3"));

        service.subscribe(&b, &a).await.unwrap();
        service.subscribe(&c, &a).await.unwrap();
        service.subscribe(&b, &c).await.unwrap();

        assert_eq!(
            service.subscribers_of(&a).await.unwrap(),
            BTreeSet::from([b.clone(), c.clone()])
        );
        assert_eq!(
            service.subscriptions_of(&b).await.unwrap(),
            BTreeSet::from([a.clone(), c.clone()])
        );
        assert!(service.subscriptions_of(&a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_subscribe_does_not_backfill_again() {
        let repos = Arc::new(MemoryRepositories::new());
        let service = service(&repos);
        let (a, b) = (UserId::new("a1"), UserId::new("b2"));
        let post = repos
            .insert_post(NewPost {
                id: Uuid::new_v4(),
                author_id: a.clone(),
                text: "hello".to_string(),
                created_at: OffsetDateTime::UNIX_EPOCH,
            })
            .await
            .unwrap();

        service.subscribe(&b, &a).await.unwrap();
        repos
            .update_post_text(post.id, "changed behind the feed", OffsetDateTime::UNIX_EPOCH)
            .await
            .unwrap();
        service.subscribe(&b, &a).await.unwrap();

        let feed = repos
            .list_feed(&b, PageRequest::new(10, None))
            .await
            .unwrap()
            .items;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].text, "hello");
        assert_eq!(service.subscribers_of(&a).await.unwrap().len(), 1);
    }
}
