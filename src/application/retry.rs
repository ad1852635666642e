//! Bounded retry for inserts racing on a uniqueness constraint.

use std::future::Future;

use tracing::debug;

use crate::application::error::MicroblogError;
use crate::application::repos::RepoError;

pub const MAX_INSERT_ATTEMPTS: u32 = 5;

/// Run `attempt` until it stops reporting [`RepoError::Duplicate`], at most
/// `max_attempts` times. Each call receives the 1-based attempt number and
/// must re-derive whatever collided (a fresh ID, a fresh existence check).
///
/// Any other error is returned immediately; exhausting the budget yields
/// [`MicroblogError::Collision`].
pub async fn retry_on_collision<T, F, Fut>(
    op: &'static str,
    max_attempts: u32,
    mut attempt: F,
) -> Result<T, MicroblogError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let max_attempts = max_attempts.max(1);
    for current in 1..=max_attempts {
        match attempt(current).await {
            Ok(value) => return Ok(value),
            Err(RepoError::Duplicate { constraint }) => {
                debug!(
                    target = "microblog::application::retry",
                    op,
                    attempt = current,
                    constraint = %constraint,
                    "insert collided; retrying"
                );
            }
            Err(other) => return Err(other.into()),
        }
    }

    Err(MicroblogError::Collision {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::application::error::ErrorKind;

    #[tokio::test]
    async fn succeeds_after_transient_collisions() {
        let calls = AtomicU32::new(0);
        let result = retry_on_collision("test", MAX_INSERT_ATTEMPTS, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(RepoError::duplicate("posts_pkey"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .expect("third attempt succeeds");

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_reports_collision() {
        let calls = AtomicU32::new(0);
        let err = retry_on_collision("test", MAX_INSERT_ATTEMPTS, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RepoError::duplicate("posts_pkey")) }
        })
        .await
        .expect_err("collision surfaces");

        assert_eq!(err.kind(), ErrorKind::Collision);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_INSERT_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_on_collision("test", MAX_INSERT_ATTEMPTS, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RepoError::Timeout) }
        })
        .await
        .expect_err("storage failure surfaces");

        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
