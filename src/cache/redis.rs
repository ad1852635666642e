//! Redis-backed post cache, shared between processes.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, Runtime};
use uuid::Uuid;

use crate::domain::entities::Post;

use super::config::CacheConfig;
use super::{CacheError, PostCache};

const KEY_PREFIX: &str = "microblog:post:";

/// KEYS[1] = entry key; ARGV = snapshot JSON, snapshot version, TTL seconds.
/// Leaves a stored snapshot with a higher version untouched.
const PUT_IF_NOT_OLDER: &str = r#"
local stored = redis.call('GET', KEYS[1])
if stored then
  local ok, decoded = pcall(cjson.decode, stored)
  if ok and tonumber(decoded.version) and tonumber(decoded.version) > tonumber(ARGV[2]) then
    return 0
  end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
"#;

pub struct RedisPostCache {
    pool: Pool,
    ttl: Duration,
}

impl RedisPostCache {
    pub fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| CacheError::backend("cache.redis_url is not set"))?;
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(CacheError::backend)?;
        Ok(Self {
            pool,
            ttl: config.ttl(),
        })
    }

    fn key(id: Uuid) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl PostCache for RedisPostCache {
    async fn get(&self, id: Uuid) -> Result<Option<Post>, CacheError> {
        let mut conn = self.pool.get().await.map_err(CacheError::backend)?;
        let raw: Option<String> = conn.get(Self::key(id)).await.map_err(CacheError::backend)?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn put(&self, post: &Post) -> Result<(), CacheError> {
        let json = serde_json::to_string(post)?;
        let mut conn = self.pool.get().await.map_err(CacheError::backend)?;
        let _: i64 = redis::cmd("EVAL")
            .arg(PUT_IF_NOT_OLDER)
            .arg(1)
            .arg(Self::key(post.id))
            .arg(json)
            .arg(post.version)
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn invalidate(&self, id: Uuid) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await.map_err(CacheError::backend)?;
        let _: i64 = conn.del(Self::key(id)).await.map_err(CacheError::backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_post_id() {
        let id = Uuid::nil();
        assert_eq!(
            RedisPostCache::key(id),
            "microblog:post:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn connect_requires_url() {
        let config = CacheConfig {
            redis_url: None,
            ..CacheConfig::default()
        };
        assert!(matches!(
            RedisPostCache::connect(&config),
            Err(CacheError::Backend(_))
        ));
    }
}
