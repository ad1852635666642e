//! Storage bootstrap.
//!
//! [`Backend::init`] connects the configured store and, for Postgres, applies
//! pending migrations before returning. Holding a `Backend` therefore means the
//! store is ready; [`Backend::health_check`] reports whether it still is.

use std::sync::Arc;

use tracing::info;

use crate::application::microblog::Microblog;
use crate::application::pagination::PageLimits;
use crate::cache::{CacheBackendKind, CacheConfig, MemoryPostCache, PostCache};
use crate::config::{CacheSettings, StorageBackend, StorageSettings};
use crate::infra::db::PostgresRepositories;
use crate::infra::error::InfraError;
use crate::infra::memory::MemoryRepositories;

#[derive(Clone)]
pub enum Backend {
    Memory(Arc<MemoryRepositories>),
    Postgres(Arc<PostgresRepositories>),
}

impl Backend {
    pub async fn init(settings: &StorageSettings) -> Result<Self, InfraError> {
        match settings.backend {
            StorageBackend::Memory => {
                info!(target = "microblog::backend", "using in-memory storage");
                Ok(Self::Memory(Arc::new(MemoryRepositories::new())))
            }
            StorageBackend::Postgres => {
                let url = database_url(settings)?;
                let pool = PostgresRepositories::connect(url, settings.max_connections.get())
                    .await
                    .map_err(|err| InfraError::database(err.to_string()))?;
                PostgresRepositories::run_migrations(&pool)
                    .await
                    .map_err(|err| InfraError::database(err.to_string()))?;
                info!(
                    target = "microblog::backend",
                    max_connections = settings.max_connections.get(),
                    "postgres storage ready"
                );
                Ok(Self::Postgres(Arc::new(PostgresRepositories::new(pool))))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }

    pub async fn health_check(&self) -> Result<(), InfraError> {
        match self {
            Backend::Memory(_) => Ok(()),
            Backend::Postgres(repos) => repos
                .health_check()
                .await
                .map_err(|err| InfraError::database(err.to_string())),
        }
    }

    /// Wire the core services over this backend.
    pub fn microblog(&self, cache: Option<Arc<dyn PostCache>>, limits: PageLimits) -> Microblog {
        match self {
            Backend::Memory(repos) => Microblog::assemble(repos.clone(), cache, limits),
            Backend::Postgres(repos) => Microblog::assemble(repos.clone(), cache, limits),
        }
    }
}

/// Apply pending migrations without starting the service.
pub async fn migrate(settings: &StorageSettings) -> Result<(), InfraError> {
    let url = database_url(settings)?;
    let pool = PostgresRepositories::connect(url, settings.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!(target = "microblog::backend", "migrations applied");
    Ok(())
}

/// Build the post cache selected by `settings`, or `None` when caching is off.
pub fn build_post_cache(
    settings: &CacheSettings,
) -> Result<Option<Arc<dyn PostCache>>, InfraError> {
    let config = CacheConfig::from(settings);
    if !config.enabled {
        return Ok(None);
    }

    let cache: Arc<dyn PostCache> = match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryPostCache::new(&config)),
        CacheBackendKind::Redis => redis_cache(&config)?,
    };
    info!(
        target = "microblog::backend",
        backend = ?config.backend,
        ttl_seconds = config.ttl_seconds,
        "post cache enabled"
    );
    Ok(Some(cache))
}

#[cfg(feature = "redis-cache")]
fn redis_cache(config: &CacheConfig) -> Result<Arc<dyn PostCache>, InfraError> {
    let cache = crate::cache::RedisPostCache::connect(config)
        .map_err(|err| InfraError::cache(err.to_string()))?;
    Ok(Arc::new(cache))
}

#[cfg(not(feature = "redis-cache"))]
fn redis_cache(_config: &CacheConfig) -> Result<Arc<dyn PostCache>, InfraError> {
    Err(InfraError::configuration(
        "the redis cache backend requires the `redis-cache` feature",
    ))
}

fn database_url(settings: &StorageSettings) -> Result<&str, InfraError> {
    settings
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU32, NonZeroU64};

    use super::*;
    use crate::domain::types::UserId;

    fn storage(backend: StorageBackend, url: Option<&str>) -> StorageSettings {
        StorageSettings {
            backend,
            url: url.map(str::to_string),
            max_connections: NonZeroU32::new(2).expect("non-zero"),
        }
    }

    fn cache(enabled: bool, backend: CacheBackendKind) -> CacheSettings {
        CacheSettings {
            enabled,
            backend,
            ttl_seconds: NonZeroU64::new(60).expect("non-zero"),
            capacity: NonZeroU32::new(16).expect("non-zero"),
            redis_url: None,
        }
    }

    #[tokio::test]
    async fn memory_backend_is_ready_immediately() {
        let backend = Backend::init(&storage(StorageBackend::Memory, None))
            .await
            .expect("memory backend");

        assert_eq!(backend.name(), "memory");
        backend.health_check().await.expect("healthy");

        let microblog = backend.microblog(None, PageLimits::default());
        let post = microblog
            .create_post(UserId::from("ab12"), "hello".to_string())
            .await
            .expect("create");
        assert_eq!(microblog.get_post(post.id).await.expect("get"), post);
    }

    #[tokio::test]
    async fn postgres_backend_without_url_is_rejected() {
        let err = Backend::init(&storage(StorageBackend::Postgres, None))
            .await
            .err()
            .expect("missing url");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[test]
    fn disabled_cache_builds_nothing() {
        let built = build_post_cache(&cache(false, CacheBackendKind::Memory)).expect("config");
        assert!(built.is_none());
    }

    #[test]
    fn memory_cache_is_built_when_enabled() {
        let built = build_post_cache(&cache(true, CacheBackendKind::Memory)).expect("config");
        assert!(built.is_some());
    }
}
