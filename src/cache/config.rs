//! Cache configuration.
//!
//! Controls the single-post cache placed in front of the post store via the
//! `[cache]` section of `microblog.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_CAPACITY: usize = 10_000;

/// Which store backs the post cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

/// Cache configuration from `microblog.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Put the cache in front of the post store at all.
    pub enabled: bool,
    pub backend: CacheBackendKind,
    /// Lifetime of an entry, counted from its last write.
    pub ttl_seconds: u64,
    /// Maximum posts held by the in-process cache.
    pub capacity: usize,
    /// Connection URL for the Redis backend.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackendKind::Memory,
            ttl_seconds: DEFAULT_TTL_SECONDS,
            capacity: DEFAULT_CAPACITY,
            redis_url: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            ttl_seconds: settings.ttl_seconds.get(),
            capacity: settings.capacity.get() as usize,
            redis_url: settings.redis_url.clone(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.ttl(), Duration::from_secs(3600));
        assert_eq!(config.capacity, 10_000);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            capacity: 0,
            ..CacheConfig::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
