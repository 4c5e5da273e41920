//! Cache configuration.
//!
//! Selects the backend, bounds the in-process store and carries the
//! invalidation policy, all from the `[cache]` section of `rostra.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use super::planner::InvalidationPolicy;

const DEFAULT_NAMESPACE: &str = "rostra";
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
const DEFAULT_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

impl CacheBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::Redis => "redis",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve reads through the cache. When off every read hits the store.
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    /// Prefix for keys in shared backends.
    pub namespace: String,
    /// Maximum entries held by the in-process store.
    pub memory_capacity: usize,
    /// Expiry applied when a read does not pick its own.
    pub default_ttl: Duration,
    pub policy: InvalidationPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            redis_url: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            policy: InvalidationPolicy::default(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            namespace: settings.namespace.clone(),
            memory_capacity: settings.memory_capacity.get(),
            default_ttl: Duration::from_secs(settings.default_ttl_seconds.get()),
            policy: InvalidationPolicy {
                invalidate_orphaned_students: settings.invalidate_orphaned_students,
                invalidate_borrowed_books: settings.invalidate_borrowed_books,
            },
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
