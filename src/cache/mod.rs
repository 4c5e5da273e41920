//! Rostra Cache Layer
//!
//! Cache-aside reads with mutation-driven invalidation:
//!
//! - **Read-through**: services read via [`ReadThrough`], which fills the
//!   store on a miss
//! - **Invalidation**: services report committed writes to [`CacheTrigger`];
//!   the planner derives every stale key from the before/after snapshots and
//!   the consumer deletes them
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `rostra.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! default_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod planner;
mod read_through;
mod redis_store;
mod store;
pub mod tally;
mod trigger;

use std::sync::Arc;

use tracing::info;

pub use config::{CacheBackend, CacheConfig};
pub use consumer::CacheConsumer;
pub use events::{CacheEvent, Epoch, EpochCounter, Mutation, MutationKind};
pub use keys::CacheKey;
pub use planner::{InvalidationPlan, InvalidationPolicy};
pub use read_through::ReadThrough;
pub use redis_store::RedisCacheStore;
pub use store::{CacheError, CacheStore, MemoryCacheStore, NullCacheStore};
pub use trigger::CacheTrigger;

/// Builds the store selected by `config`.
///
/// A disabled cache gets the [`NullCacheStore`] so reads always go to the
/// repositories.
pub async fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    if !config.is_enabled() {
        info!("Cache disabled; reads go straight to the store");
        return Ok(Arc::new(NullCacheStore));
    }

    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config.memory_capacity_non_zero())),
        CacheBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                CacheError::unavailable("cache.redis_url is required for the redis backend")
            })?;
            Arc::new(RedisCacheStore::connect(url, config.namespace.clone()).await?)
        }
    };

    info!(backend = store.name(), "Cache store ready");
    Ok(store)
}
