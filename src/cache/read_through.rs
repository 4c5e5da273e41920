//! Read-through accessor.
//!
//! Checks the store, falls back to a loader on a miss and populates the store
//! with the loaded value. Cache faults never fail a read.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::store::{CacheStore, report_fault};

const METRIC_CACHE_HIT_TOTAL: &str = "rostra_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "rostra_cache_miss_total";

pub struct ReadThrough {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl ReadThrough {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or runs `loader` once and caches
    /// its result for `ttl` (the configured default when `None`).
    ///
    /// Loader errors are returned untouched and leave the cache alone.
    pub async fn read<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let wire_key = key.to_string();
        let store = self.store.name();

        match self.store.get(&wire_key).await {
            Ok(Some(payload)) => match serde_json::from_slice::<T>(&payload) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT_TOTAL, "kind" => key.relation()).increment(1);
                    debug!(key = %wire_key, store, "Cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        key = %wire_key,
                        store,
                        error = %err,
                        "Discarding undecodable cache payload"
                    );
                }
            },
            Ok(None) => {}
            Err(err) => report_fault(store, "get", &wire_key, &err),
        }

        counter!(METRIC_CACHE_MISS_TOTAL, "kind" => key.relation()).increment(1);
        debug!(key = %wire_key, store, "Cache miss");

        let value = loader().await?;

        match serde_json::to_vec(&value) {
            Ok(payload) => {
                let ttl = ttl.unwrap_or(self.default_ttl);
                if let Err(err) = self.store.set(&wire_key, Bytes::from(payload), ttl).await {
                    report_fault(store, "set", &wire_key, &err);
                }
            }
            Err(err) => {
                warn!(key = %wire_key, error = %err, "Loaded value could not be encoded for caching");
            }
        }

        Ok(value)
    }
}
