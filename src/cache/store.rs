//! Cache storage contract and in-process implementations.
//!
//! Adapters report failures as [`CacheError`]; deciding that a fault is a
//! miss rather than a request failure is left to the callers in this module
//! tree (see [`report_fault`]).

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tracing::warn;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_FAULT_TOTAL: &str = "rostra_cache_fault_total";
pub(crate) const METRIC_CACHE_EVICT_TOTAL: &str = "rostra_cache_evict_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Command {
            command,
            message: err.to_string(),
        }
    }
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Removes every listed key and returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError>;

    /// Removes every key matching `pattern`. A trailing `*` matches any
    /// suffix; anything else is an exact key.
    async fn delete_by_prefix(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Backend label for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Logs and counts a swallowed cache fault.
pub(crate) fn report_fault(store: &'static str, op: &'static str, key: &str, error: &CacheError) {
    warn!(
        store,
        op,
        key,
        error = %error,
        "Cache fault treated as a miss"
    );
    counter!(METRIC_CACHE_FAULT_TOTAL, "store" => store, "op" => op).increment(1);
}

struct Entry {
    value: Bytes,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Process-local store: LRU bounded, entries expire on read.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Entries currently held, expired ones included until touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.to_string(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT_TOTAL, "store" => self.name()).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete");
        let removed = keys
            .iter()
            .filter(|key| entries.pop(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn delete_by_prefix(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_by_prefix");
        let matching: Vec<String> = match pattern.strip_suffix('*') {
            Some(prefix) => entries
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, _)| key.clone())
                .collect(),
            None => entries
                .peek(pattern)
                .map(|_| vec![pattern.to_string()])
                .unwrap_or_default(),
        };
        for key in &matching {
            entries.pop(key.as_str());
        }
        Ok(matching.len() as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store used when caching is disabled: every read misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheStore;

#[async_trait]
impl CacheStore for NullCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn delete_by_prefix(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn store(capacity: usize) -> MemoryCacheStore {
        MemoryCacheStore::new(NonZeroUsize::new(capacity).expect("capacity is non-zero"))
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = store(8);

        store
            .set("entity:book:1", Bytes::from_static(b"{}"), HOUR)
            .await
            .unwrap();

        assert_eq!(
            store.get("entity:book:1").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
        assert_eq!(store.get("entity:book:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses_and_are_dropped() {
        let store = store(8);

        store
            .set("collection:book", Bytes::from_static(b"[]"), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(store.get("collection:book").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let store = store(8);

        store
            .set("entity:book:1", Bytes::from_static(b"{}"), Duration::from_secs(u64::MAX))
            .await
            .unwrap();

        assert_eq!(
            store.get("entity:book:1").await.unwrap(),
            Some(Bytes::from_static(b"{}"))
        );
    }

    #[tokio::test]
    async fn lru_eviction_drops_least_recent_key() {
        let store = store(2);

        store.set("a", Bytes::from_static(b"1"), HOUR).await.unwrap();
        store.set("b", Bytes::from_static(b"2"), HOUR).await.unwrap();
        store.get("a").await.unwrap();
        store.set("c", Bytes::from_static(b"3"), HOUR).await.unwrap();

        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_counts_existing_keys_only() {
        let store = store(8);
        store.set("a", Bytes::from_static(b"1"), HOUR).await.unwrap();

        let removed = store
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_prefix_honours_glob_suffix() {
        let store = store(8);
        for key in ["entity:book:1", "entity:book:2", "entity:student:1", "collection:book"] {
            store.set(key, Bytes::from_static(b"x"), HOUR).await.unwrap();
        }

        assert_eq!(store.delete_by_prefix("entity:book:*").await.unwrap(), 2);
        assert_eq!(store.delete_by_prefix("collection:book").await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("entity:student:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn null_store_never_hits() {
        let store = NullCacheStore;
        store.set("a", Bytes::from_static(b"1"), HOUR).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.name(), "null");
    }

    #[tokio::test]
    async fn memory_store_recovers_from_poisoned_lock() {
        let store = store(4);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set("a", Bytes::from_static(b"1"), HOUR).await.unwrap();
        assert!(store.get("a").await.unwrap().is_some());
    }
}
