//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::info;

use super::store::{CacheError, CacheStore};

/// Shared cache over a Redis server. Keys are stored as
/// `<namespace>:<key>` so several deployments can share one database.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisCacheStore {
    pub async fn connect(url: &str, namespace: impl Into<String>) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(CacheError::unavailable)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::unavailable)?;
        let namespace = namespace.into();

        info!(namespace = %namespace, "Connected to Redis cache");

        Ok(Self { conn, namespace })
    }

    fn namespaced(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.namespace)
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn
            .get(self.namespaced(key))
            .await
            .map_err(|err| CacheError::command("GET", err))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // SETEX refuses a zero expiry.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.namespaced(key), value.to_vec(), seconds)
            .await
            .map_err(|err| CacheError::command("SETEX", err))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let keys: Vec<String> = keys.iter().map(|key| self.namespaced(key)).collect();
        conn.del(keys)
            .await
            .map_err(|err| CacheError::command("DEL", err))
    }

    async fn delete_by_prefix(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let matching: Vec<String> = conn
            .keys(self.namespaced(pattern))
            .await
            .map_err(|err| CacheError::command("KEYS", err))?;
        if matching.is_empty() {
            return Ok(0);
        }
        conn.del(matching)
            .await
            .map_err(|err| CacheError::command("DEL", err))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
