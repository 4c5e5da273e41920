//! Cache consumer for executing invalidation plans.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::entities::EntityKind;

use super::events::CacheEvent;
use super::keys::CacheKey;
use super::planner::{InvalidationPlan, InvalidationPolicy};
use super::store::{CacheStore, report_fault};

const METRIC_CACHE_INVALIDATE_MS: &str = "rostra_cache_invalidate_ms";
const METRIC_CACHE_INVALIDATED_KEYS_TOTAL: &str = "rostra_cache_invalidated_keys_total";

/// Turns committed events into deletions against the cache store.
///
/// The consumer:
/// 1. Plans the batch with the configured [`InvalidationPolicy`]
/// 2. Deletes every planned key in one store round trip
/// 3. Swallows store faults after logging them
pub struct CacheConsumer {
    store: Arc<dyn CacheStore>,
    policy: InvalidationPolicy,
}

impl CacheConsumer {
    pub fn new(store: Arc<dyn CacheStore>, policy: InvalidationPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    /// Plan and execute `events`, returning the executed plan.
    #[instrument(skip_all, fields(store = self.store.name()))]
    pub async fn consume(&self, events: Vec<CacheEvent>) -> InvalidationPlan {
        let started_at = Instant::now();
        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|event| event.id).collect();
        let plan = InvalidationPlan::from_events(events, &self.policy);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache invalidation starting"
        );

        if !plan.is_empty() {
            self.execute(&plan).await;
        }

        histogram!(METRIC_CACHE_INVALIDATE_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        plan
    }

    async fn execute(&self, plan: &InvalidationPlan) {
        let keys = plan.wire_keys();
        match self.store.delete(&keys).await {
            Ok(deleted) => {
                counter!(METRIC_CACHE_INVALIDATED_KEYS_TOTAL).increment(keys.len() as u64);
                debug!(planned = keys.len(), deleted, "Cache keys invalidated");
            }
            Err(err) => report_fault(self.store.name(), "delete", &keys.join(","), &err),
        }
    }

    /// Drops every key under `pattern`. Returns how many were removed, zero
    /// when the store faulted.
    pub async fn purge(&self, pattern: &str) -> u64 {
        match self.store.delete_by_prefix(pattern).await {
            Ok(removed) => {
                info!(pattern, removed, "Cache keys purged");
                removed
            }
            Err(err) => {
                report_fault(self.store.name(), "delete_by_prefix", pattern, &err);
                0
            }
        }
    }

    /// Drops every view embedding records of `kind`, or the whole namespace.
    pub async fn purge_scope(&self, kind: Option<EntityKind>) -> u64 {
        let patterns = match kind {
            Some(kind) => CacheKey::flush_patterns(kind),
            None => vec!["*".to_string()],
        };
        join_all(patterns.iter().map(|pattern| self.purge(pattern)))
            .await
            .into_iter()
            .sum()
    }
}
