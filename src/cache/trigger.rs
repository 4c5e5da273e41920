//! Cache trigger service.
//!
//! Write paths call into the trigger once the durable store has accepted a
//! change. Each call is planned and executed before it returns, so a caller
//! that responds afterwards never races its own invalidation.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::entities::{BookRecord, StudentRecord, TeacherRecord};

use super::consumer::CacheConsumer;
use super::events::{CacheEvent, EpochCounter, Mutation};
use super::planner::InvalidationPlan;
use super::tally;

/// Publishes committed mutations to the cache consumer.
///
/// # Usage
///
/// ```ignore
/// // After a successful teacher update:
/// trigger.teacher_updated(before, after).await;
/// ```
pub struct CacheTrigger {
    enabled: bool,
    epochs: EpochCounter,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(enabled: bool, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            enabled,
            epochs: EpochCounter::new(),
            consumer,
        }
    }

    /// Invalidate everything `mutation` may have made stale.
    ///
    /// Also called when a multi-step write was abandoned part way, with the
    /// mutation that was attempted; its plan covers every key the committed
    /// steps may have touched.
    ///
    /// Returns the executed plan; empty when caching is disabled.
    pub async fn trigger(&self, mutation: Mutation) -> InvalidationPlan {
        if !self.enabled {
            debug!(
                mutation_kind = mutation.kind().as_str(),
                "Cache trigger skipped: cache disabled"
            );
            return InvalidationPlan::default();
        }

        let event = CacheEvent::new(mutation, self.epochs.next());
        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            mutation_kind = event.mutation.kind().as_str(),
            entity_kind = %event.mutation.entity_kind(),
            entity_id = %event.mutation.entity_id(),
            "Cache mutation published"
        );

        let plan = self.consumer.consume(vec![event]).await;
        tally::record(plan.len());
        plan
    }

    pub async fn teacher_created(&self, after: TeacherRecord) -> InvalidationPlan {
        self.trigger(Mutation::TeacherCreated { after }).await
    }

    pub async fn teacher_updated(
        &self,
        before: TeacherRecord,
        after: TeacherRecord,
    ) -> InvalidationPlan {
        self.trigger(Mutation::TeacherUpdated { before, after }).await
    }

    pub async fn teacher_deleted(
        &self,
        before: TeacherRecord,
        orphaned_students: Vec<uuid::Uuid>,
    ) -> InvalidationPlan {
        self.trigger(Mutation::TeacherDeleted {
            before,
            orphaned_students,
        })
        .await
    }

    pub async fn student_created(&self, after: StudentRecord) -> InvalidationPlan {
        self.trigger(Mutation::StudentCreated { after }).await
    }

    pub async fn student_updated(
        &self,
        before: StudentRecord,
        after: StudentRecord,
    ) -> InvalidationPlan {
        self.trigger(Mutation::StudentUpdated { before, after }).await
    }

    pub async fn student_deleted(
        &self,
        before: StudentRecord,
        released_books: Vec<uuid::Uuid>,
    ) -> InvalidationPlan {
        self.trigger(Mutation::StudentDeleted {
            before,
            released_books,
        })
        .await
    }

    pub async fn book_created(&self, after: BookRecord) -> InvalidationPlan {
        self.trigger(Mutation::BookCreated { after }).await
    }

    pub async fn book_updated(&self, before: BookRecord, after: BookRecord) -> InvalidationPlan {
        self.trigger(Mutation::BookUpdated { before, after }).await
    }

    pub async fn book_deleted(
        &self,
        before: BookRecord,
        borrowers: Vec<StudentRecord>,
    ) -> InvalidationPlan {
        self.trigger(Mutation::BookDeleted { before, borrowers }).await
    }

    pub async fn borrowed(&self, book: BookRecord, student: StudentRecord) -> InvalidationPlan {
        self.trigger(Mutation::Borrowed { book, student }).await
    }

    pub async fn returned(&self, book: BookRecord, student: StudentRecord) -> InvalidationPlan {
        self.trigger(Mutation::Returned { book, student }).await
    }
}
