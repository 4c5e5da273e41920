//! Mutation descriptors and the events that carry them.
//!
//! A [`Mutation`] is what a write path hands to the cache layer once the
//! durable store has accepted the change. It carries the snapshots the
//! planner needs to find both old and new relationships.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{BookRecord, EntityKind, StudentRecord, TeacherRecord};

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Borrow,
    Return,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::Borrow => "borrow",
            MutationKind::Return => "return",
        }
    }
}

/// A committed write, described by the snapshots around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    TeacherCreated {
        after: TeacherRecord,
    },
    TeacherUpdated {
        before: TeacherRecord,
        after: TeacherRecord,
    },
    /// `orphaned_students` are the students whose teacher reference the
    /// cascade cleared.
    TeacherDeleted {
        before: TeacherRecord,
        orphaned_students: Vec<Uuid>,
    },
    StudentCreated {
        after: StudentRecord,
    },
    StudentUpdated {
        before: StudentRecord,
        after: StudentRecord,
    },
    /// `released_books` are the books the cascade actually handed back to
    /// stock, which may differ from `before.books` if the two sets drifted.
    StudentDeleted {
        before: StudentRecord,
        released_books: Vec<Uuid>,
    },
    BookCreated {
        after: BookRecord,
    },
    BookUpdated {
        before: BookRecord,
        after: BookRecord,
    },
    /// `borrowers` are snapshots taken before the cascade pulled the book
    /// from their sets.
    BookDeleted {
        before: BookRecord,
        borrowers: Vec<StudentRecord>,
    },
    Borrowed {
        book: BookRecord,
        student: StudentRecord,
    },
    Returned {
        book: BookRecord,
        student: StudentRecord,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::TeacherCreated { .. }
            | Mutation::StudentCreated { .. }
            | Mutation::BookCreated { .. } => MutationKind::Create,
            Mutation::TeacherUpdated { .. }
            | Mutation::StudentUpdated { .. }
            | Mutation::BookUpdated { .. } => MutationKind::Update,
            Mutation::TeacherDeleted { .. }
            | Mutation::StudentDeleted { .. }
            | Mutation::BookDeleted { .. } => MutationKind::Delete,
            Mutation::Borrowed { .. } => MutationKind::Borrow,
            Mutation::Returned { .. } => MutationKind::Return,
        }
    }

    /// Entity family the mutation was issued against. Lending mutations are
    /// issued against the book.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Mutation::TeacherCreated { .. }
            | Mutation::TeacherUpdated { .. }
            | Mutation::TeacherDeleted { .. } => EntityKind::Teacher,
            Mutation::StudentCreated { .. }
            | Mutation::StudentUpdated { .. }
            | Mutation::StudentDeleted { .. } => EntityKind::Student,
            Mutation::BookCreated { .. }
            | Mutation::BookUpdated { .. }
            | Mutation::BookDeleted { .. }
            | Mutation::Borrowed { .. }
            | Mutation::Returned { .. } => EntityKind::Book,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match self {
            Mutation::TeacherCreated { after } | Mutation::TeacherUpdated { after, .. } => after.id,
            Mutation::TeacherDeleted { before, .. } => before.id,
            Mutation::StudentCreated { after } | Mutation::StudentUpdated { after, .. } => after.id,
            Mutation::StudentDeleted { before, .. } => before.id,
            Mutation::BookCreated { after } | Mutation::BookUpdated { after, .. } => after.id,
            Mutation::BookDeleted { before, .. } => before.id,
            Mutation::Borrowed { book, .. } | Mutation::Returned { book, .. } => book.id,
        }
    }

    /// Ids of other records the mutation touched, from both snapshots.
    pub fn related_ids(&self) -> BTreeSet<Uuid> {
        let mut related = BTreeSet::new();
        match self {
            Mutation::TeacherCreated { .. } => {}
            Mutation::TeacherUpdated { before, after } => {
                related.extend(before.students.iter().chain(&after.students));
            }
            Mutation::TeacherDeleted {
                before,
                orphaned_students,
            } => {
                related.extend(before.students.iter().chain(orphaned_students));
            }
            Mutation::StudentCreated { after } => related.extend(after.teacher_id),
            Mutation::StudentUpdated { before, after } => {
                related.extend(before.teacher_id.into_iter().chain(after.teacher_id));
                related.extend(before.books.iter().chain(&after.books));
            }
            Mutation::StudentDeleted {
                before,
                released_books,
            } => {
                related.extend(before.teacher_id);
                related.extend(before.books.iter().chain(released_books));
            }
            Mutation::BookCreated { .. } => {}
            Mutation::BookUpdated { before, after } => {
                related.extend(before.borrowed_by.iter().chain(&after.borrowed_by));
            }
            Mutation::BookDeleted { before, borrowers } => {
                related.extend(&before.borrowed_by);
                related.extend(borrowers.iter().map(|student| student.id));
            }
            Mutation::Borrowed { student, .. } | Mutation::Returned { student, .. } => {
                related.insert(student.id);
                related.extend(student.teacher_id);
            }
        }
        related
    }
}

/// A published mutation with identity for log correlation.
///
/// Neither the id, the epoch nor the timestamp influence the planned keys.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub mutation: Mutation,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(mutation: Mutation, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            mutation,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Hands out strictly increasing epochs.
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Epoch {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}
