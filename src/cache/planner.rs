//! Invalidation planning.
//!
//! Turns committed mutations into the exact set of cache keys that may now
//! hold stale derived state. Planning is pure: the same snapshots always
//! yield the same keys.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use uuid::Uuid;

use crate::domain::entities::{EntityKind, StudentRecord};

use super::events::{CacheEvent, Mutation};
use super::keys::CacheKey;

/// Policy switches for cascades the store applies silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPolicy {
    /// Purge each orphaned student when their teacher is deleted.
    pub invalidate_orphaned_students: bool,
    /// Purge each book a deleted student still held.
    pub invalidate_borrowed_books: bool,
}

impl Default for InvalidationPolicy {
    fn default() -> Self {
        Self {
            invalidate_orphaned_students: true,
            invalidate_borrowed_books: true,
        }
    }
}

/// Keys to delete for cache consistency.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    keys: BTreeSet<CacheKey>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvalidationPlan {{ keys: {} }}", self.keys.len())
    }
}

impl InvalidationPlan {
    /// Plan a single mutation.
    pub fn for_mutation(mutation: &Mutation, policy: &InvalidationPolicy) -> Self {
        let mut plan = Self::default();
        plan.add_mutation(mutation, policy);
        plan
    }

    /// Union the plans of a batch, ignoring events seen twice.
    pub fn from_events(events: Vec<CacheEvent>, policy: &InvalidationPolicy) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.iter().filter(|event| seen_ids.insert(event.id)) {
            plan.add_mutation(&event.mutation, policy);
        }

        plan
    }

    pub fn keys(&self) -> &BTreeSet<CacheKey> {
        &self.keys
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Wire form of every key, in plan order.
    pub fn wire_keys(&self) -> Vec<String> {
        self.keys.iter().map(ToString::to_string).collect()
    }

    fn insert(&mut self, key: CacheKey) {
        self.keys.insert(key);
    }

    fn add_mutation(&mut self, mutation: &Mutation, policy: &InvalidationPolicy) {
        match mutation {
            Mutation::TeacherCreated { .. } => {
                self.insert(CacheKey::collection(EntityKind::Teacher));
            }
            Mutation::TeacherUpdated { after, .. } => {
                self.insert(CacheKey::teacher(after.id));
                self.insert(CacheKey::collection(EntityKind::Teacher));
                self.insert(CacheKey::roster(after.id));
            }
            Mutation::TeacherDeleted {
                before,
                orphaned_students,
            } => {
                self.insert(CacheKey::teacher(before.id));
                self.insert(CacheKey::collection(EntityKind::Teacher));
                self.insert(CacheKey::roster(before.id));

                if policy.invalidate_orphaned_students {
                    let orphans: BTreeSet<Uuid> = before
                        .students
                        .iter()
                        .chain(orphaned_students)
                        .copied()
                        .collect();
                    if !orphans.is_empty() {
                        self.insert(CacheKey::collection(EntityKind::Student));
                    }
                    for student_id in orphans {
                        self.insert(CacheKey::student(student_id));
                    }
                }
            }
            Mutation::StudentCreated { after } => {
                self.insert(CacheKey::collection(EntityKind::Student));
                if let Some(teacher_id) = after.teacher_id {
                    self.insert(CacheKey::teacher(teacher_id));
                    self.insert(CacheKey::roster(teacher_id));
                }
            }
            Mutation::StudentUpdated { before, after } => {
                self.insert(CacheKey::student(after.id));
                self.insert(CacheKey::collection(EntityKind::Student));
                self.insert(CacheKey::book_list(after.id));

                if before.teacher_id == after.teacher_id {
                    // Roster entries embed the student record itself.
                    if let Some(teacher_id) = after.teacher_id {
                        self.insert(CacheKey::roster(teacher_id));
                    }
                } else {
                    for teacher_id in before.teacher_id.into_iter().chain(after.teacher_id) {
                        self.insert(CacheKey::teacher(teacher_id));
                        self.insert(CacheKey::roster(teacher_id));
                    }
                }
            }
            Mutation::StudentDeleted {
                before,
                released_books,
            } => {
                self.insert(CacheKey::student(before.id));
                self.insert(CacheKey::collection(EntityKind::Student));
                self.insert(CacheKey::book_list(before.id));
                if let Some(teacher_id) = before.teacher_id {
                    self.insert(CacheKey::teacher(teacher_id));
                    self.insert(CacheKey::roster(teacher_id));
                }

                // Released copies were written; held ones are inferred.
                let mut books: BTreeSet<Uuid> = released_books.iter().copied().collect();
                if policy.invalidate_borrowed_books {
                    books.extend(&before.books);
                }
                if !books.is_empty() {
                    self.insert(CacheKey::collection(EntityKind::Book));
                }
                for book_id in books {
                    self.insert(CacheKey::book(book_id));
                }
            }
            Mutation::BookCreated { after } => {
                self.insert(CacheKey::book(after.id));
                self.insert(CacheKey::collection(EntityKind::Book));
            }
            Mutation::BookUpdated { before, after } => {
                self.insert(CacheKey::book(after.id));
                self.insert(CacheKey::collection(EntityKind::Book));
                for student_id in before.borrowed_by.iter().chain(&after.borrowed_by) {
                    self.insert(CacheKey::book_list(*student_id));
                }
            }
            Mutation::BookDeleted { before, borrowers } => {
                self.insert(CacheKey::book(before.id));
                self.insert(CacheKey::collection(EntityKind::Book));
                for student_id in &before.borrowed_by {
                    self.insert(CacheKey::book_list(*student_id));
                    self.insert(CacheKey::student(*student_id));
                }
                for student in borrowers {
                    self.add_student_views(student);
                }
            }
            Mutation::Borrowed { book, student } | Mutation::Returned { book, student } => {
                self.insert(CacheKey::book(book.id));
                self.insert(CacheKey::collection(EntityKind::Book));
                self.add_student_views(student);
            }
        }
    }

    /// Every view that embeds `student`'s record or book set.
    fn add_student_views(&mut self, student: &StudentRecord) {
        self.insert(CacheKey::student(student.id));
        self.insert(CacheKey::book_list(student.id));
        self.insert(CacheKey::collection(EntityKind::Student));
        if let Some(teacher_id) = student.teacher_id {
            self.insert(CacheKey::roster(teacher_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::entities::{BookRecord, TeacherRecord};

    fn teacher(students: &[Uuid]) -> TeacherRecord {
        TeacherRecord {
            id: Uuid::new_v4(),
            name: "Grace".to_string(),
            email: "grace@school.org".to_string(),
            subject: "Math".to_string(),
            students: students.iter().copied().collect(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn student(teacher_id: Option<Uuid>, books: &[Uuid]) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@school.org".to_string(),
            grade: "10".to_string(),
            teacher_id,
            books: books.iter().copied().collect(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn book(borrowed_by: &[Uuid]) -> BookRecord {
        BookRecord {
            id: Uuid::new_v4(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            published_year: 1965,
            genre: "Science Fiction".to_string(),
            quantity: 2,
            borrowed_by: borrowed_by.iter().copied().collect(),
            version: 0,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn plan(mutation: &Mutation) -> BTreeSet<CacheKey> {
        InvalidationPlan::for_mutation(mutation, &InvalidationPolicy::default())
            .keys()
            .clone()
    }

    #[test]
    fn creating_a_teacher_only_touches_the_collection() {
        let keys = plan(&Mutation::TeacherCreated {
            after: teacher(&[]),
        });

        assert_eq!(keys, BTreeSet::from([CacheKey::collection(EntityKind::Teacher)]));
    }

    #[test]
    fn teacher_update_purges_entity_collection_and_roster() {
        let before = teacher(&[]);
        let mut after = before.clone();
        after.subject = "Physics".to_string();

        let keys = plan(&Mutation::TeacherUpdated {
            before: before.clone(),
            after,
        });

        assert_eq!(
            keys,
            BTreeSet::from([
                CacheKey::teacher(before.id),
                CacheKey::collection(EntityKind::Teacher),
                CacheKey::roster(before.id),
            ])
        );
    }

    #[test]
    fn student_creation_refreshes_the_owning_teacher() {
        let teacher_id = Uuid::new_v4();
        let keys = plan(&Mutation::StudentCreated {
            after: student(Some(teacher_id), &[]),
        });

        assert_eq!(
            keys,
            BTreeSet::from([
                CacheKey::collection(EntityKind::Student),
                CacheKey::teacher(teacher_id),
                CacheKey::roster(teacher_id),
            ])
        );
    }

    #[test]
    fn teacher_change_purges_old_and_new_sides() {
        let old_teacher = Uuid::new_v4();
        let new_teacher = Uuid::new_v4();
        let before = student(Some(old_teacher), &[]);
        let mut after = before.clone();
        after.teacher_id = Some(new_teacher);

        let keys = plan(&Mutation::StudentUpdated {
            before: before.clone(),
            after,
        });

        for expected in [
            CacheKey::student(before.id),
            CacheKey::collection(EntityKind::Student),
            CacheKey::teacher(old_teacher),
            CacheKey::roster(old_teacher),
            CacheKey::teacher(new_teacher),
            CacheKey::roster(new_teacher),
        ] {
            assert!(keys.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn unchanged_teacher_keeps_teacher_entity_cached() {
        let teacher_id = Uuid::new_v4();
        let before = student(Some(teacher_id), &[]);
        let mut after = before.clone();
        after.grade = "11".to_string();

        let keys = plan(&Mutation::StudentUpdated {
            before: before.clone(),
            after,
        });

        assert!(!keys.contains(&CacheKey::teacher(teacher_id)));
        assert!(keys.contains(&CacheKey::roster(teacher_id)));
        assert!(keys.contains(&CacheKey::student(before.id)));
    }

    #[test]
    fn teacher_change_is_read_from_snapshots_not_requests() {
        let teacher_id = Uuid::new_v4();
        let before = student(Some(teacher_id), &[]);
        let after = before.clone();

        let keys = plan(&Mutation::StudentUpdated { before, after });

        assert!(!keys.contains(&CacheKey::teacher(teacher_id)));
    }

    #[test]
    fn teacher_deletion_purges_orphans_under_default_policy() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let before = teacher(&[first]);
        let mutation = Mutation::TeacherDeleted {
            before: before.clone(),
            orphaned_students: vec![first, second],
        };

        let keys = plan(&mutation);

        for expected in [
            CacheKey::teacher(before.id),
            CacheKey::collection(EntityKind::Teacher),
            CacheKey::roster(before.id),
            CacheKey::student(first),
            CacheKey::student(second),
            CacheKey::collection(EntityKind::Student),
        ] {
            assert!(keys.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn teacher_deletion_can_leave_orphans_to_ttl() {
        let orphan = Uuid::new_v4();
        let before = teacher(&[orphan]);
        let policy = InvalidationPolicy {
            invalidate_orphaned_students: false,
            ..InvalidationPolicy::default()
        };

        let plan = InvalidationPlan::for_mutation(
            &Mutation::TeacherDeleted {
                before,
                orphaned_students: vec![orphan],
            },
            &policy,
        );

        assert_eq!(plan.len(), 3);
        assert!(!plan.contains(&CacheKey::student(orphan)));
    }

    #[test]
    fn student_deletion_purges_teacher_and_held_books() {
        let teacher_id = Uuid::new_v4();
        let book_id = Uuid::new_v4();
        let before = student(Some(teacher_id), &[book_id]);

        let keys = plan(&Mutation::StudentDeleted {
            before: before.clone(),
            released_books: vec![book_id],
        });

        assert_eq!(
            keys,
            BTreeSet::from([
                CacheKey::student(before.id),
                CacheKey::collection(EntityKind::Student),
                CacheKey::book_list(before.id),
                CacheKey::teacher(teacher_id),
                CacheKey::roster(teacher_id),
                CacheKey::book(book_id),
                CacheKey::collection(EntityKind::Book),
            ])
        );
    }

    #[test]
    fn student_deletion_policy_can_skip_books() {
        let book_id = Uuid::new_v4();
        let policy = InvalidationPolicy {
            invalidate_borrowed_books: false,
            ..InvalidationPolicy::default()
        };

        let plan = InvalidationPlan::for_mutation(
            &Mutation::StudentDeleted {
                before: student(None, &[book_id]),
                released_books: Vec::new(),
            },
            &policy,
        );

        assert!(!plan.contains(&CacheKey::book(book_id)));
        assert!(!plan.contains(&CacheKey::collection(EntityKind::Book)));
    }

    #[test]
    fn student_deletion_purges_released_books_missing_from_its_set() {
        let held = Uuid::new_v4();
        let drifted = Uuid::new_v4();
        let policy = InvalidationPolicy {
            invalidate_borrowed_books: false,
            ..InvalidationPolicy::default()
        };

        let plan = InvalidationPlan::for_mutation(
            &Mutation::StudentDeleted {
                before: student(None, &[held]),
                released_books: vec![drifted],
            },
            &policy,
        );

        assert!(plan.contains(&CacheKey::book(drifted)));
        assert!(plan.contains(&CacheKey::collection(EntityKind::Book)));
        assert!(!plan.contains(&CacheKey::book(held)));
    }

    #[test]
    fn book_update_purges_every_borrower_book_list() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let before = book(&[first]);
        let mut after = before.clone();
        after.borrowed_by.insert(second);

        let keys = plan(&Mutation::BookUpdated {
            before: before.clone(),
            after,
        });

        assert_eq!(
            keys,
            BTreeSet::from([
                CacheKey::book(before.id),
                CacheKey::collection(EntityKind::Book),
                CacheKey::book_list(first),
                CacheKey::book_list(second),
            ])
        );
    }

    #[test]
    fn book_deletion_reaches_borrowers_and_their_rosters() {
        let teacher_id = Uuid::new_v4();
        let mut borrower = student(Some(teacher_id), &[]);
        let before = book(&[borrower.id]);
        borrower.books.insert(before.id);

        let keys = plan(&Mutation::BookDeleted {
            before: before.clone(),
            borrowers: vec![borrower.clone()],
        });

        for expected in [
            CacheKey::book(before.id),
            CacheKey::collection(EntityKind::Book),
            CacheKey::book_list(borrower.id),
            CacheKey::student(borrower.id),
            CacheKey::roster(teacher_id),
        ] {
            assert!(keys.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn borrow_and_return_share_a_key_set() {
        let teacher_id = Uuid::new_v4();
        let student = student(Some(teacher_id), &[]);
        let book = book(&[student.id]);

        let borrowed = plan(&Mutation::Borrowed {
            book: book.clone(),
            student: student.clone(),
        });
        let returned = plan(&Mutation::Returned {
            book: book.clone(),
            student: student.clone(),
        });

        assert_eq!(borrowed, returned);
        for expected in [
            CacheKey::book(book.id),
            CacheKey::student(student.id),
            CacheKey::book_list(student.id),
            CacheKey::collection(EntityKind::Book),
        ] {
            assert!(borrowed.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn planning_is_deterministic() {
        let before = student(Some(Uuid::new_v4()), &[Uuid::new_v4(), Uuid::new_v4()]);
        let released_books = before.books.iter().copied().collect();
        let mutation = Mutation::StudentDeleted {
            before,
            released_books,
        };
        let policy = InvalidationPolicy::default();

        let first = InvalidationPlan::for_mutation(&mutation, &policy);
        let second = InvalidationPlan::for_mutation(&mutation, &policy);

        assert_eq!(first, second);
        assert_eq!(first.wire_keys(), second.wire_keys());
    }

    #[test]
    fn duplicate_events_are_planned_once() {
        let event = CacheEvent::new(
            Mutation::TeacherCreated {
                after: teacher(&[]),
            },
            0,
        );
        let other = CacheEvent::new(
            Mutation::BookCreated {
                after: book(&[]),
            },
            1,
        );

        let plan = InvalidationPlan::from_events(
            vec![event.clone(), event, other],
            &InvalidationPolicy::default(),
        );

        assert!(plan.contains(&CacheKey::collection(EntityKind::Teacher)));
        assert!(plan.contains(&CacheKey::collection(EntityKind::Book)));
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.to_string(), "InvalidationPlan { keys: 3 }");
    }
}
