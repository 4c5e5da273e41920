//! Cache key derivation.
//!
//! Every cache entry the registry writes is addressed by a [`CacheKey`]. Its
//! `Display` form is the wire key handed to the store, so readers and the
//! invalidation planner can never disagree on spelling.

use std::fmt;

use uuid::Uuid;

use crate::domain::entities::EntityKind;

/// Identifies one cached view.
///
/// Ordering is derived so plans iterate keys deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    /// A single record, `entity:<kind>:<id>`.
    Entity { kind: EntityKind, id: Uuid },
    /// Every record of a kind, `collection:<kind>`.
    Collection(EntityKind),
    /// Student records owned by a teacher, `roster:<teacher id>`.
    Roster(Uuid),
    /// Book records held by a student, `booklist:<student id>`.
    BookList(Uuid),
}

impl CacheKey {
    pub fn entity(kind: EntityKind, id: Uuid) -> Self {
        Self::Entity { kind, id }
    }

    pub fn teacher(id: Uuid) -> Self {
        Self::entity(EntityKind::Teacher, id)
    }

    pub fn student(id: Uuid) -> Self {
        Self::entity(EntityKind::Student, id)
    }

    pub fn book(id: Uuid) -> Self {
        Self::entity(EntityKind::Book, id)
    }

    pub fn collection(kind: EntityKind) -> Self {
        Self::Collection(kind)
    }

    pub fn roster(teacher_id: Uuid) -> Self {
        Self::Roster(teacher_id)
    }

    pub fn book_list(student_id: Uuid) -> Self {
        Self::BookList(student_id)
    }

    /// Metric label for the view family this key belongs to.
    pub fn relation(&self) -> &'static str {
        match self {
            CacheKey::Entity { .. } => "entity",
            CacheKey::Collection(_) => "collection",
            CacheKey::Roster(_) => "roster",
            CacheKey::BookList(_) => "booklist",
        }
    }

    /// Glob matching every entity key of `kind`.
    pub fn prefix_pattern(kind: EntityKind) -> String {
        format!("entity:{kind}:*")
    }

    /// Patterns covering every view that embeds records of `kind`.
    pub fn flush_patterns(kind: EntityKind) -> Vec<String> {
        let mut patterns = vec![
            Self::prefix_pattern(kind),
            Self::collection(kind).to_string(),
        ];
        match kind {
            EntityKind::Teacher => {}
            EntityKind::Student => patterns.push("roster:*".to_string()),
            EntityKind::Book => patterns.push("booklist:*".to_string()),
        }
        patterns
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Entity { kind, id } => write!(f, "entity:{kind}:{id}"),
            CacheKey::Collection(kind) => write!(f, "collection:{kind}"),
            CacheKey::Roster(teacher_id) => write!(f, "roster:{teacher_id}"),
            CacheKey::BookList(student_id) => write!(f, "booklist:{student_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_keys_are_namespaced_by_relation() {
        let id = Uuid::nil();

        assert_eq!(
            CacheKey::teacher(id).to_string(),
            "entity:teacher:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            CacheKey::collection(EntityKind::Book).to_string(),
            "collection:book"
        );
        assert_eq!(
            CacheKey::roster(id).to_string(),
            "roster:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            CacheKey::book_list(id).to_string(),
            "booklist:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn entity_keys_fall_under_their_prefix_pattern() {
        let key = CacheKey::student(Uuid::new_v4()).to_string();
        let pattern = CacheKey::prefix_pattern(EntityKind::Student);
        let prefix = pattern.trim_end_matches('*');

        assert!(key.starts_with(prefix));
        assert!(!CacheKey::book(Uuid::new_v4()).to_string().starts_with(prefix));
    }

    #[test]
    fn flush_patterns_cover_embedding_views() {
        assert_eq!(
            CacheKey::flush_patterns(EntityKind::Book),
            vec![
                "entity:book:*".to_string(),
                "collection:book".to_string(),
                "booklist:*".to_string()
            ]
        );
        assert!(CacheKey::flush_patterns(EntityKind::Student).contains(&"roster:*".to_string()));
    }

    #[test]
    fn relation_labels() {
        let id = Uuid::new_v4();
        assert_eq!(CacheKey::book(id).relation(), "entity");
        assert_eq!(CacheKey::book_list(id).relation(), "booklist");
    }
}
