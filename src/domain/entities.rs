use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// The three entity families the registry stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Teacher,
    Student,
    Book,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Teacher, EntityKind::Student, EntityKind::Book];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Teacher => "teacher",
            EntityKind::Student => "student",
            EntityKind::Book => "book",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub students: BTreeSet<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub grade: String,
    /// Owning teacher. Cleared when the teacher is deleted.
    #[serde(rename = "teacher")]
    pub teacher_id: Option<Uuid>,
    pub books: BTreeSet<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl StudentRecord {
    pub fn holds(&self, book_id: Uuid) -> bool {
        self.books.contains(&book_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: String,
    /// Copies currently on the shelf.
    pub quantity: i32,
    pub borrowed_by: BTreeSet<Uuid>,
    /// Bumped on every write; lending swaps compare against it.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BookRecord {
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_borrowed_by(&self, student_id: Uuid) -> bool {
        self.borrowed_by.contains(&student_id)
    }
}

/// Stock half of a book: the only fields lending is allowed to touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookStock {
    pub quantity: i32,
    pub borrowed_by: BTreeSet<Uuid>,
}

impl From<&BookRecord> for BookStock {
    fn from(book: &BookRecord) -> Self {
        Self {
            quantity: book.quantity,
            borrowed_by: book.borrowed_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_student() -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@school.org".to_string(),
            grade: "10".to_string(),
            teacher_id: Some(Uuid::new_v4()),
            books: BTreeSet::new(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn student_serializes_teacher_reference_as_teacher() {
        let student = sample_student();
        let value = serde_json::to_value(&student).expect("student should serialize");

        assert_eq!(
            value["teacher"],
            serde_json::Value::String(student.teacher_id.unwrap().to_string())
        );
        assert!(value.get("teacherId").is_none());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn student_survives_json_cache_payload() {
        let student = sample_student();
        let bytes = serde_json::to_vec(&student).expect("student should serialize");
        let decoded: StudentRecord = serde_json::from_slice(&bytes).expect("student should decode");

        assert_eq!(decoded, student);
    }

    #[test]
    fn entity_kind_labels_are_lowercase() {
        let labels: Vec<_> = EntityKind::ALL.iter().map(|kind| kind.to_string()).collect();
        assert_eq!(labels, ["teacher", "student", "book"]);
    }
}
