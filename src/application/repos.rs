//! Repository traits describing persistence adapters.
//!
//! Every lookup returns `Ok(None)` for a missing row; `RepoError` is reserved
//! for the store itself misbehaving or refusing a write.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{BookRecord, BookStock, StudentRecord, TeacherRecord};

#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateTeacherParams {
    pub name: String,
    pub email: String,
    pub subject: String,
}

#[derive(Debug, Clone, Default)]
pub struct TeacherPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateStudentParams {
    pub name: String,
    pub email: String,
    pub grade: String,
    pub teacher_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateBookParams {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub genre: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub teacher_id: Option<Uuid>,
    pub ids: Option<BTreeSet<Uuid>>,
}

impl StudentFilter {
    pub fn by_teacher(teacher_id: Uuid) -> Self {
        Self {
            teacher_id: Some(teacher_id),
            ids: None,
        }
    }

    pub fn by_ids(ids: BTreeSet<Uuid>) -> Self {
        Self {
            teacher_id: None,
            ids: Some(ids),
        }
    }

    pub fn matches(&self, student: &StudentRecord) -> bool {
        let teacher_ok = self
            .teacher_id
            .is_none_or(|teacher_id| student.teacher_id == Some(teacher_id));
        let id_ok = self.ids.as_ref().is_none_or(|ids| ids.contains(&student.id));
        teacher_ok && id_ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub ids: Option<BTreeSet<Uuid>>,
}

impl BookFilter {
    pub fn by_ids(ids: BTreeSet<Uuid>) -> Self {
        Self { ids: Some(ids) }
    }

    pub fn matches(&self, book: &BookRecord) -> bool {
        self.ids.as_ref().is_none_or(|ids| ids.contains(&book.id))
    }
}

/// Result of a versioned stock write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    Applied(BookRecord),
    /// The row moved on since it was read.
    Conflict,
    Missing,
}

#[async_trait]
pub trait TeachersRepo: Send + Sync {
    async fn find_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError>;

    async fn list_teachers(&self) -> Result<Vec<TeacherRecord>, RepoError>;

    async fn create_teacher(&self, params: CreateTeacherParams)
    -> Result<TeacherRecord, RepoError>;

    async fn update_teacher(
        &self,
        id: Uuid,
        patch: TeacherPatch,
    ) -> Result<Option<TeacherRecord>, RepoError>;

    async fn delete_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError>;

    /// Adds `student_id` to the roster; a no-op when already present.
    async fn add_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError>;

    async fn remove_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError>;
}

#[async_trait]
pub trait StudentsRepo: Send + Sync {
    async fn find_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError>;

    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, RepoError>;

    async fn create_student(&self, params: CreateStudentParams)
    -> Result<StudentRecord, RepoError>;

    async fn update_student(
        &self,
        id: Uuid,
        patch: StudentPatch,
    ) -> Result<Option<StudentRecord>, RepoError>;

    async fn delete_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError>;

    /// Unsets the teacher reference on every student of `teacher_id` and
    /// returns the ids that were touched.
    async fn clear_teacher(&self, teacher_id: Uuid) -> Result<Vec<Uuid>, RepoError>;

    async fn add_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError>;

    async fn remove_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError>;

    /// Pulls `book_id` out of every student's book set.
    async fn remove_book_from_all(&self, book_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookRecord>, RepoError>;

    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError>;

    async fn update_book(&self, id: Uuid, patch: BookPatch)
    -> Result<Option<BookRecord>, RepoError>;

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError>;

    /// Writes `stock` only if the stored version still equals
    /// `expected_version`. Applied writes bump the version.
    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: i64,
        stock: BookStock,
    ) -> Result<CasOutcome, RepoError>;

    /// Returns every copy held by `student_id` to stock and drops the student
    /// from the borrower sets. Yields the ids of the books touched.
    async fn release_borrower(&self, student_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}
