//! In-process repositories.
//!
//! Backs `--ephemeral` runs and the test suites. Each family lives in its own
//! `DashMap`; single-record writes hold the entry's shard lock, which is what
//! makes `compare_and_swap` and the set mutations atomic.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    BookFilter, BookPatch, BooksRepo, CasOutcome, CreateBookParams, CreateStudentParams,
    CreateTeacherParams, RepoError, StudentFilter, StudentPatch, StudentsRepo, TeacherPatch,
    TeachersRepo,
};
use crate::domain::entities::{BookRecord, BookStock, StudentRecord, TeacherRecord};

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    teachers: Arc<DashMap<Uuid, TeacherRecord>>,
    students: Arc<DashMap<Uuid, StudentRecord>>,
    books: Arc<DashMap<Uuid, BookRecord>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

/// Stable listing order: creation time, then id.
fn sorted<T, F>(mut records: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> (OffsetDateTime, Uuid),
{
    records.sort_by_key(|record| key(record));
    records
}

impl InMemoryRepositories {
    fn teacher_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.teachers
            .iter()
            .any(|entry| entry.email == email && Some(entry.id) != except)
    }

    fn student_email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.students
            .iter()
            .any(|entry| entry.email == email && Some(entry.id) != except)
    }

    fn isbn_taken(&self, isbn: &str, except: Option<Uuid>) -> bool {
        self.books
            .iter()
            .any(|entry| entry.isbn == isbn && Some(entry.id) != except)
    }
}

#[async_trait]
impl TeachersRepo for InMemoryRepositories {
    async fn find_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        Ok(self.teachers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_teachers(&self) -> Result<Vec<TeacherRecord>, RepoError> {
        let records = self
            .teachers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(records, |teacher| (teacher.created_at, teacher.id)))
    }

    async fn create_teacher(
        &self,
        params: CreateTeacherParams,
    ) -> Result<TeacherRecord, RepoError> {
        if self.teacher_email_taken(&params.email, None) {
            return Err(duplicate("teachers_email_key"));
        }
        let now = OffsetDateTime::now_utc();
        let teacher = TeacherRecord {
            id: Uuid::new_v4(),
            name: params.name,
            email: params.email,
            subject: params.subject,
            students: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.teachers.insert(teacher.id, teacher.clone());
        Ok(teacher)
    }

    async fn update_teacher(
        &self,
        id: Uuid,
        patch: TeacherPatch,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        if let Some(email) = patch.email.as_deref()
            && self.teacher_email_taken(email, Some(id))
        {
            return Err(duplicate("teachers_email_key"));
        }
        let Some(mut entry) = self.teachers.get_mut(&id) else {
            return Ok(None);
        };
        let teacher = entry.value_mut();
        if let Some(name) = patch.name {
            teacher.name = name;
        }
        if let Some(email) = patch.email {
            teacher.email = email;
        }
        if let Some(subject) = patch.subject {
            teacher.subject = subject;
        }
        teacher.updated_at = OffsetDateTime::now_utc();
        Ok(Some(teacher.clone()))
    }

    async fn delete_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        Ok(self.teachers.remove(&id).map(|(_, teacher)| teacher))
    }

    async fn add_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        Ok(self.teachers.get_mut(&teacher_id).map(|mut entry| {
            let teacher = entry.value_mut();
            if teacher.students.insert(student_id) {
                teacher.updated_at = OffsetDateTime::now_utc();
            }
            teacher.clone()
        }))
    }

    async fn remove_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        Ok(self.teachers.get_mut(&teacher_id).map(|mut entry| {
            let teacher = entry.value_mut();
            if teacher.students.remove(&student_id) {
                teacher.updated_at = OffsetDateTime::now_utc();
            }
            teacher.clone()
        }))
    }
}

#[async_trait]
impl StudentsRepo for InMemoryRepositories {
    async fn find_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        Ok(self.students.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, RepoError> {
        let records = self
            .students
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(records, |student| (student.created_at, student.id)))
    }

    async fn create_student(
        &self,
        params: CreateStudentParams,
    ) -> Result<StudentRecord, RepoError> {
        if self.student_email_taken(&params.email, None) {
            return Err(duplicate("students_email_key"));
        }
        let now = OffsetDateTime::now_utc();
        let student = StudentRecord {
            id: Uuid::new_v4(),
            name: params.name,
            email: params.email,
            grade: params.grade,
            teacher_id: Some(params.teacher_id),
            books: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.students.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update_student(
        &self,
        id: Uuid,
        patch: StudentPatch,
    ) -> Result<Option<StudentRecord>, RepoError> {
        if let Some(email) = patch.email.as_deref()
            && self.student_email_taken(email, Some(id))
        {
            return Err(duplicate("students_email_key"));
        }
        let Some(mut entry) = self.students.get_mut(&id) else {
            return Ok(None);
        };
        let student = entry.value_mut();
        if let Some(name) = patch.name {
            student.name = name;
        }
        if let Some(email) = patch.email {
            student.email = email;
        }
        if let Some(grade) = patch.grade {
            student.grade = grade;
        }
        if let Some(teacher_id) = patch.teacher_id {
            student.teacher_id = Some(teacher_id);
        }
        student.updated_at = OffsetDateTime::now_utc();
        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        Ok(self.students.remove(&id).map(|(_, student)| student))
    }

    async fn clear_teacher(&self, teacher_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut cleared = Vec::new();
        for mut entry in self.students.iter_mut() {
            if entry.teacher_id == Some(teacher_id) {
                entry.teacher_id = None;
                entry.updated_at = now;
                cleared.push(entry.id);
            }
        }
        cleared.sort();
        Ok(cleared)
    }

    async fn add_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        Ok(self.students.get_mut(&student_id).map(|mut entry| {
            let student = entry.value_mut();
            if student.books.insert(book_id) {
                student.updated_at = OffsetDateTime::now_utc();
            }
            student.clone()
        }))
    }

    async fn remove_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        Ok(self.students.get_mut(&student_id).map(|mut entry| {
            let student = entry.value_mut();
            if student.books.remove(&book_id) {
                student.updated_at = OffsetDateTime::now_utc();
            }
            student.clone()
        }))
    }

    async fn remove_book_from_all(&self, book_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut touched = Vec::new();
        for mut entry in self.students.iter_mut() {
            if entry.books.remove(&book_id) {
                entry.updated_at = now;
                touched.push(entry.id);
            }
        }
        touched.sort();
        Ok(touched)
    }
}

#[async_trait]
impl BooksRepo for InMemoryRepositories {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        Ok(self.books.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookRecord>, RepoError> {
        let records = self
            .books
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(sorted(records, |book| (book.created_at, book.id)))
    }

    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        if self.isbn_taken(&params.isbn, None) {
            return Err(duplicate("books_isbn_key"));
        }
        let now = OffsetDateTime::now_utc();
        let book = BookRecord {
            id: Uuid::new_v4(),
            title: params.title,
            author: params.author,
            isbn: params.isbn,
            published_year: params.published_year,
            genre: params.genre,
            quantity: params.quantity,
            borrowed_by: BTreeSet::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(
        &self,
        id: Uuid,
        patch: BookPatch,
    ) -> Result<Option<BookRecord>, RepoError> {
        if let Some(isbn) = patch.isbn.as_deref()
            && self.isbn_taken(isbn, Some(id))
        {
            return Err(duplicate("books_isbn_key"));
        }
        let Some(mut entry) = self.books.get_mut(&id) else {
            return Ok(None);
        };
        let book = entry.value_mut();
        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        if let Some(isbn) = patch.isbn {
            book.isbn = isbn;
        }
        if let Some(published_year) = patch.published_year {
            book.published_year = published_year;
        }
        if let Some(genre) = patch.genre {
            book.genre = genre;
        }
        if let Some(quantity) = patch.quantity {
            book.quantity = quantity;
        }
        book.version += 1;
        book.updated_at = OffsetDateTime::now_utc();
        Ok(Some(book.clone()))
    }

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        Ok(self.books.remove(&id).map(|(_, book)| book))
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: i64,
        stock: BookStock,
    ) -> Result<CasOutcome, RepoError> {
        if stock.quantity < 0 {
            return Err(RepoError::InvalidInput {
                message: "book quantity cannot go negative".to_string(),
            });
        }
        let Some(mut entry) = self.books.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        let book = entry.value_mut();
        if book.version != expected_version {
            return Ok(CasOutcome::Conflict);
        }
        book.quantity = stock.quantity;
        book.borrowed_by = stock.borrowed_by;
        book.version += 1;
        book.updated_at = OffsetDateTime::now_utc();
        Ok(CasOutcome::Applied(book.clone()))
    }

    async fn release_borrower(&self, student_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut released = Vec::new();
        for mut entry in self.books.iter_mut() {
            if entry.borrowed_by.remove(&student_id) {
                entry.quantity += 1;
                entry.version += 1;
                entry.updated_at = now;
                released.push(entry.id);
            }
        }
        released.sort();
        Ok(released)
    }
}
