//! Repositories that fail chosen writes on demand.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use rostra::application::repos::{
    BookFilter, BookPatch, BooksRepo, CasOutcome, CreateBookParams, CreateStudentParams,
    CreateTeacherParams, RepoError, StudentFilter, StudentPatch, StudentsRepo, TeacherPatch,
    TeachersRepo,
};
use rostra::domain::entities::{BookRecord, BookStock, StudentRecord, TeacherRecord};
use rostra::infra::memory::InMemoryRepositories;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    AddStudent,
    /// Roster removals from this teacher only.
    RemoveStudentFrom(Uuid),
    DeleteStudent,
    DeleteTeacher,
    DeleteBook,
    ReleaseBorrower,
}

pub struct FaultyRepos {
    inner: Arc<InMemoryRepositories>,
    faults: DashSet<Fault>,
}

impl FaultyRepos {
    pub fn new(inner: Arc<InMemoryRepositories>) -> Self {
        Self {
            inner,
            faults: DashSet::new(),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.insert(fault);
    }

    fn check(&self, fault: Fault) -> Result<(), RepoError> {
        if self.faults.contains(&fault) {
            Err(RepoError::from_persistence("connection reset by peer"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TeachersRepo for FaultyRepos {
    async fn find_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        self.inner.find_teacher(id).await
    }

    async fn list_teachers(&self) -> Result<Vec<TeacherRecord>, RepoError> {
        self.inner.list_teachers().await
    }

    async fn create_teacher(
        &self,
        params: CreateTeacherParams,
    ) -> Result<TeacherRecord, RepoError> {
        self.inner.create_teacher(params).await
    }

    async fn update_teacher(
        &self,
        id: Uuid,
        patch: TeacherPatch,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        self.inner.update_teacher(id, patch).await
    }

    async fn delete_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        self.check(Fault::DeleteTeacher)?;
        self.inner.delete_teacher(id).await
    }

    async fn add_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        self.check(Fault::AddStudent)?;
        self.inner.add_student(teacher_id, student_id).await
    }

    async fn remove_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        self.check(Fault::RemoveStudentFrom(teacher_id))?;
        self.inner.remove_student(teacher_id, student_id).await
    }
}

#[async_trait]
impl StudentsRepo for FaultyRepos {
    async fn find_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        self.inner.find_student(id).await
    }

    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, RepoError> {
        self.inner.list_students(filter).await
    }

    async fn create_student(
        &self,
        params: CreateStudentParams,
    ) -> Result<StudentRecord, RepoError> {
        self.inner.create_student(params).await
    }

    async fn update_student(
        &self,
        id: Uuid,
        patch: StudentPatch,
    ) -> Result<Option<StudentRecord>, RepoError> {
        self.inner.update_student(id, patch).await
    }

    async fn delete_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        self.check(Fault::DeleteStudent)?;
        self.inner.delete_student(id).await
    }

    async fn clear_teacher(&self, teacher_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.inner.clear_teacher(teacher_id).await
    }

    async fn add_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        self.inner.add_book(student_id, book_id).await
    }

    async fn remove_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        self.inner.remove_book(student_id, book_id).await
    }

    async fn remove_book_from_all(&self, book_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.inner.remove_book_from_all(book_id).await
    }
}

#[async_trait]
impl BooksRepo for FaultyRepos {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        self.inner.find_book(id).await
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookRecord>, RepoError> {
        self.inner.list_books(filter).await
    }

    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        self.inner.create_book(params).await
    }

    async fn update_book(
        &self,
        id: Uuid,
        patch: BookPatch,
    ) -> Result<Option<BookRecord>, RepoError> {
        self.inner.update_book(id, patch).await
    }

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        self.check(Fault::DeleteBook)?;
        self.inner.delete_book(id).await
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: i64,
        stock: BookStock,
    ) -> Result<CasOutcome, RepoError> {
        self.inner.compare_and_swap(id, expected_version, stock).await
    }

    async fn release_borrower(&self, student_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        self.check(Fault::ReleaseBorrower)?;
        self.inner.release_borrower(student_id).await
    }
}
