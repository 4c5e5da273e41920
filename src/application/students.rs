use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::recovery::{self, FOLLOW_UP_WRITE_ATTEMPTS, ROLLBACK_CAS_ATTEMPTS};
use crate::application::repos::{
    BookFilter, BooksRepo, CreateStudentParams, RepoError, StudentPatch, StudentsRepo,
    TeachersRepo,
};
use crate::cache::{CacheKey, CacheTrigger, ReadThrough};
use crate::domain::entities::{BookRecord, EntityKind, StudentRecord};
use crate::domain::lending::Transition;
use crate::domain::validation;

#[derive(Debug, Clone)]
pub struct CreateStudentCommand {
    pub name: String,
    pub email: String,
    pub grade: String,
    pub teacher_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateStudentCommand {
    pub name: Option<String>,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub teacher_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct StudentService {
    students: Arc<dyn StudentsRepo>,
    teachers: Arc<dyn TeachersRepo>,
    books: Arc<dyn BooksRepo>,
    cache: Arc<ReadThrough>,
    trigger: Arc<CacheTrigger>,
}

impl StudentService {
    pub fn new(
        students: Arc<dyn StudentsRepo>,
        teachers: Arc<dyn TeachersRepo>,
        books: Arc<dyn BooksRepo>,
        cache: Arc<ReadThrough>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        Self {
            students,
            teachers,
            books,
            cache,
            trigger,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<StudentRecord, ServiceError> {
        let students = &self.students;
        self.cache
            .read(&CacheKey::student(id), None, || async move {
                students
                    .find_student(id)
                    .await?
                    .ok_or(ServiceError::not_found(EntityKind::Student))
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<StudentRecord>, ServiceError> {
        let students = &self.students;
        self.cache
            .read(
                &CacheKey::collection(EntityKind::Student),
                None,
                || async move {
                    students
                        .list_students(&Default::default())
                        .await
                        .map_err(ServiceError::from)
                },
            )
            .await
    }

    /// Books the student currently holds.
    pub async fn books(&self, id: Uuid) -> Result<Vec<BookRecord>, ServiceError> {
        let students = &self.students;
        let books = &self.books;
        self.cache
            .read(&CacheKey::book_list(id), None, || async move {
                let student = students
                    .find_student(id)
                    .await?
                    .ok_or(ServiceError::not_found(EntityKind::Student))?;
                if student.books.is_empty() {
                    return Ok(Vec::new());
                }
                books
                    .list_books(&BookFilter::by_ids(student.books))
                    .await
                    .map_err(ServiceError::from)
            })
            .await
    }

    pub async fn create(&self, command: CreateStudentCommand) -> Result<StudentRecord, ServiceError> {
        let teacher_id = command
            .teacher_id
            .ok_or_else(|| ServiceError::validation("`teacherId` is required"))?;
        let params = CreateStudentParams {
            name: validation::required_text("name", &command.name)?,
            email: validation::email("email", &command.email)?,
            grade: validation::required_text("grade", &command.grade)?,
            teacher_id,
        };

        self.require_teacher(teacher_id).await?;

        let student = self.students.create_student(params).await?;
        let rostered = recovery::retry_write("add_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.teachers.add_student(teacher_id, student.id)
        })
        .await;
        let failure = match rostered {
            Ok(Some(_)) => None,
            // The teacher vanished between the check and the roster write.
            Ok(None) => Some(ServiceError::not_found(EntityKind::Teacher)),
            Err(err) => Some(ServiceError::from(err)),
        };
        if let Some(err) = failure {
            warn!(
                student_id = %student.id,
                %teacher_id,
                error = %err,
                "Roster write failed; removing new student"
            );
            let outcome = recovery::retry_write("delete_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
                self.students.delete_student(student.id)
            })
            .await
            .map(|_| ());
            recovery::report_rollback("student.create", student.id, outcome);
            self.trigger.student_created(student).await;
            return Err(err);
        }
        info!(student_id = %student.id, teacher_id = %teacher_id, "Student created");

        self.trigger.student_created(student.clone()).await;
        Ok(student)
    }

    /// Updates profile fields and, when `teacher_id` names a different
    /// teacher, moves the student between rosters.
    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateStudentCommand,
    ) -> Result<StudentRecord, ServiceError> {
        let patch = StudentPatch {
            name: validation::optional_text("name", command.name.as_deref())?,
            email: validation::optional_email("email", command.email.as_deref())?,
            grade: validation::optional_text("grade", command.grade.as_deref())?,
            teacher_id: command.teacher_id,
        };

        let before = self.require(id).await?;
        let reassigned_to = patch
            .teacher_id
            .filter(|teacher_id| before.teacher_id != Some(*teacher_id));
        if let Some(teacher_id) = reassigned_to {
            self.require_teacher(teacher_id).await?;
            return self.reassign(before, teacher_id, patch).await;
        }

        let after = self
            .students
            .update_student(id, patch)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Student))?;

        self.trigger.student_updated(before, after.clone()).await;
        Ok(after)
    }

    /// Joins the new roster, writes the student, then leaves the old roster,
    /// so a failing step only ever has undoable writes behind it.
    async fn reassign(
        &self,
        before: StudentRecord,
        new_teacher: Uuid,
        patch: StudentPatch,
    ) -> Result<StudentRecord, ServiceError> {
        let id = before.id;
        recovery::retry_write("add_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.teachers.add_student(new_teacher, id)
        })
        .await?
        .ok_or(ServiceError::not_found(EntityKind::Teacher))?;

        let updated = match self.students.update_student(id, patch).await {
            Ok(Some(after)) => Ok(after),
            Ok(None) => Err(ServiceError::not_found(EntityKind::Student)),
            Err(err) => Err(ServiceError::from(err)),
        };
        let after = match updated {
            Ok(after) => after,
            Err(err) => {
                let outcome = self.leave_roster(new_teacher, id).await;
                let mut intended = before.clone();
                intended.teacher_id = Some(new_teacher);
                return Err(self.abandon_update(before, intended, outcome, err).await);
            }
        };

        if let Some(old_teacher) = before.teacher_id {
            let left = recovery::retry_write("remove_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
                self.teachers.remove_student(old_teacher, id)
            })
            .await;
            if let Err(err) = left {
                let mut outcome = self.restore_profile(&before).await;
                if outcome.is_ok() {
                    outcome = self.leave_roster(new_teacher, id).await;
                }
                return Err(self.abandon_update(before, after, outcome, err.into()).await);
            }
        }

        info!(
            student_id = %id,
            from = ?before.teacher_id,
            to = %new_teacher,
            "Student reassigned"
        );
        self.trigger.student_updated(before, after.clone()).await;
        Ok(after)
    }

    /// Deletes the student, pulling it from its teacher's roster and handing
    /// every borrowed copy back to stock.
    pub async fn delete(&self, id: Uuid) -> Result<StudentRecord, ServiceError> {
        let before = self.require(id).await?;

        if let Some(teacher_id) = before.teacher_id {
            recovery::retry_write("remove_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
                self.teachers.remove_student(teacher_id, id)
            })
            .await?;
        }

        let released = match recovery::retry_write("release_borrower", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.books.release_borrower(id)
        })
        .await
        {
            Ok(released) => released,
            Err(err) => {
                let outcome = self.rejoin_roster(&before).await;
                return Err(self.abandon_delete(before, Vec::new(), outcome, err.into()).await);
            }
        };

        let deleted = recovery::retry_write("delete_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.students.delete_student(id)
        })
        .await;
        match deleted {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.trigger.student_deleted(before, released).await;
                return Err(ServiceError::not_found(EntityKind::Student));
            }
            Err(err) => {
                let roster = self.rejoin_roster(&before).await;
                let loans = self.restore_loans(id, &released).await;
                let outcome = roster.and(loans);
                return Err(self.abandon_delete(before, released, outcome, err.into()).await);
            }
        }
        info!(student_id = %id, released = released.len(), "Student deleted");

        self.trigger.student_deleted(before.clone(), released).await;
        Ok(before)
    }

    async fn abandon_update(
        &self,
        before: StudentRecord,
        attempted: StudentRecord,
        outcome: Result<(), RepoError>,
        err: ServiceError,
    ) -> ServiceError {
        recovery::report_rollback("student.update", before.id, outcome);
        self.trigger.student_updated(before, attempted).await;
        err
    }

    async fn abandon_delete(
        &self,
        before: StudentRecord,
        released: Vec<Uuid>,
        outcome: Result<(), RepoError>,
        err: ServiceError,
    ) -> ServiceError {
        recovery::report_rollback("student.delete", before.id, outcome);
        self.trigger.student_deleted(before, released).await;
        err
    }

    async fn leave_roster(&self, teacher_id: Uuid, student_id: Uuid) -> Result<(), RepoError> {
        recovery::retry_write("remove_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.teachers.remove_student(teacher_id, student_id)
        })
        .await
        .map(|_| ())
    }

    async fn rejoin_roster(&self, student: &StudentRecord) -> Result<(), RepoError> {
        let Some(teacher_id) = student.teacher_id else {
            return Ok(());
        };
        recovery::retry_write("add_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.teachers.add_student(teacher_id, student.id)
        })
        .await
        .map(|_| ())
    }

    /// Writes the profile and teacher reference of `before` back.
    async fn restore_profile(&self, before: &StudentRecord) -> Result<(), RepoError> {
        let patch = StudentPatch {
            name: Some(before.name.clone()),
            email: Some(before.email.clone()),
            grade: Some(before.grade.clone()),
            teacher_id: before.teacher_id,
        };
        recovery::retry_write("update_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.students.update_student(before.id, patch.clone())
        })
        .await
        .map(|_| ())
    }

    /// Takes the released copies out of stock again. A copy that has since
    /// gone to someone else is dropped from the student's set instead.
    async fn restore_loans(&self, student_id: Uuid, released: &[Uuid]) -> Result<(), RepoError> {
        for book_id in released {
            let restored = recovery::revert_stock(
                self.books.as_ref(),
                Transition::Checkin,
                *book_id,
                student_id,
                ROLLBACK_CAS_ATTEMPTS,
            )
            .await?;
            if !restored {
                self.students.remove_book(student_id, *book_id).await?;
            }
        }
        Ok(())
    }

    async fn require(&self, id: Uuid) -> Result<StudentRecord, ServiceError> {
        self.students
            .find_student(id)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Student))
    }

    async fn require_teacher(&self, teacher_id: Uuid) -> Result<(), ServiceError> {
        match self.teachers.find_teacher(teacher_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found(EntityKind::Teacher)),
        }
    }
}
