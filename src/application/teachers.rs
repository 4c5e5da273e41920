use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::recovery::{self, FOLLOW_UP_WRITE_ATTEMPTS};
use crate::application::repos::{
    CreateTeacherParams, RepoError, StudentFilter, StudentPatch, StudentsRepo, TeacherPatch,
    TeachersRepo,
};
use crate::cache::{CacheKey, CacheTrigger, ReadThrough};
use crate::domain::entities::{EntityKind, StudentRecord, TeacherRecord};
use crate::domain::validation;

#[derive(Debug, Clone)]
pub struct CreateTeacherCommand {
    pub name: String,
    pub email: String,
    pub subject: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTeacherCommand {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
}

#[derive(Clone)]
pub struct TeacherService {
    teachers: Arc<dyn TeachersRepo>,
    students: Arc<dyn StudentsRepo>,
    cache: Arc<ReadThrough>,
    trigger: Arc<CacheTrigger>,
}

impl TeacherService {
    pub fn new(
        teachers: Arc<dyn TeachersRepo>,
        students: Arc<dyn StudentsRepo>,
        cache: Arc<ReadThrough>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        Self {
            teachers,
            students,
            cache,
            trigger,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<TeacherRecord, ServiceError> {
        let teachers = &self.teachers;
        self.cache
            .read(&CacheKey::teacher(id), None, || async move {
                teachers
                    .find_teacher(id)
                    .await?
                    .ok_or(ServiceError::not_found(EntityKind::Teacher))
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<TeacherRecord>, ServiceError> {
        let teachers = &self.teachers;
        self.cache
            .read(
                &CacheKey::collection(EntityKind::Teacher),
                None,
                || async move { Ok::<_, ServiceError>(teachers.list_teachers().await?) },
            )
            .await
    }

    /// Students currently assigned to the teacher.
    pub async fn roster(&self, id: Uuid) -> Result<Vec<StudentRecord>, ServiceError> {
        let teachers = &self.teachers;
        let students = &self.students;
        self.cache
            .read(&CacheKey::roster(id), None, || async move {
                if teachers.find_teacher(id).await?.is_none() {
                    return Err(ServiceError::not_found(EntityKind::Teacher));
                }
                students
                    .list_students(&StudentFilter::by_teacher(id))
                    .await
                    .map_err(ServiceError::from)
            })
            .await
    }

    pub async fn create(&self, command: CreateTeacherCommand) -> Result<TeacherRecord, ServiceError> {
        let params = CreateTeacherParams {
            name: validation::required_text("name", &command.name)?,
            email: validation::email("email", &command.email)?,
            subject: validation::required_text("subject", &command.subject)?,
        };

        let teacher = self.teachers.create_teacher(params).await?;
        info!(teacher_id = %teacher.id, "Teacher created");

        self.trigger.teacher_created(teacher.clone()).await;
        Ok(teacher)
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateTeacherCommand,
    ) -> Result<TeacherRecord, ServiceError> {
        let patch = TeacherPatch {
            name: validation::optional_text("name", command.name.as_deref())?,
            email: validation::optional_email("email", command.email.as_deref())?,
            subject: validation::optional_text("subject", command.subject.as_deref())?,
        };

        let before = self.require(id).await?;
        let after = self
            .teachers
            .update_teacher(id, patch)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Teacher))?;

        self.trigger.teacher_updated(before, after.clone()).await;
        Ok(after)
    }

    /// Deletes the teacher and clears the reference on its former students.
    pub async fn delete(&self, id: Uuid) -> Result<TeacherRecord, ServiceError> {
        let before = self.require(id).await?;

        let orphaned = recovery::retry_write("clear_teacher", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.students.clear_teacher(id)
        })
        .await?;
        let deleted = recovery::retry_write("delete_teacher", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.teachers.delete_teacher(id)
        })
        .await;
        match deleted {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.trigger.teacher_deleted(before, orphaned).await;
                return Err(ServiceError::not_found(EntityKind::Teacher));
            }
            Err(err) => {
                let outcome = self.readopt(id, &orphaned).await;
                recovery::report_rollback("teacher.delete", id, outcome);
                self.trigger.teacher_deleted(before, orphaned).await;
                return Err(err.into());
            }
        }
        info!(teacher_id = %id, orphaned = orphaned.len(), "Teacher deleted");

        self.trigger.teacher_deleted(before.clone(), orphaned).await;
        Ok(before)
    }

    /// Points the students cleared by a failed delete back at the teacher.
    async fn readopt(&self, teacher_id: Uuid, students: &[Uuid]) -> Result<(), RepoError> {
        for student_id in students {
            let patch = StudentPatch {
                teacher_id: Some(teacher_id),
                ..StudentPatch::default()
            };
            recovery::retry_write("update_student", FOLLOW_UP_WRITE_ATTEMPTS, || {
                self.students.update_student(*student_id, patch.clone())
            })
            .await?;
        }
        Ok(())
    }

    async fn require(&self, id: Uuid) -> Result<TeacherRecord, ServiceError> {
        self.teachers
            .find_teacher(id)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Teacher))
    }
}
