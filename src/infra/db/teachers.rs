use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CreateTeacherParams, RepoError, TeacherPatch, TeachersRepo},
    domain::entities::TeacherRecord,
};

use super::{PostgresRepositories, id_set, map_sqlx_error};

const TEACHER_COLUMNS: &str = "id, name, email, subject, student_ids, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TeacherRow {
    id: Uuid,
    name: String,
    email: String,
    subject: String,
    student_ids: Vec<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TeacherRow> for TeacherRecord {
    fn from(row: TeacherRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            subject: row.subject,
            students: id_set(row.student_ids),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TeachersRepo for PostgresRepositories {
    async fn find_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TeacherRecord::from))
    }

    async fn list_teachers(&self) -> Result<Vec<TeacherRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TeacherRow>(&format!(
            "SELECT {TEACHER_COLUMNS} FROM teachers ORDER BY created_at, id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TeacherRecord::from).collect())
    }

    async fn create_teacher(
        &self,
        params: CreateTeacherParams,
    ) -> Result<TeacherRecord, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            r#"
            INSERT INTO teachers (id, name, email, subject)
            VALUES ($1, $2, $3, $4)
            RETURNING {TEACHER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.name)
        .bind(params.email)
        .bind(params.subject)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_teacher(
        &self,
        id: Uuid,
        patch: TeacherPatch,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            r#"
            UPDATE teachers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                subject = COALESCE($4, subject),
                updated_at = now()
            WHERE id = $1
            RETURNING {TEACHER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.subject)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TeacherRecord::from))
    }

    async fn delete_teacher(&self, id: Uuid) -> Result<Option<TeacherRecord>, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            "DELETE FROM teachers WHERE id = $1 RETURNING {TEACHER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TeacherRecord::from))
    }

    async fn add_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            r#"
            UPDATE teachers
            SET student_ids = CASE
                    WHEN $2 = ANY(student_ids) THEN student_ids
                    ELSE array_append(student_ids, $2)
                END,
                updated_at = now()
            WHERE id = $1
            RETURNING {TEACHER_COLUMNS}
            "#
        ))
        .bind(teacher_id)
        .bind(student_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TeacherRecord::from))
    }

    async fn remove_student(
        &self,
        teacher_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<TeacherRecord>, RepoError> {
        let row = sqlx::query_as::<_, TeacherRow>(&format!(
            r#"
            UPDATE teachers
            SET student_ids = array_remove(student_ids, $2),
                updated_at = now()
            WHERE id = $1
            RETURNING {TEACHER_COLUMNS}
            "#
        ))
        .bind(teacher_id)
        .bind(student_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TeacherRecord::from))
    }
}
