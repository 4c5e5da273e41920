use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateStudentParams, RepoError, StudentFilter, StudentPatch, StudentsRepo,
    },
    domain::entities::StudentRecord,
};

use super::{PostgresRepositories, id_set, id_vec, map_sqlx_error};

const STUDENT_COLUMNS: &str =
    "id, name, email, grade, teacher_id, book_ids, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    name: String,
    email: String,
    grade: String,
    teacher_id: Option<Uuid>,
    book_ids: Vec<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<StudentRow> for StudentRecord {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            grade: row.grade,
            teacher_id: row.teacher_id,
            books: id_set(row.book_ids),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl StudentsRepo for PostgresRepositories {
    async fn find_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StudentRecord::from))
    }

    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<StudentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(STUDENT_COLUMNS);
        qb.push(" FROM students WHERE 1=1");
        if let Some(teacher_id) = filter.teacher_id {
            qb.push(" AND teacher_id = ");
            qb.push_bind(teacher_id);
        }
        if let Some(ids) = filter.ids.as_ref() {
            qb.push(" AND id = ANY(");
            qb.push_bind(id_vec(ids));
            qb.push(")");
        }
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<StudentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(StudentRecord::from).collect())
    }

    async fn create_student(
        &self,
        params: CreateStudentParams,
    ) -> Result<StudentRecord, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            INSERT INTO students (id, name, email, grade, teacher_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.name)
        .bind(params.email)
        .bind(params.grade)
        .bind(params.teacher_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_student(
        &self,
        id: Uuid,
        patch: StudentPatch,
    ) -> Result<Option<StudentRecord>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            UPDATE students
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                grade = COALESCE($4, grade),
                teacher_id = COALESCE($5, teacher_id),
                updated_at = now()
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.grade)
        .bind(patch.teacher_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StudentRecord::from))
    }

    async fn delete_student(&self, id: Uuid) -> Result<Option<StudentRecord>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "DELETE FROM students WHERE id = $1 RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StudentRecord::from))
    }

    async fn clear_teacher(&self, teacher_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let mut ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE students
            SET teacher_id = NULL, updated_at = now()
            WHERE teacher_id = $1
            RETURNING id
            "#,
        )
        .bind(teacher_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ids.sort();
        Ok(ids)
    }

    async fn add_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            UPDATE students
            SET book_ids = CASE
                    WHEN $2 = ANY(book_ids) THEN book_ids
                    ELSE array_append(book_ids, $2)
                END,
                updated_at = now()
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(student_id)
        .bind(book_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StudentRecord::from))
    }

    async fn remove_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<Option<StudentRecord>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            r#"
            UPDATE students
            SET book_ids = array_remove(book_ids, $2),
                updated_at = now()
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(student_id)
        .bind(book_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(StudentRecord::from))
    }

    async fn remove_book_from_all(&self, book_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let mut ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE students
            SET book_ids = array_remove(book_ids, $1), updated_at = now()
            WHERE $1 = ANY(book_ids)
            RETURNING id
            "#,
        )
        .bind(book_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ids.sort();
        Ok(ids)
    }
}
