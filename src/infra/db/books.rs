use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        BookFilter, BookPatch, BooksRepo, CasOutcome, CreateBookParams, RepoError,
    },
    domain::entities::{BookRecord, BookStock},
};

use super::{PostgresRepositories, id_set, id_vec, map_sqlx_error};

const BOOK_COLUMNS: &str = "id, title, author, isbn, published_year, genre, quantity, \
    borrowed_by, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    author: String,
    isbn: String,
    published_year: i32,
    genre: String,
    quantity: i32,
    borrowed_by: Vec<Uuid>,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            isbn: row.isbn,
            published_year: row.published_year,
            genre: row.genre,
            quantity: row.quantity,
            borrowed_by: id_set(row.borrowed_by),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn find_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn list_books(&self, filter: &BookFilter) -> Result<Vec<BookRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(BOOK_COLUMNS);
        qb.push(" FROM books");
        if let Some(ids) = filter.ids.as_ref() {
            qb.push(" WHERE id = ANY(");
            qb.push_bind(id_vec(ids));
            qb.push(")");
        }
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<BookRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BookRecord::from).collect())
    }

    async fn create_book(&self, params: CreateBookParams) -> Result<BookRecord, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            INSERT INTO books (id, title, author, isbn, published_year, genre, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.title)
        .bind(params.author)
        .bind(params.isbn)
        .bind(params.published_year)
        .bind(params.genre)
        .bind(params.quantity)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_book(
        &self,
        id: Uuid,
        patch: BookPatch,
    ) -> Result<Option<BookRecord>, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            UPDATE books
            SET title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                published_year = COALESCE($5, published_year),
                genre = COALESCE($6, genre),
                quantity = COALESCE($7, quantity),
                version = version + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.author)
        .bind(patch.isbn)
        .bind(patch.published_year)
        .bind(patch.genre)
        .bind(patch.quantity)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn delete_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "DELETE FROM books WHERE id = $1 RETURNING {BOOK_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BookRecord::from))
    }

    async fn compare_and_swap(
        &self,
        id: Uuid,
        expected_version: i64,
        stock: BookStock,
    ) -> Result<CasOutcome, RepoError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r#"
            UPDATE books
            SET quantity = $3,
                borrowed_by = $4,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND version = $2
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected_version)
        .bind(stock.quantity)
        .bind(id_vec(&stock.borrowed_by))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Ok(CasOutcome::Applied(row.into()));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(if exists {
            CasOutcome::Conflict
        } else {
            CasOutcome::Missing
        })
    }

    async fn release_borrower(&self, student_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        let mut ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE books
            SET borrowed_by = array_remove(borrowed_by, $1),
                quantity = quantity + 1,
                version = version + 1,
                updated_at = now()
            WHERE $1 = ANY(borrowed_by)
            RETURNING id
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        ids.sort();
        Ok(ids)
    }
}
