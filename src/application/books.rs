use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::recovery::{self, FOLLOW_UP_WRITE_ATTEMPTS};
use crate::application::repos::{
    BookFilter, BookPatch, BooksRepo, CreateBookParams, RepoError, StudentFilter, StudentsRepo,
};
use crate::cache::{CacheKey, CacheTrigger, ReadThrough};
use crate::domain::entities::{BookRecord, EntityKind};
use crate::domain::validation;

const DEFAULT_QUANTITY: i32 = 1;

#[derive(Debug, Clone)]
pub struct CreateBookCommand {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_year: i32,
    pub genre: String,
    /// Copies on the shelf; one when omitted.
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateBookCommand {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub genre: Option<String>,
    pub quantity: Option<i32>,
}

#[derive(Clone)]
pub struct BookService {
    books: Arc<dyn BooksRepo>,
    students: Arc<dyn StudentsRepo>,
    cache: Arc<ReadThrough>,
    trigger: Arc<CacheTrigger>,
}

impl BookService {
    pub fn new(
        books: Arc<dyn BooksRepo>,
        students: Arc<dyn StudentsRepo>,
        cache: Arc<ReadThrough>,
        trigger: Arc<CacheTrigger>,
    ) -> Self {
        Self {
            books,
            students,
            cache,
            trigger,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<BookRecord, ServiceError> {
        let books = &self.books;
        self.cache
            .read(&CacheKey::book(id), None, || async move {
                books
                    .find_book(id)
                    .await?
                    .ok_or(ServiceError::not_found(EntityKind::Book))
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<BookRecord>, ServiceError> {
        let books = &self.books;
        self.cache
            .read(&CacheKey::collection(EntityKind::Book), None, || async move {
                books
                    .list_books(&BookFilter::default())
                    .await
                    .map_err(ServiceError::from)
            })
            .await
    }

    pub async fn create(&self, command: CreateBookCommand) -> Result<BookRecord, ServiceError> {
        let params = CreateBookParams {
            title: validation::required_text("title", &command.title)?,
            author: validation::required_text("author", &command.author)?,
            isbn: validation::required_text("isbn", &command.isbn)?,
            published_year: validation::published_year(command.published_year)?,
            genre: validation::required_text("genre", &command.genre)?,
            quantity: validation::quantity(command.quantity.unwrap_or(DEFAULT_QUANTITY))?,
        };

        let book = self.books.create_book(params).await?;
        info!(book_id = %book.id, quantity = book.quantity, "Book created");

        self.trigger.book_created(book.clone()).await;
        Ok(book)
    }

    pub async fn update(&self, id: Uuid, command: UpdateBookCommand) -> Result<BookRecord, ServiceError> {
        let patch = BookPatch {
            title: validation::optional_text("title", command.title.as_deref())?,
            author: validation::optional_text("author", command.author.as_deref())?,
            isbn: validation::optional_text("isbn", command.isbn.as_deref())?,
            published_year: command
                .published_year
                .map(validation::published_year)
                .transpose()?,
            genre: validation::optional_text("genre", command.genre.as_deref())?,
            quantity: command.quantity.map(validation::quantity).transpose()?,
        };

        let before = self.require(id).await?;
        let after = self
            .books
            .update_book(id, patch)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Book))?;

        self.trigger.book_updated(before, after.clone()).await;
        Ok(after)
    }

    /// Deletes the book and pulls it from every borrower's book set.
    pub async fn delete(&self, id: Uuid) -> Result<BookRecord, ServiceError> {
        let before = self.require(id).await?;

        let borrowers = if before.borrowed_by.is_empty() {
            Vec::new()
        } else {
            self.students
                .list_students(&StudentFilter::by_ids(before.borrowed_by.clone()))
                .await?
        };
        let pulled = recovery::retry_write("remove_book_from_all", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.students.remove_book_from_all(id)
        })
        .await?;
        let deleted = recovery::retry_write("delete_book", FOLLOW_UP_WRITE_ATTEMPTS, || {
            self.books.delete_book(id)
        })
        .await;
        match deleted {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.trigger.book_deleted(before, borrowers).await;
                return Err(ServiceError::not_found(EntityKind::Book));
            }
            Err(err) => {
                let outcome = self.restore_holders(id, &pulled).await;
                recovery::report_rollback("book.delete", id, outcome);
                self.trigger.book_deleted(before, borrowers).await;
                return Err(err.into());
            }
        }
        info!(book_id = %id, borrowers = borrowers.len(), "Book deleted");

        self.trigger.book_deleted(before.clone(), borrowers).await;
        Ok(before)
    }

    /// Puts the book back into the sets a failed delete pulled it from.
    async fn restore_holders(&self, book_id: Uuid, holders: &[Uuid]) -> Result<(), RepoError> {
        for student_id in holders {
            recovery::retry_write("add_book", FOLLOW_UP_WRITE_ATTEMPTS, || {
                self.students.add_book(*student_id, book_id)
            })
            .await?;
        }
        Ok(())
    }

    async fn require(&self, id: Uuid) -> Result<BookRecord, ServiceError> {
        self.books
            .find_book(id)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Book))
    }
}
