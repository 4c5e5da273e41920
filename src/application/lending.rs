//! Borrow/return coordinator.
//!
//! A loan touches two records: the book's stock and the student's book set.
//! The book is written first with a versioned compare-and-swap so concurrent
//! borrowers cannot both take the last copy. The student side is an atomic
//! set insert/remove; if it cannot be persisted the book write is reverted
//! before the error is returned. Invalidation runs only once both writes
//! have landed.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::recovery;
use crate::application::repos::{BooksRepo, CasOutcome, RepoError, StudentsRepo};
use crate::cache::CacheTrigger;
use crate::domain::entities::{BookRecord, EntityKind, StudentRecord};
use crate::domain::lending::Transition;

const METRIC_LENDING_CAS_RETRY_TOTAL: &str = "rostra_lending_cas_retry_total";
const METRIC_LENDING_COMPENSATION_TOTAL: &str = "rostra_lending_compensation_total";

const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 8;
const DEFAULT_STUDENT_WRITE_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingConfig {
    /// Book writes attempted before giving up on a contended row.
    pub max_cas_attempts: u32,
    /// Student writes attempted before the book write is reverted.
    pub student_write_attempts: u32,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
            student_write_attempts: DEFAULT_STUDENT_WRITE_ATTEMPTS,
        }
    }
}

impl From<&crate::config::LendingSettings> for LendingConfig {
    fn from(settings: &crate::config::LendingSettings) -> Self {
        Self {
            max_cas_attempts: settings.max_cas_attempts.get(),
            student_write_attempts: settings.student_write_attempts.get(),
        }
    }
}

/// Both sides of a loan after a successful borrow or return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanReceipt {
    pub book: BookRecord,
    pub student: StudentRecord,
}

#[derive(Clone)]
pub struct LendingService {
    books: Arc<dyn BooksRepo>,
    students: Arc<dyn StudentsRepo>,
    trigger: Arc<CacheTrigger>,
    config: LendingConfig,
}

impl LendingService {
    pub fn new(
        books: Arc<dyn BooksRepo>,
        students: Arc<dyn StudentsRepo>,
        trigger: Arc<CacheTrigger>,
        config: LendingConfig,
    ) -> Self {
        Self {
            books,
            students,
            trigger,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn borrow(&self, student_id: Uuid, book_id: Uuid) -> Result<LoanReceipt, ServiceError> {
        let receipt = self.run(Transition::Checkout, student_id, book_id).await?;
        self.trigger
            .borrowed(receipt.book.clone(), receipt.student.clone())
            .await;
        Ok(receipt)
    }

    #[instrument(skip(self))]
    pub async fn return_book(
        &self,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<LoanReceipt, ServiceError> {
        let receipt = self.run(Transition::Checkin, student_id, book_id).await?;
        self.trigger
            .returned(receipt.book.clone(), receipt.student.clone())
            .await;
        Ok(receipt)
    }

    async fn run(
        &self,
        transition: Transition,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<LoanReceipt, ServiceError> {
        let student = self
            .students
            .find_student(student_id)
            .await?
            .ok_or(ServiceError::not_found(EntityKind::Student))?;

        let book = self.commit_book(transition, &student, book_id).await?;

        let student = match self.commit_student(transition, student_id, book_id).await {
            Ok(student) => student,
            Err(err) => {
                self.compensate(transition, book_id, student_id).await;
                return Err(err);
            }
        };

        info!(
            transition = transition.as_str(),
            %book_id,
            %student_id,
            quantity = book.quantity,
            "Loan state committed"
        );
        Ok(LoanReceipt { book, student })
    }

    /// Applies `transition` to the book, reloading and re-checking the rules
    /// whenever another writer got there first.
    async fn commit_book(
        &self,
        transition: Transition,
        student: &StudentRecord,
        book_id: Uuid,
    ) -> Result<BookRecord, ServiceError> {
        for attempt in 1..=self.config.max_cas_attempts {
            let book = self
                .books
                .find_book(book_id)
                .await?
                .ok_or(ServiceError::not_found(EntityKind::Book))?;
            let stock = transition.apply(&book, student)?;

            match self.books.compare_and_swap(book.id, book.version, stock).await? {
                CasOutcome::Applied(updated) => return Ok(updated),
                CasOutcome::Missing => return Err(ServiceError::not_found(EntityKind::Book)),
                CasOutcome::Conflict => {
                    counter!(METRIC_LENDING_CAS_RETRY_TOTAL).increment(1);
                    debug!(attempt, %book_id, "Book version moved; retrying");
                }
            }
        }

        warn!(
            %book_id,
            attempts = self.config.max_cas_attempts,
            "Book write abandoned under contention"
        );
        Err(ServiceError::Contention {
            attempts: self.config.max_cas_attempts,
        })
    }

    async fn commit_student(
        &self,
        transition: Transition,
        student_id: Uuid,
        book_id: Uuid,
    ) -> Result<StudentRecord, ServiceError> {
        let mut attempt = 1;
        loop {
            let result = match transition {
                Transition::Checkout => self.students.add_book(student_id, book_id).await,
                Transition::Checkin => self.students.remove_book(student_id, book_id).await,
            };

            match result {
                Ok(Some(student)) => return Ok(student),
                Ok(None) => return Err(ServiceError::not_found(EntityKind::Student)),
                Err(err) if attempt < self.config.student_write_attempts => {
                    warn!(attempt, %student_id, error = %err, "Student write failed; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Reverts the book side of a half-applied `transition`.
    async fn compensate(&self, transition: Transition, book_id: Uuid, student_id: Uuid) {
        counter!(METRIC_LENDING_COMPENSATION_TOTAL).increment(1);
        match self.revert_book(transition, book_id, student_id).await {
            Ok(()) => info!(
                transition = transition.as_str(),
                %book_id,
                %student_id,
                "Book write reverted after student write failure"
            ),
            Err(err) => error!(
                transition = transition.as_str(),
                %book_id,
                %student_id,
                error = %err,
                "Book write could not be reverted; loan pair left inconsistent"
            ),
        }
    }

    async fn revert_book(
        &self,
        transition: Transition,
        book_id: Uuid,
        student_id: Uuid,
    ) -> Result<(), RepoError> {
        recovery::revert_stock(
            self.books.as_ref(),
            transition,
            book_id,
            student_id,
            self.config.max_cas_attempts,
        )
        .await
        .map(|_| ())
    }
}
