//! Retry and rollback for writes that span several records.
//!
//! Entity writes that touch more than one record commit step by step. A
//! follow-up step is retried a bounded number of times; when it still fails
//! the steps already committed are undone and the caller invalidates every
//! key those steps may have touched before reporting the error.

use std::future::Future;

use metrics::counter;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::repos::{BooksRepo, CasOutcome, RepoError};
use crate::domain::lending::{self, Transition};

const METRIC_WRITE_ROLLBACK_TOTAL: &str = "rostra_write_rollback_total";

/// Attempts made for each follow-up write before the operation is unwound.
pub const FOLLOW_UP_WRITE_ATTEMPTS: u32 = 2;

/// Versioned stock writes attempted while undoing a release.
pub const ROLLBACK_CAS_ATTEMPTS: u32 = 8;

/// Runs `write` until it succeeds or `attempts` runs out.
pub async fn retry_write<T, F, Fut>(
    step: &'static str,
    attempts: u32,
    mut write: F,
) -> Result<T, RepoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(step, attempt, error = %err, "Write failed; retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Records the outcome of unwinding a partially applied `operation`.
pub fn report_rollback(operation: &'static str, entity_id: Uuid, outcome: Result<(), RepoError>) {
    counter!(METRIC_WRITE_ROLLBACK_TOTAL, "operation" => operation).increment(1);
    match outcome {
        Ok(()) => info!(operation, %entity_id, "Partial write rolled back"),
        Err(err) => error!(
            operation,
            %entity_id,
            error = %err,
            "Partial write could not be rolled back; related records left inconsistent"
        ),
    }
}

/// Undoes a completed `transition` on the book's stock, re-reading the book
/// whenever its version moved.
pub async fn revert_stock(
    books: &dyn BooksRepo,
    transition: Transition,
    book_id: Uuid,
    student_id: Uuid,
    max_attempts: u32,
) -> Result<bool, RepoError> {
    for _ in 0..max_attempts {
        let Some(book) = books.find_book(book_id).await? else {
            return Ok(false);
        };
        let Some(stock) = lending::revert(transition, &book, student_id) else {
            return Ok(false);
        };
        match books.compare_and_swap(book.id, book.version, stock).await? {
            CasOutcome::Applied(_) => return Ok(true),
            CasOutcome::Missing => return Ok(false),
            CasOutcome::Conflict => {}
        }
    }
    Err(RepoError::from_persistence("book stayed contended during revert"))
}
