//! Borrow/return state machine for one (book, student) pair.
//!
//! Transitions are pure: they look at snapshots and return the stock the book
//! should move to. Persisting that stock (and the student's side) is the
//! coordinator's job.

use thiserror::Error;
use uuid::Uuid;

use super::entities::{BookRecord, BookStock, StudentRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LendingError {
    #[error("book is not available for borrowing")]
    Unavailable,
    #[error("student has already borrowed this book")]
    AlreadyBorrowed,
    #[error("student has not borrowed this book")]
    NotBorrowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanState {
    NotBorrowed,
    Borrowed,
}

pub fn loan_state(book: &BookRecord, student_id: Uuid) -> LoanState {
    if book.is_borrowed_by(student_id) {
        LoanState::Borrowed
    } else {
        LoanState::NotBorrowed
    }
}

/// Direction of a lending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Checkout,
    Checkin,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Checkout => "borrow",
            Transition::Checkin => "return",
        }
    }

    pub fn inverse(self) -> Self {
        match self {
            Transition::Checkout => Transition::Checkin,
            Transition::Checkin => Transition::Checkout,
        }
    }

    /// Full transition with every business rule checked against both sides.
    pub fn apply(self, book: &BookRecord, student: &StudentRecord) -> Result<BookStock, LendingError> {
        match self {
            Transition::Checkout => checkout(book, student),
            Transition::Checkin => checkin(book, student),
        }
    }
}

pub fn checkout(book: &BookRecord, student: &StudentRecord) -> Result<BookStock, LendingError> {
    if !book.is_available() {
        return Err(LendingError::Unavailable);
    }
    if loan_state(book, student.id) == LoanState::Borrowed || student.holds(book.id) {
        return Err(LendingError::AlreadyBorrowed);
    }

    let mut next = BookStock::from(book);
    next.quantity -= 1;
    next.borrowed_by.insert(student.id);
    Ok(next)
}

pub fn checkin(book: &BookRecord, student: &StudentRecord) -> Result<BookStock, LendingError> {
    if loan_state(book, student.id) == LoanState::NotBorrowed {
        return Err(LendingError::NotBorrowed);
    }

    let mut next = BookStock::from(book);
    next.quantity += 1;
    next.borrowed_by.remove(&student.id);
    Ok(next)
}

/// Book-side undo of a completed `transition`, used when the student write
/// could not be persisted. Returns `None` when there is nothing left to undo.
pub fn revert(transition: Transition, book: &BookRecord, student_id: Uuid) -> Option<BookStock> {
    let mut next = BookStock::from(book);
    match transition {
        Transition::Checkout => {
            if !next.borrowed_by.remove(&student_id) {
                return None;
            }
            next.quantity += 1;
        }
        Transition::Checkin => {
            if next.quantity <= 0 || !next.borrowed_by.insert(student_id) {
                return None;
            }
            next.quantity -= 1;
        }
    }
    Some(next)
}
