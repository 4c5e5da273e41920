use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::repos::RepoError,
    domain::{entities::EntityKind, error::DomainError, lending::LendingError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Business-rule violations a caller can fix by changing the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictKind {
    #[error(transparent)]
    Lending(#[from] LendingError),
    #[error("a record with the same `{constraint}` already exists")]
    Duplicate { constraint: String },
}

/// Error surface of the entity services and the lending coordinator.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} not found")]
    NotFound { entity: EntityKind },
    #[error(transparent)]
    Conflict(ConflictKind),
    #[error("{0}")]
    Validation(String),
    #[error("backing store failure")]
    BackingStore(#[source] RepoError),
    #[error("book stayed contended after {attempts} attempts")]
    Contention { attempts: u32 },
}

impl ServiceError {
    pub fn not_found(entity: EntityKind) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::BackingStore(_) | ServiceError::Contention { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to API clients.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::NotFound { entity } => format!("{} not found", capitalize(entity.as_str())),
            ServiceError::Conflict(kind) => kind.to_string(),
            ServiceError::Validation(message) => message.clone(),
            ServiceError::BackingStore(_) | ServiceError::Contention { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl From<RepoError> for ServiceError {
    fn from(error: RepoError) -> Self {
        match error {
            RepoError::Duplicate { constraint } => {
                ServiceError::Conflict(ConflictKind::Duplicate { constraint })
            }
            RepoError::InvalidInput { message } => ServiceError::Validation(message),
            other => ServiceError::BackingStore(other),
        }
    }
}

impl From<LendingError> for ServiceError {
    fn from(error: LendingError) -> Self {
        ServiceError::Conflict(ConflictKind::Lending(error))
    }
}

impl From<DomainError> for ServiceError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { .. } => ServiceError::Validation(error.to_string()),
            DomainError::Invariant { message } => {
                ServiceError::BackingStore(RepoError::InvalidInput { message })
            }
        }
    }
}

/// Process-level failures surfaced by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        let cases = [
            (ServiceError::not_found(EntityKind::Book), StatusCode::NOT_FOUND),
            (
                ServiceError::from(LendingError::Unavailable),
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                ServiceError::from(RepoError::Timeout),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Contention { attempts: 8 },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{error:?}");
        }
    }

    #[test]
    fn duplicate_rows_become_conflicts() {
        let error = ServiceError::from(RepoError::Duplicate {
            constraint: "students_email_key".to_string(),
        });

        assert!(matches!(
            error,
            ServiceError::Conflict(ConflictKind::Duplicate { .. })
        ));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn public_messages_hide_store_details() {
        let error = ServiceError::from(RepoError::from_persistence("connection reset"));
        assert_eq!(error.public_message(), "Internal server error");

        let missing = ServiceError::not_found(EntityKind::Teacher);
        assert_eq!(missing.public_message(), "Teacher not found");
    }

    #[test]
    fn report_collects_error_chain() {
        let error = ServiceError::BackingStore(RepoError::Timeout);
        let report = ErrorReport::from_error("test", error.status_code(), &error);

        assert_eq!(
            report.messages,
            vec!["backing store failure".to_string(), "database timeout".to_string()]
        );
    }
}
