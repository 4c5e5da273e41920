//! Field validation shared by the entity services.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::DomainError;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$")
        .expect("email pattern is a valid regular expression")
});

pub const MAX_PUBLISHED_YEAR: i32 = 9999;

/// Trims `value` and rejects it when nothing is left.
pub fn required_text(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Like [`required_text`] but passes `None` through for partial updates.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, DomainError> {
    value.map(|value| required_text(field, value)).transpose()
}

pub fn email(field: &'static str, value: &str) -> Result<String, DomainError> {
    let normalized = required_text(field, value)?.to_lowercase();
    if !EMAIL_PATTERN.is_match(&normalized) {
        return Err(DomainError::validation(
            field,
            "must be a valid email address",
        ));
    }
    Ok(normalized)
}

pub fn optional_email(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, DomainError> {
    value.map(|value| email(field, value)).transpose()
}

pub fn quantity(value: i32) -> Result<i32, DomainError> {
    if value < 0 {
        return Err(DomainError::validation(
            "quantity",
            "must not be negative",
        ));
    }
    Ok(value)
}

pub fn published_year(value: i32) -> Result<i32, DomainError> {
    if !(0..=MAX_PUBLISHED_YEAR).contains(&value) {
        return Err(DomainError::validation(
            "publishedYear",
            format!("must be between 0 and {MAX_PUBLISHED_YEAR}"),
        ));
    }
    Ok(value)
}
