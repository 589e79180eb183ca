//! Domain model for users, appointments, prescriptions, lab tests and
//! notifications.
//!
//! # Responsibility
//! - Define canonical records and their lifecycle enums.
//! - Own field-level validation shared by every write path.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Status strings persisted in storage map 1:1 onto enum variants.
//! - Timestamps are Unix epoch milliseconds.

pub mod appointment;
pub mod notification;
pub mod prescription;
pub mod user;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text is empty after trimming.
    Empty(&'static str),
    /// Text exceeds its character cap.
    TooLong {
        field: &'static str,
        max_chars: usize,
    },
    /// Value is well-formed but outside its allowed domain.
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty(field) => field,
            Self::TooLong { field, .. } => field,
            Self::Invalid { field, .. } => field,
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(field) => write!(f, "{field} must not be empty"),
            Self::TooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
            Self::Invalid { field, message } => write!(f, "invalid {field}: {message}"),
        }
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Checks required text: non-blank and within `max_chars`.
pub(crate) fn require_text(field: &'static str, value: &str, max_chars: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    check_len(field, value, max_chars)
}

/// Checks optional text: when present, within `max_chars`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> ValidationResult {
    match value {
        Some(value) => check_len(field, value, max_chars),
        None => Ok(()),
    }
}

fn check_len(field: &'static str, value: &str, max_chars: usize) -> ValidationResult {
    if value.chars().count() > max_chars {
        return Err(ValidationError::TooLong { field, max_chars });
    }
    Ok(())
}

/// Trims text and maps blank values to `None`.
pub fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
