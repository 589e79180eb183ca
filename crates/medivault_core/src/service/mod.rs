//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce role/ownership rules for the calling [`Principal`].
//! - Keep the HTTP layer decoupled from storage details.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Notification fan-out runs after the primary write and never fails it.
//!
//! [`Principal`]: crate::auth::access::Principal

pub mod appointment_service;
pub mod auth_service;
pub mod lab_test_service;
pub mod notification_service;
pub mod prescription_service;
pub mod report_service;
pub mod user_service;

use crate::auth::access::AccessDenied;
use crate::model::ValidationError;
use crate::repo::RepoError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Clock used by services; swappable in tests.
pub type Clock = fn() -> i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Use-case failure, mapped 1:1 onto HTTP status classes by the API layer.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    /// Missing, invalid or expired credentials.
    Unauthorized(&'static str),
    Forbidden(String),
    NotFound { entity: &'static str, id: Uuid },
    Conflict(String),
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
    Repo(RepoError),
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Repo(_) => "internal_error",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Unauthorized(message) => write!(f, "{message}"),
            Self::Forbidden(message) => write!(f, "{message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "{message}"),
            Self::InvalidTransition { entity, from, to } => {
                write!(f, "{entity} cannot move from `{from}` to `{to}`")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(message) => Self::Conflict(message),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AccessDenied> for ServiceError {
    fn from(value: AccessDenied) -> Self {
        Self::Forbidden(value.to_string())
    }
}

/// Paged list envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
    pub offset: u32,
}

/// Caller-supplied paging; normalized by each service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: u32,
}
