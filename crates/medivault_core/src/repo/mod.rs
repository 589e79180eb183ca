//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQL details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate records before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Status changes are compare-and-set on the expected current status.
//! - Repositories refuse to construct over connections missing their tables.

pub mod appointment_repo;
pub mod lab_test_repo;
pub mod notification_repo;
pub mod prescription_repo;
pub mod report_repo;
pub mod session_repo;
pub mod user_repo;

use crate::db::schema::{first_missing_column, table_exists};
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::{Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

const DEFAULT_PAGE_LIMIT: u32 = 20;
const MAX_PAGE_LIMIT: u32 = 100;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// Uniqueness violation or lost compare-and-set race.
    Conflict(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "required table missing: {table}"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column missing: {table}.{column}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Normalizes list page size: default 20, capped at 100, `0` means default.
pub fn normalize_page_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => DEFAULT_PAGE_LIMIT,
        Some(value) if value > MAX_PAGE_LIMIT => MAX_PAGE_LIMIT,
        Some(value) => value,
    }
}

/// Fails unless `table` exists with every column in `columns`.
pub(crate) fn ensure_table_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }
    if let Some(column) = first_missing_column(conn, table, columns)? {
        return Err(RepoError::MissingRequiredColumn { table, column });
    }
    Ok(())
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

pub(crate) fn parse_uuid_text(value: &str, table: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{value}` in {table}.{column}"))
    })
}

pub(crate) fn uuid_column(row: &Row<'_>, table: &str, column: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid_text(&text, table, column)
}

pub(crate) fn optional_uuid_column(
    row: &Row<'_>,
    table: &str,
    column: &str,
) -> RepoResult<Option<Uuid>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => Ok(Some(parse_uuid_text(&text, table, column)?)),
        None => Ok(None),
    }
}

pub(crate) fn bool_column(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {table}.{column}"
        ))),
    }
}

pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    table: &str,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    let text: String = row.get(column)?;
    parse(&text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid value `{text}` in {table}.{column}"))
    })
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Resolves a failed compare-and-set into `NotFound` or `Conflict`.
pub(crate) fn lost_update(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
) -> RepoError {
    let exists = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id.to_string()],
        |row| row.get::<_, i64>(0),
    );
    match exists {
        Ok(1) => RepoError::Conflict(format!("{entity} {id} changed concurrently")),
        Ok(_) => RepoError::NotFound { entity, id },
        Err(err) => err.into(),
    }
}
