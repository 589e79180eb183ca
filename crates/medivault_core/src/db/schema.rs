//! Runtime schema introspection over `sqlite_master` and `PRAGMA table_info`.
//!
//! Repositories use these checks at construction time so a connection that
//! skipped migrations fails fast with a named table/column instead of a
//! generic SQL error on first query.

use super::DbResult;
use rusqlite::Connection;
use serde::Serialize;

/// Tables owned by the application schema, in migration order.
pub const APPLICATION_TABLES: &[&str] = &[
    "users",
    "sessions",
    "appointments",
    "prescriptions",
    "lab_tests",
    "notifications",
];

/// Column metadata as reported by SQLite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared type (`TEXT`, `INTEGER`, ...), upper-cased.
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Returns whether a table with this exact name exists.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// Returns column names of `table` in declaration order.
///
/// Unknown tables yield an empty list.
pub fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    Ok(table_columns_meta(conn, table)?
        .into_iter()
        .map(|column| column.name)
        .collect())
}

/// Returns full column metadata of `table` in declaration order.
pub fn table_columns_meta(conn: &Connection, table: &str) -> DbResult<Vec<ColumnMeta>> {
    let mut stmt = conn.prepare("SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let not_null: i64 = row.get(2)?;
        let pk: i64 = row.get(4)?;
        let data_type: String = row.get(1)?;
        columns.push(ColumnMeta {
            name: row.get(0)?,
            data_type: data_type.to_ascii_uppercase(),
            nullable: not_null == 0 && pk == 0,
            default_value: row.get(3)?,
            primary_key: pk > 0,
        });
    }
    Ok(columns)
}

/// Returns the first of `columns` missing from `table`, if any.
pub fn first_missing_column(
    conn: &Connection,
    table: &str,
    columns: &[&'static str],
) -> DbResult<Option<&'static str>> {
    let present = table_columns(conn, table)?;
    Ok(columns
        .iter()
        .copied()
        .find(|column| !present.iter().any(|name| name == column)))
}
