//! Aggregate queries backing the admin summary report.
//!
//! Returns raw `GROUP BY` rows; zero-filling of absent groups is a service
//! concern.

use super::{ensure_table_ready, RepoError, RepoResult};
use crate::db::schema::{table_columns_meta, ColumnMeta, APPLICATION_TABLES};
use rusqlite::Connection;
use serde::Serialize;

/// Column layout of one application table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnMeta>,
}

pub trait ReportRepository {
    fn count_active_users_by_role(&self) -> RepoResult<Vec<(String, u64)>>;
    fn count_appointments_by_status(&self) -> RepoResult<Vec<(String, u64)>>;
    fn count_prescriptions_by_status(&self) -> RepoResult<Vec<(String, u64)>>;
    fn count_lab_tests_by_status(&self) -> RepoResult<Vec<(String, u64)>>;
    fn count_unread_notifications(&self) -> RepoResult<u64>;
    /// Column metadata for every application table, in migration order.
    fn describe_tables(&self) -> RepoResult<Vec<TableSchema>>;
}

pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "users", &["role", "is_active"])?;
        ensure_table_ready(conn, "appointments", &["status"])?;
        ensure_table_ready(conn, "prescriptions", &["status"])?;
        ensure_table_ready(conn, "lab_tests", &["status"])?;
        ensure_table_ready(conn, "notifications", &["is_read"])?;
        Ok(Self { conn })
    }

    fn grouped(&self, sql: &str) -> RepoResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let count = u64::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("negative count for `{key}`")))?;
            groups.push((key, count));
        }
        Ok(groups)
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn count_active_users_by_role(&self) -> RepoResult<Vec<(String, u64)>> {
        self.grouped(
            "SELECT role, COUNT(*) FROM users WHERE is_active = 1 GROUP BY role ORDER BY role;",
        )
    }

    fn count_appointments_by_status(&self) -> RepoResult<Vec<(String, u64)>> {
        self.grouped(
            "SELECT status, COUNT(*) FROM appointments GROUP BY status ORDER BY status;",
        )
    }

    fn count_prescriptions_by_status(&self) -> RepoResult<Vec<(String, u64)>> {
        self.grouped(
            "SELECT status, COUNT(*) FROM prescriptions GROUP BY status ORDER BY status;",
        )
    }

    fn count_lab_tests_by_status(&self) -> RepoResult<Vec<(String, u64)>> {
        self.grouped("SELECT status, COUNT(*) FROM lab_tests GROUP BY status ORDER BY status;")
    }

    fn count_unread_notifications(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE is_read = 0;",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn describe_tables(&self) -> RepoResult<Vec<TableSchema>> {
        APPLICATION_TABLES
            .iter()
            .map(|table| {
                Ok(TableSchema {
                    table: (*table).to_string(),
                    columns: table_columns_meta(self.conn, table)?,
                })
            })
            .collect()
    }
}
