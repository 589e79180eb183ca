//! Lab test repository contracts and SQLite implementation.

use super::{
    enum_column, ensure_table_ready, lost_update, optional_uuid_column, uuid_column, RepoResult,
};
use crate::model::lab_test::{LabTest, LabTestId, LabTestStatus};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const LAB_TEST_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    doctor_id,
    test_name,
    notes,
    status,
    result,
    technician_id,
    completed_at,
    created_at,
    updated_at
FROM lab_tests";

const LAB_TEST_COLUMNS: &[&str] = &[
    "id",
    "patient_id",
    "doctor_id",
    "test_name",
    "notes",
    "status",
    "result",
    "technician_id",
    "completed_at",
    "created_at",
    "updated_at",
];

/// Query options for listing lab tests. Oldest first, so queues drain in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabTestListQuery {
    pub patient_id: Option<UserId>,
    pub doctor_id: Option<UserId>,
    pub status: Option<LabTestStatus>,
    pub limit: u32,
    pub offset: u32,
}

pub trait LabTestRepository {
    fn create_lab_test(&self, test: &LabTest) -> RepoResult<LabTestId>;
    fn get_lab_test(&self, id: LabTestId) -> RepoResult<Option<LabTest>>;
    fn list_lab_tests(&self, query: &LabTestListQuery) -> RepoResult<Vec<LabTest>>;
    /// `ordered -> in_progress`, assigning the technician.
    fn mark_started(&self, id: LabTestId, technician_id: UserId) -> RepoResult<()>;
    /// `in_progress -> completed` with the result text.
    fn mark_completed(&self, id: LabTestId, result: &str, at: i64) -> RepoResult<()>;
    /// `expected -> cancelled`.
    fn mark_cancelled(&self, id: LabTestId, expected: LabTestStatus) -> RepoResult<()>;
}

pub struct SqliteLabTestRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLabTestRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "lab_tests", LAB_TEST_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl LabTestRepository for SqliteLabTestRepository<'_> {
    fn create_lab_test(&self, test: &LabTest) -> RepoResult<LabTestId> {
        test.validate()?;

        self.conn.execute(
            "INSERT INTO lab_tests (
                id,
                patient_id,
                doctor_id,
                test_name,
                notes,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                test.id.to_string(),
                test.patient_id.to_string(),
                test.doctor_id.to_string(),
                test.test_name.as_str(),
                test.notes.as_deref(),
                test.status.as_str(),
            ],
        )?;
        Ok(test.id)
    }

    fn get_lab_test(&self, id: LabTestId) -> RepoResult<Option<LabTest>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LAB_TEST_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_lab_test_row(row)?));
        }
        Ok(None)
    }

    fn list_lab_tests(&self, query: &LabTestListQuery) -> RepoResult<Vec<LabTest>> {
        let mut sql = format!("{LAB_TEST_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(patient_id) = query.patient_id {
            sql.push_str(" AND patient_id = ?");
            bind_values.push(Value::Text(patient_id.to_string()));
        }
        if let Some(doctor_id) = query.doctor_id {
            sql.push_str(" AND doctor_id = ?");
            bind_values.push(Value::Text(doctor_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tests = Vec::new();
        while let Some(row) = rows.next()? {
            tests.push(parse_lab_test_row(row)?);
        }
        Ok(tests)
    }

    fn mark_started(&self, id: LabTestId, technician_id: UserId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE lab_tests
             SET
                status = 'in_progress',
                technician_id = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = 'ordered';",
            params![id.to_string(), technician_id.to_string()],
        )?;
        if changed == 0 {
            return Err(lost_update(self.conn, "lab_tests", "lab test", id));
        }
        Ok(())
    }

    fn mark_completed(&self, id: LabTestId, result: &str, at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE lab_tests
             SET
                status = 'completed',
                result = ?2,
                completed_at = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = 'in_progress';",
            params![id.to_string(), result, at],
        )?;
        if changed == 0 {
            return Err(lost_update(self.conn, "lab_tests", "lab test", id));
        }
        Ok(())
    }

    fn mark_cancelled(&self, id: LabTestId, expected: LabTestStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE lab_tests
             SET
                status = 'cancelled',
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = ?2;",
            params![id.to_string(), expected.as_str()],
        )?;
        if changed == 0 {
            return Err(lost_update(self.conn, "lab_tests", "lab test", id));
        }
        Ok(())
    }
}

fn parse_lab_test_row(row: &Row<'_>) -> RepoResult<LabTest> {
    Ok(LabTest {
        id: uuid_column(row, "lab_tests", "id")?,
        patient_id: uuid_column(row, "lab_tests", "patient_id")?,
        doctor_id: uuid_column(row, "lab_tests", "doctor_id")?,
        test_name: row.get("test_name")?,
        notes: row.get("notes")?,
        status: enum_column(row, "lab_tests", "status", LabTestStatus::parse)?,
        result: row.get("result")?,
        technician_id: optional_uuid_column(row, "lab_tests", "technician_id")?,
        completed_at: row.get("completed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
