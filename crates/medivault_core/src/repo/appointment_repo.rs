//! Appointment repository contracts and SQLite implementation.
//!
//! # Invariants
//! - List order is `scheduled_at ASC, id ASC`.
//! - `update_status` only applies when the stored status still equals the
//!   caller's expected status.

use super::{
    enum_column, ensure_table_ready, lost_update, uuid_column, RepoError, RepoResult,
};
use crate::model::appointment::{Appointment, AppointmentId, AppointmentStatus};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const APPOINTMENT_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    doctor_id,
    scheduled_at,
    reason,
    notes,
    status,
    created_at,
    updated_at
FROM appointments";

const APPOINTMENT_COLUMNS: &[&str] = &[
    "id",
    "patient_id",
    "doctor_id",
    "scheduled_at",
    "reason",
    "notes",
    "status",
    "created_at",
    "updated_at",
];

/// Query options for listing appointments. Filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentListQuery {
    pub patient_id: Option<UserId>,
    pub doctor_id: Option<UserId>,
    pub status: Option<AppointmentStatus>,
    pub limit: u32,
    pub offset: u32,
}

pub trait AppointmentRepository {
    fn create_appointment(&self, appointment: &Appointment) -> RepoResult<AppointmentId>;
    fn get_appointment(&self, id: AppointmentId) -> RepoResult<Option<Appointment>>;
    fn list_appointments(&self, query: &AppointmentListQuery) -> RepoResult<Vec<Appointment>>;
    /// Compare-and-set status change. `notes`, when `Some`, replaces stored notes.
    fn update_status(
        &self,
        id: AppointmentId,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        notes: Option<&str>,
    ) -> RepoResult<()>;
    /// Returns a live appointment of `doctor_id` starting within `window_ms`
    /// of `scheduled_at`, if any.
    fn find_slot_conflict(
        &self,
        doctor_id: UserId,
        scheduled_at: i64,
        window_ms: i64,
    ) -> RepoResult<Option<AppointmentId>>;
}

pub struct SqliteAppointmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAppointmentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "appointments", APPOINTMENT_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl AppointmentRepository for SqliteAppointmentRepository<'_> {
    fn create_appointment(&self, appointment: &Appointment) -> RepoResult<AppointmentId> {
        appointment.validate()?;

        self.conn.execute(
            "INSERT INTO appointments (
                id,
                patient_id,
                doctor_id,
                scheduled_at,
                reason,
                notes,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                appointment.id.to_string(),
                appointment.patient_id.to_string(),
                appointment.doctor_id.to_string(),
                appointment.scheduled_at,
                appointment.reason.as_str(),
                appointment.notes.as_deref(),
                appointment.status.as_str(),
            ],
        )?;

        Ok(appointment.id)
    }

    fn get_appointment(&self, id: AppointmentId) -> RepoResult<Option<Appointment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{APPOINTMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_appointment_row(row)?));
        }
        Ok(None)
    }

    fn list_appointments(&self, query: &AppointmentListQuery) -> RepoResult<Vec<Appointment>> {
        let mut sql = format!("{APPOINTMENT_SELECT_SQL} WHERE 1 = 1");
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

        sql.push_str(" ORDER BY scheduled_at ASC, id ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut appointments = Vec::new();
        while let Some(row) = rows.next()? {
            appointments.push(parse_appointment_row(row)?);
        }
        Ok(appointments)
    }

    fn update_status(
        &self,
        id: AppointmentId,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        notes: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE appointments
             SET
                status = ?3,
                notes = COALESCE(?4, notes),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = ?2;",
            params![id.to_string(), expected.as_str(), next.as_str(), notes],
        )?;

        if changed == 0 {
            return Err(lost_update(self.conn, "appointments", "appointment", id));
        }
        Ok(())
    }

    fn find_slot_conflict(
        &self,
        doctor_id: UserId,
        scheduled_at: i64,
        window_ms: i64,
    ) -> RepoResult<Option<AppointmentId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM appointments
             WHERE doctor_id = ?1
               AND status <> 'cancelled'
               AND scheduled_at > ?2 - ?3
               AND scheduled_at < ?2 + ?3
             ORDER BY scheduled_at ASC, id ASC
             LIMIT 1;",
        )?;
        let mut rows = stmt.query(params![doctor_id.to_string(), scheduled_at, window_ms])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(uuid_column(row, "appointments", "id")?));
        }
        Ok(None)
    }
}

fn parse_appointment_row(row: &Row<'_>) -> RepoResult<Appointment> {
    let appointment = Appointment {
        id: uuid_column(row, "appointments", "id")?,
        patient_id: uuid_column(row, "appointments", "patient_id")?,
        doctor_id: uuid_column(row, "appointments", "doctor_id")?,
        scheduled_at: row.get("scheduled_at")?,
        reason: row.get("reason")?,
        notes: row.get("notes")?,
        status: enum_column(row, "appointments", "status", AppointmentStatus::parse)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    appointment
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("appointment {}: {err}", appointment.id)))?;
    Ok(appointment)
}
