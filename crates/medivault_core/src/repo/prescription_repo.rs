//! Prescription repository contracts and SQLite implementation.

use super::{
    enum_column, ensure_table_ready, lost_update, optional_uuid_column, uuid_column, RepoError,
    RepoResult,
};
use crate::model::prescription::{Prescription, PrescriptionId, PrescriptionStatus};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PRESCRIPTION_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    doctor_id,
    appointment_id,
    medication,
    dosage,
    frequency,
    duration_days,
    instructions,
    status,
    dispensed_by,
    dispensed_at,
    created_at,
    updated_at
FROM prescriptions";

const PRESCRIPTION_COLUMNS: &[&str] = &[
    "id",
    "patient_id",
    "doctor_id",
    "appointment_id",
    "medication",
    "dosage",
    "frequency",
    "duration_days",
    "instructions",
    "status",
    "dispensed_by",
    "dispensed_at",
    "created_at",
    "updated_at",
];

/// Query options for listing prescriptions. Newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionListQuery {
    pub patient_id: Option<UserId>,
    pub doctor_id: Option<UserId>,
    pub status: Option<PrescriptionStatus>,
    pub limit: u32,
    pub offset: u32,
}

pub trait PrescriptionRepository {
    fn create_prescription(&self, prescription: &Prescription) -> RepoResult<PrescriptionId>;
    fn get_prescription(&self, id: PrescriptionId) -> RepoResult<Option<Prescription>>;
    fn list_prescriptions(&self, query: &PrescriptionListQuery) -> RepoResult<Vec<Prescription>>;
    /// `active -> dispensed`, recording who dispensed and when.
    fn mark_dispensed(&self, id: PrescriptionId, pharmacist_id: UserId, at: i64) -> RepoResult<()>;
    /// `active -> cancelled`.
    fn mark_cancelled(&self, id: PrescriptionId) -> RepoResult<()>;
}

pub struct SqlitePrescriptionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePrescriptionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "prescriptions", PRESCRIPTION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl PrescriptionRepository for SqlitePrescriptionRepository<'_> {
    fn create_prescription(&self, prescription: &Prescription) -> RepoResult<PrescriptionId> {
        self.conn.execute(
            "INSERT INTO prescriptions (
                id,
                patient_id,
                doctor_id,
                appointment_id,
                medication,
                dosage,
                frequency,
                duration_days,
                instructions,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                prescription.id.to_string(),
                prescription.patient_id.to_string(),
                prescription.doctor_id.to_string(),
                prescription.appointment_id.map(|id| id.to_string()),
                prescription.medication.as_str(),
                prescription.dosage.as_str(),
                prescription.frequency.as_str(),
                prescription.duration_days,
                prescription.instructions.as_deref(),
                prescription.status.as_str(),
            ],
        )?;
        Ok(prescription.id)
    }

    fn get_prescription(&self, id: PrescriptionId) -> RepoResult<Option<Prescription>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PRESCRIPTION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_prescription_row(row)?));
        }
        Ok(None)
    }

    fn list_prescriptions(&self, query: &PrescriptionListQuery) -> RepoResult<Vec<Prescription>> {
        let mut sql = format!("{PRESCRIPTION_SELECT_SQL} WHERE 1 = 1");
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

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut prescriptions = Vec::new();
        while let Some(row) = rows.next()? {
            prescriptions.push(parse_prescription_row(row)?);
        }
        Ok(prescriptions)
    }

    fn mark_dispensed(&self, id: PrescriptionId, pharmacist_id: UserId, at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE prescriptions
             SET
                status = 'dispensed',
                dispensed_by = ?2,
                dispensed_at = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = 'active';",
            params![id.to_string(), pharmacist_id.to_string(), at],
        )?;
        if changed == 0 {
            return Err(lost_update(self.conn, "prescriptions", "prescription", id));
        }
        Ok(())
    }

    fn mark_cancelled(&self, id: PrescriptionId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE prescriptions
             SET
                status = 'cancelled',
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND status = 'active';",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(lost_update(self.conn, "prescriptions", "prescription", id));
        }
        Ok(())
    }
}

fn parse_prescription_row(row: &Row<'_>) -> RepoResult<Prescription> {
    let duration_days: i64 = row.get("duration_days")?;
    let duration_days = u32::try_from(duration_days).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid duration `{duration_days}` in prescriptions.duration_days"
        ))
    })?;

    Ok(Prescription {
        id: uuid_column(row, "prescriptions", "id")?,
        patient_id: uuid_column(row, "prescriptions", "patient_id")?,
        doctor_id: uuid_column(row, "prescriptions", "doctor_id")?,
        appointment_id: optional_uuid_column(row, "prescriptions", "appointment_id")?,
        medication: row.get("medication")?,
        dosage: row.get("dosage")?,
        frequency: row.get("frequency")?,
        duration_days,
        instructions: row.get("instructions")?,
        status: enum_column(row, "prescriptions", "status", PrescriptionStatus::parse)?,
        dispensed_by: optional_uuid_column(row, "prescriptions", "dispensed_by")?,
        dispensed_at: row.get("dispensed_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
