//! Prescription model.
//!
//! # Invariants
//! - `active` is the only non-terminal status.
//! - `dispensed_by`/`dispensed_at` are set together, and only when dispensed.

use super::appointment::AppointmentId;
use super::user::UserId;
use super::{optional_text, require_text, ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PrescriptionId = Uuid;

const MEDICATION_MAX_CHARS: usize = 200;
const DOSAGE_MAX_CHARS: usize = 100;
const FREQUENCY_MAX_CHARS: usize = 100;
const INSTRUCTIONS_MAX_CHARS: usize = 2000;
const MAX_DURATION_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Dispensed,
    Cancelled,
}

impl PrescriptionStatus {
    pub const ALL: [PrescriptionStatus; 3] = [
        PrescriptionStatus::Active,
        PrescriptionStatus::Dispensed,
        PrescriptionStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Dispensed => "dispensed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn can_transition_to(self, next: PrescriptionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Dispensed) | (Self::Active, Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub appointment_id: Option<AppointmentId>,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    pub instructions: Option<String>,
    pub status: PrescriptionStatus,
    pub dispensed_by: Option<UserId>,
    pub dispensed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Doctor-supplied prescription fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrescriptionDraft {
    pub patient_id: UserId,
    #[serde(default)]
    pub appointment_id: Option<AppointmentId>,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    #[serde(default)]
    pub instructions: Option<String>,
}

impl PrescriptionDraft {
    pub fn normalized(mut self) -> Self {
        self.medication = self.medication.trim().to_string();
        self.dosage = self.dosage.trim().to_string();
        self.frequency = self.frequency.trim().to_string();
        self.instructions = super::normalize_optional_text(self.instructions);
        self
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("medication", &self.medication, MEDICATION_MAX_CHARS)?;
        require_text("dosage", &self.dosage, DOSAGE_MAX_CHARS)?;
        require_text("frequency", &self.frequency, FREQUENCY_MAX_CHARS)?;
        if self.duration_days == 0 || self.duration_days > MAX_DURATION_DAYS {
            return Err(ValidationError::invalid(
                "duration_days",
                format!("expected 1..={MAX_DURATION_DAYS}, got {}", self.duration_days),
            ));
        }
        optional_text(
            "instructions",
            self.instructions.as_deref(),
            INSTRUCTIONS_MAX_CHARS,
        )
    }

    /// Builds an active prescription authored by `doctor_id`.
    pub fn into_prescription(self, doctor_id: UserId) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id,
            appointment_id: self.appointment_id,
            medication: self.medication,
            dosage: self.dosage,
            frequency: self.frequency,
            duration_days: self.duration_days,
            instructions: self.instructions,
            status: PrescriptionStatus::Active,
            dispensed_by: None,
            dispensed_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}
