//! Appointment model and status lifecycle.
//!
//! # Invariants
//! - New appointments start as `pending`.
//! - Status changes must follow [`AppointmentStatus::can_transition_to`].
//! - `completed` and `cancelled` are terminal.

use super::user::UserId;
use super::{optional_text, require_text, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AppointmentId = Uuid;

const REASON_MAX_CHARS: usize = 500;
const NOTES_MAX_CHARS: usize = 2000;

/// Minimum distance between two live appointments of one doctor.
pub const APPOINTMENT_SLOT_MS: i64 = 30 * 60 * 1000;

/// Appointment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    CancelRequested,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::CancelRequested,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::CancelRequested => "cancel_requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    /// States reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Pending => &[Confirmed, CancelRequested, Cancelled],
            Confirmed => &[Completed, CancelRequested, Cancelled],
            // Declining a cancellation request puts the visit back on the books.
            CancelRequested => &[Cancelled, Confirmed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

/// Scheduled visit between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    /// Start time, epoch milliseconds.
    pub scheduled_at: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Appointment {
    /// Creates a pending appointment with a generated ID.
    ///
    /// Timestamps are placeholders until the row is read back from storage.
    pub fn new(
        patient_id: UserId,
        doctor_id: UserId,
        scheduled_at: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            scheduled_at,
            reason: reason.into(),
            notes: None,
            status: AppointmentStatus::Pending,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("reason", &self.reason, REASON_MAX_CHARS)?;
        validate_notes(self.notes.as_deref())
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

pub fn validate_notes(notes: Option<&str>) -> ValidationResult {
    optional_text("notes", notes, NOTES_MAX_CHARS)
}
