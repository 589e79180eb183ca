//! Notification model.

use super::user::UserId;
use super::{require_text, ValidationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

const TITLE_MAX_CHARS: usize = 200;
const MESSAGE_MAX_CHARS: usize = 1000;

/// Source area of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Appointment,
    Prescription,
    LabTest,
    System,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Appointment,
        NotificationKind::Prescription,
        NotificationKind::LabTest,
        NotificationKind::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Prescription => "prescription",
            Self::LabTest => "lab_test",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            is_read: false,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_text("title", &self.title, TITLE_MAX_CHARS)?;
        require_text("message", &self.message, MESSAGE_MAX_CHARS)
    }
}
