//! User and role model.
//!
//! # Invariants
//! - `email` is stored lowercase and trimmed.
//! - Password material never appears on `User`; it stays in the repository.

use super::{optional_text, require_text, ValidationError, ValidationResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{6,20}$").expect("valid phone regex"));

const EMAIL_MAX_CHARS: usize = 254;
const NAME_MAX_CHARS: usize = 120;
const SPECIALIZATION_MAX_CHARS: usize = 120;

/// Access role; selects dashboard and permitted operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    Pharmacist,
    LabTechnician,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Patient,
        Role::Doctor,
        Role::Admin,
        Role::Pharmacist,
        Role::LabTechnician,
    ];

    /// Stable storage/wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Admin => "admin",
            Self::Pharmacist => "pharmacist",
            Self::LabTechnician => "lab_technician",
        }
    }

    /// Parses a storage/wire string. Exact lowercase match only.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == value)
    }

    /// Roles a visitor may pick when signing up without an admin.
    pub fn is_self_registrable(self) -> bool {
        !matches!(self, Self::Admin)
    }
}

/// Registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    /// Meaningful for doctors only.
    pub specialization: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for creating a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

impl NewUser {
    /// Trims text fields and lowercases the email.
    pub fn normalized(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self.full_name = self.full_name.trim().to_string();
        self.phone = super::normalize_optional_text(self.phone);
        self.specialization = super::normalize_optional_text(self.specialization);
        self
    }

    pub fn validate(&self) -> ValidationResult {
        validate_email(&self.email)?;
        require_text("full_name", &self.full_name, NAME_MAX_CHARS)?;
        validate_phone(self.phone.as_deref())?;
        optional_text(
            "specialization",
            self.specialization.as_deref(),
            SPECIALIZATION_MAX_CHARS,
        )
    }
}

/// Partial profile update; `None` leaves the field unchanged.
///
/// For `phone` and `specialization`, an empty string clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub specialization: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> ValidationResult {
        if let Some(name) = self.full_name.as_deref() {
            require_text("full_name", name, NAME_MAX_CHARS)?;
        }
        validate_phone(self.phone.as_deref().filter(|phone| !phone.is_empty()))?;
        optional_text(
            "specialization",
            self.specialization.as_deref(),
            SPECIALIZATION_MAX_CHARS,
        )
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> ValidationResult {
    require_text("email", email, EMAIL_MAX_CHARS)?;
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::invalid("email", "expected name@domain.tld"));
    }
    Ok(())
}

fn validate_phone(phone: Option<&str>) -> ValidationResult {
    match phone {
        Some(value) if !PHONE_RE.is_match(value) => Err(ValidationError::invalid(
            "phone",
            "expected 6-20 digits, spaces, dashes or parentheses",
        )),
        _ => Ok(()),
    }
}
