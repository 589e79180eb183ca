//! Core domain logic for MediVault.
//! This crate is the single source of truth for roles, lifecycles and
//! record visibility; the HTTP and CLI crates only adapt it.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::access::{AccessDenied, Permission, Principal};
pub use crate::config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget, LoggingError,
};
pub use model::appointment::{Appointment, AppointmentId, AppointmentStatus};
pub use model::lab_test::{LabTest, LabTestId, LabTestStatus};
pub use model::notification::{Notification, NotificationId, NotificationKind};
pub use model::prescription::{Prescription, PrescriptionId, PrescriptionStatus};
pub use model::user::{Role, User, UserId};
pub use model::ValidationError;
pub use repo::{RepoError, RepoResult};
pub use service::appointment_service::{AppointmentService, BookAppointmentRequest};
pub use service::auth_service::{AuthContext, AuthService, LoginOutcome};
pub use service::lab_test_service::{LabTestService, OrderLabTestRequest};
pub use service::notification_service::NotificationService;
pub use service::prescription_service::PrescriptionService;
pub use service::report_service::{ReportService, ReportSummary};
pub use service::user_service::{RegisterRequest, UserService};
pub use service::{ListResult, PageRequest, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
