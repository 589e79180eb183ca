//! Appointment scheduling use-cases.
//!
//! # Responsibility
//! - Book appointments with doctor/slot checks.
//! - Scope listing and reads to the caller's role.
//! - Drive the status lifecycle and fan out notifications.
//!
//! # Invariants
//! - Status changes follow `AppointmentStatus::can_transition_to`.
//! - Patients may only request cancellation (or cancel while pending).
//! - Doctors may only act on appointments assigned to them.
//! - Records outside the caller's scope read as not found.

use crate::auth::access::{Permission, Principal};
use crate::model::appointment::{
    validate_notes, Appointment, AppointmentId, AppointmentStatus, APPOINTMENT_SLOT_MS,
};
use crate::model::notification::NotificationKind;
use crate::model::user::{Role, UserId};
use crate::model::{normalize_optional_text, ValidationError};
use crate::repo::appointment_repo::{
    AppointmentListQuery, AppointmentRepository, SqliteAppointmentRepository,
};
use crate::repo::normalize_page_limit;
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::notification_service::notify_best_effort;
use crate::service::{now_epoch_ms, Clock, ListResult, PageRequest, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde::Deserialize;

/// Booking input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookAppointmentRequest {
    /// Required when an admin books on behalf of a patient; ignored otherwise.
    #[serde(default)]
    pub patient_id: Option<UserId>,
    pub doctor_id: UserId,
    /// Start time, epoch milliseconds.
    pub scheduled_at: i64,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct AppointmentService<A, U, N>
where
    A: AppointmentRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    appointments: A,
    users: U,
    notifications: N,
    clock: Clock,
}

impl<'conn>
    AppointmentService<
        SqliteAppointmentRepository<'conn>,
        SqliteUserRepository<'conn>,
        SqliteNotificationRepository<'conn>,
    >
{
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteAppointmentRepository::try_new(conn)?,
            SqliteUserRepository::try_new(conn)?,
            SqliteNotificationRepository::try_new(conn)?,
        ))
    }
}

impl<A, U, N> AppointmentService<A, U, N>
where
    A: AppointmentRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub fn new(appointments: A, users: U, notifications: N) -> Self {
        Self {
            appointments,
            users,
            notifications,
            clock: now_epoch_ms,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Books a pending appointment and notifies the doctor.
    pub fn book(
        &self,
        principal: &Principal,
        request: BookAppointmentRequest,
    ) -> ServiceResult<Appointment> {
        principal.require(Permission::BookAppointment)?;

        let patient_id = if principal.is_admin() {
            request.patient_id.ok_or_else(|| {
                ValidationError::invalid("patient_id", "required when booking on behalf of a patient")
            })?
        } else {
            principal.user_id
        };
        self.require_user_with_role(patient_id, Role::Patient, "patient_id")?;
        self.require_user_with_role(request.doctor_id, Role::Doctor, "doctor_id")?;

        if request.scheduled_at <= (self.clock)() {
            return Err(ValidationError::invalid("scheduled_at", "must be in the future").into());
        }

        let mut appointment = Appointment::new(
            patient_id,
            request.doctor_id,
            request.scheduled_at,
            request.reason.trim(),
        );
        appointment.notes = normalize_optional_text(request.notes);
        appointment.validate()?;

        if let Some(existing) = self.appointments.find_slot_conflict(
            appointment.doctor_id,
            appointment.scheduled_at,
            APPOINTMENT_SLOT_MS,
        )? {
            return Err(ServiceError::Conflict(format!(
                "doctor already has appointment {existing} within 30 minutes of the requested time"
            )));
        }

        let id = self.appointments.create_appointment(&appointment)?;
        let created = self.load(id)?;
        info!(
            "event=appointment_book module=service status=ok appointment_id={} doctor_id={}",
            created.id, created.doctor_id
        );

        notify_best_effort(
            &self.notifications,
            &[created.doctor_id],
            NotificationKind::Appointment,
            "New appointment request",
            "A patient requested an appointment with you.",
        );
        Ok(created)
    }

    /// Lists appointments visible to the caller.
    pub fn list(
        &self,
        principal: &Principal,
        status: Option<AppointmentStatus>,
        page: PageRequest,
    ) -> ServiceResult<ListResult<Appointment>> {
        let applied_limit = normalize_page_limit(page.limit);
        let mut query = AppointmentListQuery {
            status,
            limit: applied_limit,
            offset: page.offset,
            ..AppointmentListQuery::default()
        };
        match principal.role {
            Role::Admin => {}
            Role::Patient => query.patient_id = Some(principal.user_id),
            Role::Doctor => query.doctor_id = Some(principal.user_id),
            Role::Pharmacist | Role::LabTechnician => {
                return Err(ServiceError::forbidden(format!(
                    "role `{}` has no access to appointments",
                    principal.role.as_str()
                )));
            }
        }

        let items = self.appointments.list_appointments(&query)?;
        Ok(ListResult {
            items,
            applied_limit,
            offset: page.offset,
        })
    }

    pub fn get(&self, principal: &Principal, id: AppointmentId) -> ServiceResult<Appointment> {
        let appointment = self.load(id)?;
        if !principal.can(Permission::ManageAllAppointments)
            && !appointment.involves(principal.user_id)
        {
            return Err(ServiceError::NotFound {
                entity: "appointment",
                id,
            });
        }
        Ok(appointment)
    }

    /// Moves an appointment to `target` on behalf of the caller.
    pub fn update_status(
        &self,
        principal: &Principal,
        id: AppointmentId,
        target: AppointmentStatus,
        notes: Option<String>,
    ) -> ServiceResult<Appointment> {
        let current = self.get(principal, id)?;
        if !current.status.can_transition_to(target) {
            return Err(ServiceError::InvalidTransition {
                entity: "appointment",
                from: current.status.as_str(),
                to: target.as_str(),
            });
        }
        authorize_transition(principal, &current, target)?;

        let notes = normalize_optional_text(notes);
        validate_notes(notes.as_deref())?;
        self.appointments
            .update_status(id, current.status, target, notes.as_deref())?;
        let updated = self.load(id)?;
        info!(
            "event=appointment_status module=service status=ok appointment_id={} from={} to={} actor_role={}",
            id,
            current.status.as_str(),
            target.as_str(),
            principal.role.as_str()
        );

        let recipient = match principal.role {
            Role::Patient => updated.doctor_id,
            _ => updated.patient_id,
        };
        let (title, message) = status_message(target);
        notify_best_effort(
            &self.notifications,
            &[recipient],
            NotificationKind::Appointment,
            title,
            message,
        );
        Ok(updated)
    }

    fn load(&self, id: AppointmentId) -> ServiceResult<Appointment> {
        self.appointments
            .get_appointment(id)?
            .ok_or(ServiceError::NotFound {
                entity: "appointment",
                id,
            })
    }

    fn require_user_with_role(
        &self,
        user_id: UserId,
        role: Role,
        field: &'static str,
    ) -> ServiceResult<()> {
        let user = self.users.get_user(user_id)?.ok_or(ServiceError::NotFound {
            entity: "user",
            id: user_id,
        })?;
        if user.role != role || !user.is_active {
            return Err(ValidationError::invalid(
                field,
                format!("user {user_id} is not an active {}", role.as_str()),
            )
            .into());
        }
        Ok(())
    }
}

fn authorize_transition(
    principal: &Principal,
    appointment: &Appointment,
    target: AppointmentStatus,
) -> ServiceResult<()> {
    let allowed = match principal.role {
        Role::Admin => principal.can(Permission::ManageAllAppointments),
        Role::Patient => {
            appointment.patient_id == principal.user_id
                && principal.can(Permission::RequestCancellation)
                && (target == AppointmentStatus::CancelRequested
                    || (target == AppointmentStatus::Cancelled
                        && appointment.status == AppointmentStatus::Pending))
        }
        Role::Doctor => {
            appointment.doctor_id == principal.user_id
                && principal.can(Permission::ManageOwnAppointments)
                && matches!(
                    target,
                    AppointmentStatus::Confirmed
                        | AppointmentStatus::Completed
                        | AppointmentStatus::Cancelled
                )
        }
        Role::Pharmacist | Role::LabTechnician => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "role `{}` may not set appointment status to `{}`",
            principal.role.as_str(),
            target.as_str()
        )))
    }
}

fn status_message(status: AppointmentStatus) -> (&'static str, &'static str) {
    match status {
        AppointmentStatus::Pending => ("Appointment pending", "Your appointment is pending."),
        AppointmentStatus::Confirmed => (
            "Appointment confirmed",
            "Your appointment has been confirmed.",
        ),
        AppointmentStatus::Completed => (
            "Appointment completed",
            "Your appointment has been marked as completed.",
        ),
        AppointmentStatus::Cancelled => (
            "Appointment cancelled",
            "An appointment has been cancelled.",
        ),
        AppointmentStatus::CancelRequested => (
            "Cancellation requested",
            "Cancellation has been requested for an appointment.",
        ),
    }
}
