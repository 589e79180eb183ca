//! Prescription use-cases: write, dispense, cancel.
//!
//! # Invariants
//! - Only doctors (or admins) write prescriptions, always for a patient.
//! - A linked appointment must belong to the same doctor/patient pair.
//! - Only `active` prescriptions can be dispensed or cancelled.

use crate::auth::access::{Permission, Principal};
use crate::model::notification::NotificationKind;
use crate::model::prescription::{
    Prescription, PrescriptionDraft, PrescriptionId, PrescriptionStatus,
};
use crate::model::user::Role;
use crate::model::ValidationError;
use crate::repo::appointment_repo::{AppointmentRepository, SqliteAppointmentRepository};
use crate::repo::normalize_page_limit;
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::prescription_repo::{
    PrescriptionListQuery, PrescriptionRepository, SqlitePrescriptionRepository,
};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::notification_service::{notify_best_effort, notify_role_best_effort};
use crate::service::{now_epoch_ms, Clock, ListResult, PageRequest, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;

pub struct PrescriptionService<P, A, U, N>
where
    P: PrescriptionRepository,
    A: AppointmentRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    prescriptions: P,
    appointments: A,
    users: U,
    notifications: N,
    clock: Clock,
}

impl<'conn>
    PrescriptionService<
        SqlitePrescriptionRepository<'conn>,
        SqliteAppointmentRepository<'conn>,
        SqliteUserRepository<'conn>,
        SqliteNotificationRepository<'conn>,
    >
{
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqlitePrescriptionRepository::try_new(conn)?,
            SqliteAppointmentRepository::try_new(conn)?,
            SqliteUserRepository::try_new(conn)?,
            SqliteNotificationRepository::try_new(conn)?,
        ))
    }
}

impl<P, A, U, N> PrescriptionService<P, A, U, N>
where
    P: PrescriptionRepository,
    A: AppointmentRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub fn new(prescriptions: P, appointments: A, users: U, notifications: N) -> Self {
        Self {
            prescriptions,
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

    /// Writes an active prescription; notifies the patient and every active
    /// pharmacist.
    pub fn create(&self, principal: &Principal, draft: PrescriptionDraft) -> ServiceResult<Prescription> {
        principal.require(Permission::WritePrescription)?;
        let draft = draft.normalized();
        draft.validate()?;

        let patient = self
            .users
            .get_user(draft.patient_id)?
            .ok_or(ServiceError::NotFound {
                entity: "user",
                id: draft.patient_id,
            })?;
        if patient.role != Role::Patient {
            return Err(ValidationError::invalid("patient_id", "user is not a patient").into());
        }

        if let Some(appointment_id) = draft.appointment_id {
            let appointment = self
                .appointments
                .get_appointment(appointment_id)?
                .ok_or(ServiceError::NotFound {
                    entity: "appointment",
                    id: appointment_id,
                })?;
            let doctor_matches = principal.is_admin() || appointment.doctor_id == principal.user_id;
            if appointment.patient_id != draft.patient_id || !doctor_matches {
                return Err(ValidationError::invalid(
                    "appointment_id",
                    "appointment does not belong to this doctor and patient",
                )
                .into());
            }
        }

        let prescription = draft.into_prescription(principal.user_id);
        let id = self.prescriptions.create_prescription(&prescription)?;
        let created = self.load(id)?;
        info!(
            "event=prescription_create module=service status=ok prescription_id={} doctor_id={}",
            created.id, created.doctor_id
        );

        notify_best_effort(
            &self.notifications,
            &[created.patient_id],
            NotificationKind::Prescription,
            "New prescription",
            "Your doctor has issued a new prescription.",
        );
        notify_role_best_effort(
            &self.users,
            &self.notifications,
            Role::Pharmacist,
            NotificationKind::Prescription,
            "Prescription ready to dispense",
            "A new prescription is waiting to be dispensed.",
        );
        Ok(created)
    }

    pub fn list(
        &self,
        principal: &Principal,
        status: Option<PrescriptionStatus>,
        page: PageRequest,
    ) -> ServiceResult<ListResult<Prescription>> {
        let applied_limit = normalize_page_limit(page.limit);
        let mut query = PrescriptionListQuery {
            status,
            limit: applied_limit,
            offset: page.offset,
            ..PrescriptionListQuery::default()
        };
        match principal.role {
            Role::Admin | Role::Pharmacist => {}
            Role::Patient => query.patient_id = Some(principal.user_id),
            Role::Doctor => query.doctor_id = Some(principal.user_id),
            Role::LabTechnician => {
                return Err(ServiceError::forbidden(
                    "role `lab_technician` has no access to prescriptions",
                ));
            }
        }

        let items = self.prescriptions.list_prescriptions(&query)?;
        Ok(ListResult {
            items,
            applied_limit,
            offset: page.offset,
        })
    }

    pub fn get(&self, principal: &Principal, id: PrescriptionId) -> ServiceResult<Prescription> {
        let prescription = self.load(id)?;
        let visible = match principal.role {
            Role::Admin | Role::Pharmacist => true,
            Role::Patient => prescription.patient_id == principal.user_id,
            Role::Doctor => prescription.doctor_id == principal.user_id,
            Role::LabTechnician => false,
        };
        if !visible {
            return Err(ServiceError::NotFound {
                entity: "prescription",
                id,
            });
        }
        Ok(prescription)
    }

    /// `active -> dispensed`; notifies patient and prescribing doctor.
    pub fn dispense(&self, principal: &Principal, id: PrescriptionId) -> ServiceResult<Prescription> {
        principal.require(Permission::DispensePrescription)?;
        let current = self.get(principal, id)?;
        self.check_transition(&current, PrescriptionStatus::Dispensed)?;

        self.prescriptions
            .mark_dispensed(id, principal.user_id, (self.clock)())?;
        let updated = self.load(id)?;
        info!(
            "event=prescription_dispense module=service status=ok prescription_id={} pharmacist_id={}",
            id, principal.user_id
        );

        notify_best_effort(
            &self.notifications,
            &[updated.patient_id, updated.doctor_id],
            NotificationKind::Prescription,
            "Prescription dispensed",
            "A prescription has been dispensed by the pharmacy.",
        );
        Ok(updated)
    }

    /// `active -> cancelled`; prescribing doctor or admin only.
    pub fn cancel(&self, principal: &Principal, id: PrescriptionId) -> ServiceResult<Prescription> {
        principal.require(Permission::WritePrescription)?;
        let current = self.get(principal, id)?;
        if !principal.is_admin() && current.doctor_id != principal.user_id {
            return Err(ServiceError::forbidden(
                "only the prescribing doctor may cancel a prescription",
            ));
        }
        self.check_transition(&current, PrescriptionStatus::Cancelled)?;

        self.prescriptions.mark_cancelled(id)?;
        let updated = self.load(id)?;
        info!("event=prescription_cancel module=service status=ok prescription_id={id}");

        notify_best_effort(
            &self.notifications,
            &[updated.patient_id],
            NotificationKind::Prescription,
            "Prescription cancelled",
            "One of your prescriptions has been cancelled.",
        );
        Ok(updated)
    }

    fn check_transition(&self, current: &Prescription, target: PrescriptionStatus) -> ServiceResult<()> {
        if !current.status.can_transition_to(target) {
            return Err(ServiceError::InvalidTransition {
                entity: "prescription",
                from: current.status.as_str(),
                to: target.as_str(),
            });
        }
        Ok(())
    }

    fn load(&self, id: PrescriptionId) -> ServiceResult<Prescription> {
        self.prescriptions
            .get_prescription(id)?
            .ok_or(ServiceError::NotFound {
                entity: "prescription",
                id,
            })
    }
}
