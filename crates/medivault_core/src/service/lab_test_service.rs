//! Lab test use-cases: order, process, record results, cancel.
//!
//! # Invariants
//! - Processing follows `ordered -> in_progress -> completed`.
//! - Results are recorded only by the technician who started the test
//!   (or an admin).

use crate::auth::access::{Permission, Principal};
use crate::model::lab_test::{validate_result, LabTest, LabTestId, LabTestStatus};
use crate::model::notification::NotificationKind;
use crate::model::user::{Role, UserId};
use crate::model::{normalize_optional_text, ValidationError};
use crate::repo::lab_test_repo::{LabTestListQuery, LabTestRepository, SqliteLabTestRepository};
use crate::repo::normalize_page_limit;
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::notification_service::{notify_best_effort, notify_role_best_effort};
use crate::service::{now_epoch_ms, Clock, ListResult, PageRequest, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderLabTestRequest {
    pub patient_id: UserId,
    pub test_name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct LabTestService<L, U, N>
where
    L: LabTestRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    lab_tests: L,
    users: U,
    notifications: N,
    clock: Clock,
}

impl<'conn>
    LabTestService<
        SqliteLabTestRepository<'conn>,
        SqliteUserRepository<'conn>,
        SqliteNotificationRepository<'conn>,
    >
{
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteLabTestRepository::try_new(conn)?,
            SqliteUserRepository::try_new(conn)?,
            SqliteNotificationRepository::try_new(conn)?,
        ))
    }
}

impl<L, U, N> LabTestService<L, U, N>
where
    L: LabTestRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub fn new(lab_tests: L, users: U, notifications: N) -> Self {
        Self {
            lab_tests,
            users,
            notifications,
            clock: now_epoch_ms,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Orders a test for a patient and alerts every active lab technician.
    pub fn order(&self, principal: &Principal, request: OrderLabTestRequest) -> ServiceResult<LabTest> {
        principal.require(Permission::OrderLabTest)?;

        let patient = self
            .users
            .get_user(request.patient_id)?
            .ok_or(ServiceError::NotFound {
                entity: "user",
                id: request.patient_id,
            })?;
        if patient.role != Role::Patient {
            return Err(ValidationError::invalid("patient_id", "user is not a patient").into());
        }

        let mut test = LabTest::new(patient.id, principal.user_id, request.test_name.trim());
        test.notes = normalize_optional_text(request.notes);
        test.validate()?;

        let id = self.lab_tests.create_lab_test(&test)?;
        let created = self.load(id)?;
        info!(
            "event=lab_test_order module=service status=ok lab_test_id={} doctor_id={}",
            created.id, created.doctor_id
        );

        notify_role_best_effort(
            &self.users,
            &self.notifications,
            Role::LabTechnician,
            NotificationKind::LabTest,
            "New lab test ordered",
            "A new lab test is waiting to be processed.",
        );
        Ok(created)
    }

    pub fn list(
        &self,
        principal: &Principal,
        status: Option<LabTestStatus>,
        page: PageRequest,
    ) -> ServiceResult<ListResult<LabTest>> {
        let applied_limit = normalize_page_limit(page.limit);
        let mut query = LabTestListQuery {
            status,
            limit: applied_limit,
            offset: page.offset,
            ..LabTestListQuery::default()
        };
        match principal.role {
            Role::Admin | Role::LabTechnician => {}
            Role::Patient => query.patient_id = Some(principal.user_id),
            Role::Doctor => query.doctor_id = Some(principal.user_id),
            Role::Pharmacist => {
                return Err(ServiceError::forbidden(
                    "role `pharmacist` has no access to lab tests",
                ));
            }
        }

        let items = self.lab_tests.list_lab_tests(&query)?;
        Ok(ListResult {
            items,
            applied_limit,
            offset: page.offset,
        })
    }

    pub fn get(&self, principal: &Principal, id: LabTestId) -> ServiceResult<LabTest> {
        let test = self.load(id)?;
        let visible = match principal.role {
            Role::Admin | Role::LabTechnician => true,
            Role::Patient => test.patient_id == principal.user_id,
            Role::Doctor => test.doctor_id == principal.user_id,
            Role::Pharmacist => false,
        };
        if !visible {
            return Err(ServiceError::NotFound {
                entity: "lab test",
                id,
            });
        }
        Ok(test)
    }

    /// `ordered -> in_progress`; the caller becomes the assigned technician.
    pub fn start(&self, principal: &Principal, id: LabTestId) -> ServiceResult<LabTest> {
        principal.require(Permission::ProcessLabTest)?;
        let current = self.get(principal, id)?;
        check_transition(&current, LabTestStatus::InProgress)?;

        self.lab_tests.mark_started(id, principal.user_id)?;
        info!(
            "event=lab_test_start module=service status=ok lab_test_id={} technician_id={}",
            id, principal.user_id
        );
        self.load(id)
    }

    /// `in_progress -> completed`; notifies patient and ordering doctor.
    pub fn record_result(
        &self,
        principal: &Principal,
        id: LabTestId,
        result: &str,
    ) -> ServiceResult<LabTest> {
        principal.require(Permission::ProcessLabTest)?;
        let current = self.get(principal, id)?;
        if !principal.is_admin() && current.technician_id != Some(principal.user_id) {
            return Err(ServiceError::forbidden(
                "only the assigned technician may record a result",
            ));
        }
        check_transition(&current, LabTestStatus::Completed)?;

        let result = result.trim();
        validate_result(result)?;
        self.lab_tests
            .mark_completed(id, result, (self.clock)())?;
        let updated = self.load(id)?;
        info!("event=lab_test_complete module=service status=ok lab_test_id={id}");

        notify_best_effort(
            &self.notifications,
            &[updated.patient_id, updated.doctor_id],
            NotificationKind::LabTest,
            "Lab result available",
            "A lab test result has been recorded.",
        );
        Ok(updated)
    }

    /// `ordered|in_progress -> cancelled`; ordering doctor or admin only.
    pub fn cancel(&self, principal: &Principal, id: LabTestId) -> ServiceResult<LabTest> {
        principal.require(Permission::OrderLabTest)?;
        let current = self.get(principal, id)?;
        if !principal.is_admin() && current.doctor_id != principal.user_id {
            return Err(ServiceError::forbidden(
                "only the ordering doctor may cancel a lab test",
            ));
        }
        check_transition(&current, LabTestStatus::Cancelled)?;

        self.lab_tests.mark_cancelled(id, current.status)?;
        let updated = self.load(id)?;
        info!("event=lab_test_cancel module=service status=ok lab_test_id={id}");

        notify_best_effort(
            &self.notifications,
            &[updated.patient_id],
            NotificationKind::LabTest,
            "Lab test cancelled",
            "One of your lab tests has been cancelled.",
        );
        Ok(updated)
    }

    fn load(&self, id: LabTestId) -> ServiceResult<LabTest> {
        self.lab_tests
            .get_lab_test(id)?
            .ok_or(ServiceError::NotFound {
                entity: "lab test",
                id,
            })
    }
}

fn check_transition(current: &LabTest, target: LabTestStatus) -> ServiceResult<()> {
    if !current.status.can_transition_to(target) {
        return Err(ServiceError::InvalidTransition {
            entity: "lab test",
            from: current.status.as_str(),
            to: target.as_str(),
        });
    }
    Ok(())
}
