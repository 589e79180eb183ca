//! Admin reporting: aggregate counts and schema introspection.

use crate::auth::access::{Permission, Principal};
use crate::model::appointment::AppointmentStatus;
use crate::model::lab_test::LabTestStatus;
use crate::model::prescription::PrescriptionStatus;
use crate::model::user::Role;
use crate::repo::report_repo::{ReportRepository, SqliteReportRepository, TableSchema};
use crate::repo::RepoResult;
use crate::service::{now_epoch_ms, Clock, ServiceResult};
use log::debug;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// System-wide counts. Every known role/status key is present, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub active_users_by_role: BTreeMap<String, u64>,
    pub appointments_by_status: BTreeMap<String, u64>,
    pub prescriptions_by_status: BTreeMap<String, u64>,
    pub lab_tests_by_status: BTreeMap<String, u64>,
    pub unread_notifications: u64,
    pub generated_at: i64,
}

pub struct ReportService<R: ReportRepository> {
    repo: R,
    clock: Clock,
}

impl<'conn> ReportService<SqliteReportRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(SqliteReportRepository::try_new(conn)?))
    }
}

impl<R: ReportRepository> ReportService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            clock: now_epoch_ms,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn summary(&self, principal: &Principal) -> ServiceResult<ReportSummary> {
        principal.require(Permission::ViewReports)?;

        let summary = ReportSummary {
            active_users_by_role: zero_filled(
                Role::ALL.iter().map(|role| role.as_str()),
                self.repo.count_active_users_by_role()?,
            ),
            appointments_by_status: zero_filled(
                AppointmentStatus::ALL.iter().map(|status| status.as_str()),
                self.repo.count_appointments_by_status()?,
            ),
            prescriptions_by_status: zero_filled(
                PrescriptionStatus::ALL.iter().map(|status| status.as_str()),
                self.repo.count_prescriptions_by_status()?,
            ),
            lab_tests_by_status: zero_filled(
                LabTestStatus::ALL.iter().map(|status| status.as_str()),
                self.repo.count_lab_tests_by_status()?,
            ),
            unread_notifications: self.repo.count_unread_notifications()?,
            generated_at: (self.clock)(),
        };
        debug!("event=report_summary module=service status=ok");
        Ok(summary)
    }

    pub fn schema(&self, principal: &Principal) -> ServiceResult<Vec<TableSchema>> {
        principal.require(Permission::ViewReports)?;
        Ok(self.repo.describe_tables()?)
    }
}

fn zero_filled<'a>(
    keys: impl Iterator<Item = &'a str>,
    counts: Vec<(String, u64)>,
) -> BTreeMap<String, u64> {
    let mut map: BTreeMap<String, u64> = keys.map(|key| (key.to_string(), 0)).collect();
    for (key, count) in counts {
        map.insert(key, count);
    }
    map
}
