//! Notification inbox use-cases and best-effort fan-out.
//!
//! # Invariants
//! - `notify_best_effort` never returns an error; each failed insert is
//!   logged at `warn` and skipped. No retries, no rollback of the caller.
//! - Inbox operations only touch the caller's own notifications.

use crate::auth::access::Principal;
use crate::model::notification::{Notification, NotificationId, NotificationKind};
use crate::model::user::{Role, UserId};
use crate::repo::normalize_page_limit;
use crate::repo::notification_repo::{
    NotificationListQuery, NotificationRepository, SqliteNotificationRepository,
};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoResult;
use crate::service::{ListResult, PageRequest, ServiceResult};
use log::{debug, warn};
use rusqlite::Connection;

/// Inserts one notification per recipient, tolerating failures.
///
/// Duplicate recipients are notified once. Returns the number of
/// notifications actually stored.
pub fn notify_best_effort<N: NotificationRepository + ?Sized>(
    repo: &N,
    recipients: &[UserId],
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> usize {
    let mut delivered = 0;
    let mut seen: Vec<UserId> = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        if seen.contains(recipient) {
            continue;
        }
        seen.push(*recipient);

        let notification = Notification::new(*recipient, kind, title, message);
        match repo.create_notification(&notification) {
            Ok(_) => delivered += 1,
            Err(err) => warn!(
                "event=notification_fanout module=service status=error kind={} recipient={} error={}",
                kind.as_str(),
                recipient,
                err
            ),
        }
    }
    debug!(
        "event=notification_fanout module=service status=ok kind={} recipients={} delivered={}",
        kind.as_str(),
        seen.len(),
        delivered
    );
    delivered
}

/// Notifies every active user holding `role`, tolerating lookup failure.
pub fn notify_role_best_effort<U, N>(
    users: &U,
    notifications: &N,
    role: Role,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> usize
where
    U: UserRepository + ?Sized,
    N: NotificationRepository + ?Sized,
{
    match users.list_active_ids_by_role(role) {
        Ok(recipients) => notify_best_effort(notifications, &recipients, kind, title, message),
        Err(err) => {
            warn!(
                "event=notification_fanout module=service status=error kind={} role={} error={}",
                kind.as_str(),
                role.as_str(),
                err
            );
            0
        }
    }
}

/// Inbox service for the authenticated caller.
pub struct NotificationService<N: NotificationRepository> {
    repo: N,
}

impl<'conn> NotificationService<SqliteNotificationRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(SqliteNotificationRepository::try_new(conn)?))
    }
}

impl<N: NotificationRepository> NotificationService<N> {
    pub fn new(repo: N) -> Self {
        Self { repo }
    }

    pub fn list(
        &self,
        principal: &Principal,
        unread_only: bool,
        page: PageRequest,
    ) -> ServiceResult<ListResult<Notification>> {
        let applied_limit = normalize_page_limit(page.limit);
        let items = self.repo.list_notifications(&NotificationListQuery {
            user_id: principal.user_id,
            unread_only,
            limit: applied_limit,
            offset: page.offset,
        })?;
        Ok(ListResult {
            items,
            applied_limit,
            offset: page.offset,
        })
    }

    pub fn unread_count(&self, principal: &Principal) -> ServiceResult<u64> {
        Ok(self.repo.unread_count(principal.user_id)?)
    }

    pub fn mark_read(&self, principal: &Principal, id: NotificationId) -> ServiceResult<()> {
        Ok(self.repo.mark_read(principal.user_id, id)?)
    }

    pub fn mark_all_read(&self, principal: &Principal) -> ServiceResult<usize> {
        Ok(self.repo.mark_all_read(principal.user_id)?)
    }
}
