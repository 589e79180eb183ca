//! Notification repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Every read/write is scoped to the owning `user_id`; another user's
//!   notification is indistinguishable from a missing one.
//! - List order is newest first (`created_at DESC, rowid DESC`).

use super::{
    bool_column, enum_column, ensure_table_ready, uuid_column, RepoError, RepoResult,
};
use crate::model::notification::{Notification, NotificationId, NotificationKind};
use crate::model::user::UserId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NOTIFICATION_COLUMNS: &[&str] = &[
    "id",
    "user_id",
    "kind",
    "title",
    "message",
    "is_read",
    "created_at",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationListQuery {
    pub user_id: UserId,
    pub unread_only: bool,
    pub limit: u32,
    pub offset: u32,
}

pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId>;
    fn list_notifications(&self, query: &NotificationListQuery) -> RepoResult<Vec<Notification>>;
    fn unread_count(&self, user_id: UserId) -> RepoResult<u64>;
    fn mark_read(&self, user_id: UserId, id: NotificationId) -> RepoResult<()>;
    /// Returns how many notifications flipped to read.
    fn mark_all_read(&self, user_id: UserId) -> RepoResult<usize>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "notifications", NOTIFICATION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<NotificationId> {
        notification.validate()?;

        self.conn.execute(
            "INSERT INTO notifications (id, user_id, kind, title, message)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title.as_str(),
                notification.message.as_str(),
            ],
        )?;
        Ok(notification.id)
    }

    fn list_notifications(&self, query: &NotificationListQuery) -> RepoResult<Vec<Notification>> {
        let mut sql = String::from(
            "SELECT id, user_id, kind, title, message, is_read, created_at
             FROM notifications
             WHERE user_id = ?",
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(query.user_id.to_string())];

        if query.unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn unread_count(&self, user_id: UserId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0;",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn mark_read(&self, user_id: UserId, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE id = ?1
               AND user_id = ?2;",
            params![id.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "notification",
                id,
            });
        }
        Ok(())
    }

    fn mark_all_read(&self, user_id: UserId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0;",
            [user_id.to_string()],
        )?;
        Ok(changed)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    Ok(Notification {
        id: uuid_column(row, "notifications", "id")?,
        user_id: uuid_column(row, "notifications", "user_id")?,
        kind: enum_column(row, "notifications", "kind", NotificationKind::parse)?,
        title: row.get("title")?,
        message: row.get("message")?,
        is_read: bool_column(row, "notifications", "is_read")?,
        created_at: row.get("created_at")?,
    })
}
