//! Login session persistence.
//!
//! Sessions are opaque bearer tokens with an absolute expiry. Callers pass
//! `now` explicitly so expiry checks stay deterministic under test.

use super::{ensure_table_ready, uuid_column, RepoResult};
use crate::model::user::UserId;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

const SESSION_COLUMNS: &[&str] = &["token", "user_id", "created_at", "expires_at"];

/// Persisted login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub created_at: i64,
    pub expires_at: i64,
}

pub trait SessionRepository {
    fn create_session(&self, user_id: UserId, now: i64, ttl_ms: i64) -> RepoResult<Session>;
    /// Returns the session when it exists and `expires_at > now`.
    fn find_live_session(&self, token: &str, now: i64) -> RepoResult<Option<Session>>;
    /// Returns whether a session row was removed.
    fn delete_session(&self, token: &str) -> RepoResult<bool>;
    fn delete_sessions_for_user(&self, user_id: UserId) -> RepoResult<usize>;
    fn purge_expired(&self, now: i64) -> RepoResult<usize>;
}

pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "sessions", SESSION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(&self, user_id: UserId, now: i64, ttl_ms: i64) -> RepoResult<Session> {
        let session = Session {
            token: generate_token(),
            user_id,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        };
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                session.token.as_str(),
                session.user_id.to_string(),
                session.created_at,
                session.expires_at,
            ],
        )?;
        Ok(session)
    }

    fn find_live_session(&self, token: &str, now: i64) -> RepoResult<Option<Session>> {
        let mut stmt = self.conn.prepare(
            "SELECT token, user_id, created_at, expires_at
             FROM sessions
             WHERE token = ?1
               AND expires_at > ?2;",
        )?;
        let mut rows = stmt.query(params![token, now])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Session {
                token: row.get("token")?,
                user_id: uuid_column(row, "sessions", "user_id")?,
                created_at: row.get("created_at")?,
                expires_at: row.get("expires_at")?,
            }));
        }
        Ok(None)
    }

    fn delete_session(&self, token: &str) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(removed > 0)
    }

    fn delete_sessions_for_user(&self, user_id: UserId) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1;",
            [user_id.to_string()],
        )?;
        Ok(removed)
    }

    fn purge_expired(&self, now: i64) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1;", [now])?;
        Ok(removed)
    }
}

/// 64 hex chars drawn from two v4 UUIDs.
fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
