//! Login, logout and bearer-token authentication.
//!
//! # Invariants
//! - Unknown email and wrong password produce the same error.
//! - Deactivated accounts can neither log in nor use existing sessions.
//! - Tokens are never logged.

use crate::auth::access::Principal;
use crate::auth::password::verify_password;
use crate::model::user::{normalize_email, User};
use crate::repo::session_repo::{Session, SessionRepository, SqliteSessionRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::RepoResult;
use crate::service::{now_epoch_ms, Clock, ServiceError, ServiceResult};
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;

const INVALID_CREDENTIALS: &str = "invalid email or password";
const INVALID_SESSION: &str = "session is missing, invalid or expired";
const ACCOUNT_DISABLED: &str = "account is deactivated";

/// Successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

/// Resolved caller of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: Principal,
    pub user: User,
    pub session: Session,
}

pub struct AuthService<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
    session_ttl_ms: i64,
    clock: Clock,
}

impl<'conn> AuthService<SqliteUserRepository<'conn>, SqliteSessionRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection, session_ttl_ms: i64) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqliteSessionRepository::try_new(conn)?,
            session_ttl_ms,
        ))
    }
}

impl<U: UserRepository, S: SessionRepository> AuthService<U, S> {
    pub fn new(users: U, sessions: S, session_ttl_ms: i64) -> Self {
        Self {
            users,
            sessions,
            session_ttl_ms,
            clock: now_epoch_ms,
        }
    }

    /// Replaces the wall clock (tests drive session expiry with this).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn login(&self, email: &str, password: &str) -> ServiceResult<LoginOutcome> {
        let email = normalize_email(email);
        let Some((user, password_hash)) = self.users.find_credentials_by_email(&email)? else {
            warn!("event=auth_login module=service status=error error_code=unknown_email");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
        };

        if !verify_password(password, &password_hash) {
            warn!(
                "event=auth_login module=service status=error error_code=bad_password user_id={}",
                user.id
            );
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
        }
        if !user.is_active {
            warn!(
                "event=auth_login module=service status=error error_code=inactive user_id={}",
                user.id
            );
            return Err(ServiceError::Unauthorized(ACCOUNT_DISABLED));
        }

        let session = self
            .sessions
            .create_session(user.id, (self.clock)(), self.session_ttl_ms)?;
        info!(
            "event=auth_login module=service status=ok user_id={} role={}",
            user.id,
            user.role.as_str()
        );
        Ok(LoginOutcome {
            token: session.token,
            expires_at: session.expires_at,
            user,
        })
    }

    /// Ends the session behind `token`. Unknown tokens are a no-op.
    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        let removed = self.sessions.delete_session(token)?;
        info!("event=auth_logout module=service status=ok removed={removed}");
        Ok(())
    }

    /// Resolves a bearer token into the calling user.
    pub fn authenticate(&self, token: &str) -> ServiceResult<AuthContext> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::Unauthorized(INVALID_SESSION));
        }

        let session = self
            .sessions
            .find_live_session(token, (self.clock)())?
            .ok_or(ServiceError::Unauthorized(INVALID_SESSION))?;
        let user = self
            .users
            .get_user(session.user_id)?
            .ok_or(ServiceError::Unauthorized(INVALID_SESSION))?;
        if !user.is_active {
            return Err(ServiceError::Unauthorized(ACCOUNT_DISABLED));
        }

        Ok(AuthContext {
            principal: Principal::new(user.id, user.role),
            user,
            session,
        })
    }

    /// Deletes expired sessions; returns how many were removed.
    pub fn purge_expired_sessions(&self) -> ServiceResult<usize> {
        let removed = self.sessions.purge_expired((self.clock)())?;
        if removed > 0 {
            info!("event=session_purge module=service status=ok removed={removed}");
        }
        Ok(removed)
    }
}
