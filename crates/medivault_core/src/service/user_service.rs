//! Registration, profiles and admin user management.
//!
//! # Invariants
//! - Self-registration never yields an admin account.
//! - Deactivating a user revokes all of its sessions.
//! - An admin cannot deactivate their own account.

use crate::auth::access::{Permission, Principal};
use crate::auth::password::{hash_password, validate_password};
use crate::model::user::{NewUser, ProfileUpdate, Role, User, UserId};
use crate::model::ValidationError;
use crate::repo::normalize_page_limit;
use crate::repo::session_repo::{SessionRepository, SqliteSessionRepository};
use crate::repo::user_repo::{SqliteUserRepository, UserListQuery, UserRepository};
use crate::repo::RepoResult;
use crate::service::{ListResult, PageRequest, ServiceError, ServiceResult};
use log::info;
use rusqlite::Connection;
use serde::Deserialize;

const DOCTOR_LIST_LIMIT: u32 = 100;

/// Sign-up / admin create input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    /// Defaults to `patient`.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
}

pub struct UserService<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
}

impl<'conn> UserService<SqliteUserRepository<'conn>, SqliteSessionRepository<'conn>> {
    pub fn from_connection(conn: &'conn Connection) -> RepoResult<Self> {
        Ok(Self::new(
            SqliteUserRepository::try_new(conn)?,
            SqliteSessionRepository::try_new(conn)?,
        ))
    }
}

impl<U: UserRepository, S: SessionRepository> UserService<U, S> {
    pub fn new(users: U, sessions: S) -> Self {
        Self { users, sessions }
    }

    /// Public sign-up. Admin role is rejected.
    pub fn register(&self, request: RegisterRequest) -> ServiceResult<User> {
        let role = request.role.unwrap_or(Role::Patient);
        if !role.is_self_registrable() {
            return Err(ServiceError::forbidden(
                "admin accounts can only be created by an administrator",
            ));
        }
        self.create(request, role)
    }

    /// Admin-only account creation for any role.
    pub fn create_user(&self, principal: &Principal, request: RegisterRequest) -> ServiceResult<User> {
        principal.require(Permission::ManageUsers)?;
        let role = request.role.unwrap_or(Role::Patient);
        self.create(request, role)
    }

    /// Creates the first admin; used by the operator CLI, no caller checks.
    pub fn bootstrap_admin(&self, email: &str, password: &str, full_name: &str) -> ServiceResult<User> {
        self.create(
            RegisterRequest {
                email: email.to_string(),
                password: password.to_string(),
                full_name: full_name.to_string(),
                role: Some(Role::Admin),
                phone: None,
                specialization: None,
            },
            Role::Admin,
        )
    }

    fn create(&self, request: RegisterRequest, role: Role) -> ServiceResult<User> {
        validate_password(&request.password)?;
        let new_user = NewUser {
            email: request.email,
            full_name: request.full_name,
            role,
            phone: request.phone,
            specialization: request.specialization,
        }
        .normalized();
        new_user.validate()?;

        let user = self
            .users
            .create_user(&new_user, &hash_password(&request.password))?;
        info!(
            "event=user_create module=service status=ok user_id={} role={}",
            user.id,
            role.as_str()
        );
        Ok(user)
    }

    pub fn profile(&self, principal: &Principal) -> ServiceResult<User> {
        self.users
            .get_user(principal.user_id)?
            .ok_or(ServiceError::NotFound {
                entity: "user",
                id: principal.user_id,
            })
    }

    pub fn update_profile(&self, principal: &Principal, update: ProfileUpdate) -> ServiceResult<User> {
        let update = ProfileUpdate {
            full_name: update.full_name.map(|value| value.trim().to_string()),
            phone: update.phone.map(|value| value.trim().to_string()),
            specialization: update.specialization.map(|value| value.trim().to_string()),
        };
        Ok(self.users.update_profile(principal.user_id, &update)?)
    }

    /// Active doctors, for booking screens.
    pub fn list_doctors(&self) -> ServiceResult<Vec<User>> {
        Ok(self.users.list_users(&UserListQuery {
            role: Some(Role::Doctor),
            active_only: true,
            limit: DOCTOR_LIST_LIMIT,
            offset: 0,
        })?)
    }

    pub fn list_users(
        &self,
        principal: &Principal,
        role: Option<Role>,
        page: PageRequest,
    ) -> ServiceResult<ListResult<User>> {
        principal.require(Permission::ManageUsers)?;
        let applied_limit = normalize_page_limit(page.limit);
        let items = self.users.list_users(&UserListQuery {
            role,
            active_only: false,
            limit: applied_limit,
            offset: page.offset,
        })?;
        Ok(ListResult {
            items,
            applied_limit,
            offset: page.offset,
        })
    }

    pub fn set_active(&self, principal: &Principal, user_id: UserId, is_active: bool) -> ServiceResult<User> {
        principal.require(Permission::ManageUsers)?;
        if user_id == principal.user_id && !is_active {
            return Err(ValidationError::invalid("user_id", "cannot deactivate your own account").into());
        }

        self.users.set_active(user_id, is_active)?;
        if !is_active {
            let revoked = self.sessions.delete_sessions_for_user(user_id)?;
            info!(
                "event=user_deactivate module=service status=ok user_id={} sessions_revoked={}",
                user_id, revoked
            );
        }

        self.users
            .get_user(user_id)?
            .ok_or(ServiceError::NotFound {
                entity: "user",
                id: user_id,
            })
    }
}
