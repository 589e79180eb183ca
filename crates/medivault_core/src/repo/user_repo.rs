//! User repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Emails are unique case-insensitively; duplicates surface as `Conflict`.
//! - Password hashes are only returned through `find_credentials_by_email`.

use super::{
    bool_column, bool_to_int, enum_column, ensure_table_ready, is_unique_violation, uuid_column,
    RepoError, RepoResult,
};
use crate::model::user::{NewUser, ProfileUpdate, Role, User, UserId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    id,
    email,
    full_name,
    role,
    phone,
    specialization,
    is_active,
    created_at,
    updated_at
FROM users";

const USER_COLUMNS: &[&str] = &[
    "id",
    "email",
    "password_hash",
    "full_name",
    "role",
    "phone",
    "specialization",
    "is_active",
    "created_at",
    "updated_at",
];

/// Query options for listing users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub active_only: bool,
    pub limit: u32,
    pub offset: u32,
}

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &NewUser, password_hash: &str) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Returns the user and its encoded password hash.
    fn find_credentials_by_email(&self, email: &str) -> RepoResult<Option<(User, String)>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
    fn list_active_ids_by_role(&self, role: Role) -> RepoResult<Vec<UserId>>;
    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User>;
    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_ready(conn, "users", USER_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser, password_hash: &str) -> RepoResult<User> {
        user.validate()?;
        let id = Uuid::new_v4();

        let inserted = self.conn.execute(
            "INSERT INTO users (
                id,
                email,
                password_hash,
                full_name,
                role,
                phone,
                specialization
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                user.email.as_str(),
                password_hash,
                user.full_name.as_str(),
                user.role.as_str(),
                user.phone.as_deref(),
                user.specialization.as_deref(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::Conflict(format!(
                    "email already registered: {}",
                    user.email
                )));
            }
            Err(err) => return Err(err.into()),
        }

        self.get_user(id)?.ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn find_credentials_by_email(&self, email: &str) -> RepoResult<Option<(User, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                email,
                password_hash,
                full_name,
                role,
                phone,
                specialization,
                is_active,
                created_at,
                updated_at
             FROM users
             WHERE email = ?1 COLLATE NOCASE;",
        )?;
        let mut rows = stmt.query([email.trim()])?;
        if let Some(row) = rows.next()? {
            let hash: String = row.get("password_hash")?;
            return Ok(Some((parse_user_row(row)?, hash)));
        }
        Ok(None)
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(role) = query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }
        if query.active_only {
            sql.push_str(" AND is_active = 1");
        }

        sql.push_str(" ORDER BY full_name COLLATE NOCASE ASC, id ASC LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn list_active_ids_by_role(&self, role: Role) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM users WHERE role = ?1 AND is_active = 1 ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([role.as_str()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(uuid_column(row, "users", "id")?);
        }
        Ok(ids)
    }

    fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> RepoResult<User> {
        update.validate()?;

        let changed = self.conn.execute(
            "UPDATE users
             SET
                full_name = COALESCE(?2, full_name),
                phone = CASE WHEN ?3 IS NULL THEN phone ELSE NULLIF(?3, '') END,
                specialization = CASE WHEN ?4 IS NULL THEN specialization ELSE NULLIF(?4, '') END,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                update.full_name.as_deref(),
                update.phone.as_deref(),
                update.specialization.as_deref(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }

        self.get_user(id)?.ok_or(RepoError::NotFound { entity: "user", id })
    }

    fn set_active(&self, id: UserId, is_active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                is_active = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(is_active)],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    Ok(User {
        id: uuid_column(row, "users", "id")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        role: enum_column(row, "users", "role", Role::parse)?,
        phone: row.get("phone")?,
        specialization: row.get("specialization")?,
        is_active: bool_column(row, "users", "is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
