#![allow(dead_code)]

use medivault_core::{Principal, RegisterRequest, Role, User, UserService};
use rusqlite::Connection;

/// 2100-01-01T00:00:00Z; always in the future for booking checks.
pub const FUTURE_MS: i64 = 4_102_444_800_000;
pub const PASSWORD: &str = "correct-horse-9";

/// Creates an account with `role` and returns it with its principal.
pub fn create_user(conn: &Connection, role: Role, email: &str) -> (User, Principal) {
    let users = UserService::from_connection(conn).unwrap();
    let user = if role == Role::Admin {
        users.bootstrap_admin(email, PASSWORD, "Admin User").unwrap()
    } else {
        users
            .register(RegisterRequest {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                full_name: format!("{} user", role.as_str()),
                role: Some(role),
                phone: None,
                specialization: None,
            })
            .unwrap()
    };
    let principal = Principal::new(user.id, user.role);
    (user, principal)
}

pub fn unread(conn: &Connection, principal: &Principal) -> u64 {
    medivault_core::NotificationService::from_connection(conn)
        .unwrap()
        .unread_count(principal)
        .unwrap()
}
