//! Authentication and authorization primitives.
//!
//! # Responsibility
//! - Hash and verify passwords.
//! - Map roles onto permissions and check them for an authenticated caller.
//!
//! Session persistence lives in `repo::session_repo`; login/logout flows in
//! `service::auth_service`.

pub mod access;
pub mod password;
