//! Salted, iterated SHA-256 password hashing.
//!
//! Encoded form: `sha256$<iterations>$<salt>$<hex digest>`. The iteration
//! count travels with the hash so it can be raised without invalidating
//! existing accounts.

use crate::model::{ValidationError, ValidationResult};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 10_000;
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 128;

/// Checks password length policy.
pub fn validate_password(password: &str) -> ValidationResult {
    let count = password.chars().count();
    if count < PASSWORD_MIN_CHARS || count > PASSWORD_MAX_CHARS {
        return Err(ValidationError::invalid(
            "password",
            format!("must be {PASSWORD_MIN_CHARS}..={PASSWORD_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

/// Hashes `password` with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, HASH_ITERATIONS);
    format!("{HASH_SCHEME}${HASH_ITERATIONS}${salt}${}", to_hex(&digest))
}

/// Verifies `password` against an encoded hash.
///
/// Malformed encodings never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != HASH_SCHEME || salt.is_empty() {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let actual = to_hex(&derive(password, salt, iterations));
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    for _ in 1..iterations {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt.as_bytes());
        digest.copy_from_slice(&hasher.finalize());
    }
    digest
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
