//! Password hashing and password policy
//!
//! Hashes are Argon2id PHC strings (algorithm, parameters and salt are
//! embedded), so stored credentials stay verifiable if the default
//! parameters of the argon2 crate change.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password with Argon2id and a fresh random salt.
///
/// ```ignore
/// use schoolnet::services::password::hash_password;
///
/// let hash = hash_password("correct horse battery")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("argon2: {}", e))
        .context("Password hashing failed")?;

    Ok(hash.to_string())
}

/// Check a plaintext password against a stored PHC hash.
///
/// A mismatch is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow!("argon2: {}", e))
        .context("Stored password hash is malformed")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("argon2: {}", e)).context("Password verification failed"),
    }
}

/// Check a new password against the configured minimum length.
///
/// Length is counted in characters, not bytes.
pub fn check_password_policy(password: &str, min_length: usize) -> Result<(), String> {
    if password.trim().is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < min_length {
        return Err(format!("Password must be at least {} characters", min_length));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let first = hash_password("staffroom-key").unwrap();
        let second = hash_password("staffroom-key").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(!first.contains("staffroom-key"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let hash = hash_password("timetable2024").unwrap();
        assert!(verify_password("timetable2024", &hash).unwrap());
        assert!(!verify_password("timetable2025", &hash).unwrap());
    }

    #[test]
    fn test_verify_unicode_password() {
        let hash = hash_password("Schulkonferenz-ü✓").unwrap();
        assert!(verify_password("Schulkonferenz-ü✓", &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash_is_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_password_policy() {
        assert!(check_password_policy("", 8).is_err());
        assert!(check_password_policy("        ", 8).is_err());
        assert!(check_password_policy("short", 8).is_err());
        assert!(check_password_policy("long enough", 8).is_ok());
        // eight characters, more than eight bytes
        assert!(check_password_policy("äöüäöüäö", 8).is_ok());
    }
}
