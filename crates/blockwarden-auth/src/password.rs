//! Password hashing.
//!
//! Thin wrappers over bcrypt so the rest of the workspace never imports it
//! directly. Both calls are CPU-bound; async callers should run them on a
//! blocking thread.

use crate::AuthError;

/// bcrypt cost for stored passwords.
pub const PASSWORD_COST: u32 = 12;

/// Hashes `password` with the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Checks `password` against a stored bcrypt hash.
///
/// Returns `Ok(false)` for a wrong password. An `Err` means the stored
/// hash itself is unreadable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(bcrypt::verify(password, hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum cost bcrypt accepts; keeps the tests fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn test_verify_password_correct_returns_true() {
        let hash = hash_password("hunter22", TEST_COST).unwrap();

        assert!(verify_password("hunter22", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_wrong_returns_false() {
        let hash = hash_password("hunter22", TEST_COST).unwrap();

        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_hash_password_salts_each_hash() {
        let a = hash_password("same", TEST_COST).unwrap();
        let b = hash_password("same", TEST_COST).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password_malformed_hash_returns_error() {
        assert!(matches!(
            verify_password("x", "not-a-bcrypt-hash"),
            Err(AuthError::Hash(_))
        ));
    }
}
