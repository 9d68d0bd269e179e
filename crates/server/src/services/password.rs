//! Password hashing with argon2.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::ServiceError;

/// Hash a password with a fresh salt.
///
/// # Errors
///
/// Returns `ServiceError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ServiceError::PasswordHash)
}

/// Whether `password` matches a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("azira").unwrap_or_default();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("azira", &hash));
        assert!(!verify_password("Azira", &hash));
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(!verify_password("azira", "not-a-hash"));
    }
}
