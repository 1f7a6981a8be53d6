// Password hashing using Argon2id
// Decision: Use Argon2id with default parameters
// Decision: Unknown accounts still pay for one verification so login timing does not reveal them

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Verify against the stored hash, or burn equivalent time when there is none.
/// Always false for accounts without a password.
pub fn verify_password_or_dummy(password: &str, hash: Option<&str>) -> Result<bool> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();

    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            let dummy = match DUMMY_HASH.get() {
                Some(h) => h,
                None => {
                    let h = hash_password("dummy-password-for-timing")?;
                    DUMMY_HASH.get_or_init(|| h)
                }
            };
            let _ = verify_password(password, dummy)?;
            Ok(false)
        }
    }
}

/// Password policy check. Returns the violation message, if any.
pub fn password_policy_violation(password: &str) -> Option<String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        Some(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters"
        ))
    } else if len > MAX_PASSWORD_LENGTH {
        Some(format!("must be at most {MAX_PASSWORD_LENGTH} characters"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "my-secure-password-123!";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_different_salts() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();

        assert_ne!(hash1, hash2);
        assert!(hash1.starts_with("$argon2id$"));
    }

    #[test]
    fn test_dummy_verification_never_succeeds() {
        assert!(!verify_password_or_dummy("dummy-password-for-timing", None).unwrap());

        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password_or_dummy("correct horse", Some(&hash)).unwrap());
    }

    #[test]
    fn test_password_policy() {
        assert!(password_policy_violation("short").is_some());
        assert!(password_policy_violation("long enough").is_none());
        assert!(password_policy_violation(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_some());
    }
}
