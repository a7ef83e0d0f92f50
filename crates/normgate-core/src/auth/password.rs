//! Password strength rules and Argon2 hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use normgate_error::GatewayError;

const SYMBOLS: &str = r##"!@#$%^&*()_+-=[]{};':"\|,.<>/?~`"##;

/// Validate password strength: >= 12 chars with upper, lower, digit and a
/// symbol.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 12 {
        return Err("密码长度必须大于等于12个字符".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("密码必须包含大写字母".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("密码必须包含小写字母".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("密码必须包含数字".to_string());
    }
    if !password.chars().any(|c| SYMBOLS.contains(c)) {
        return Err("密码必须包含特殊字符".to_string());
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, GatewayError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::internal(format!("password hashing failed: {e}")))
}

/// Verify a password against a stored hash. Malformed hashes count as a
/// mismatch rather than an error so login stays uniform.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_boundary() {
        // 11 chars with all classes -> rejected; 12 -> accepted.
        assert!(validate_password("Aa1!aaaaaaa").is_err());
        assert!(validate_password("Aa1!aaaaaaaa").is_ok());
    }

    #[test]
    fn test_each_class_is_required() {
        assert!(validate_password("aa1!aaaaaaaa").is_err()); // no upper
        assert!(validate_password("AA1!AAAAAAAA").is_err()); // no lower
        assert!(validate_password("Aab!aaaaaaaa").is_err()); // no digit
        assert!(validate_password("Aa1aaaaaaaaa").is_err()); // no symbol
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("Password123!@#$").unwrap();
        assert!(verify_password("Password123!@#$", &hash));
        assert!(!verify_password("Password123!@#x", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("Password123!@#$").unwrap();
        let b = hash_password("Password123!@#$").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-hash"));
    }
}
