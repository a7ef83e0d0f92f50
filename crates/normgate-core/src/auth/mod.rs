//! Identity primitives: credential validation rules, password hashing,
//! JWT issue/verify, and the in-memory revoked-token set.

mod jwt;
mod password;
mod revoked;

pub use jwt::{issue_token, verify_token, Claims};
pub use password::{hash_password, validate_password, verify_password};
pub use revoked::RevokedTokens;

use base64::Engine;
use rand::RngCore;
use regex::Regex;
use std::sync::OnceLock;

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("static regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

/// Validate a username: 3-20 chars, letters/digits/underscore only.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.chars().count() < 3 || username.chars().count() > 20 {
        return Err("用户名长度必须在3-20个字符之间".to_string());
    }
    if !username_re().is_match(username) {
        return Err("用户名只能包含字母、数字和下划线".to_string());
    }
    Ok(())
}

/// Validate an email address shape.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email_re().is_match(email) {
        Ok(())
    } else {
        Err("邮箱格式错误".to_string())
    }
}

/// Validate a full registration payload; collects per-field messages.
pub fn validate_registration(
    email: &str,
    password: &str,
    username: Option<&str>,
) -> Result<(), serde_json::Map<String, serde_json::Value>> {
    let mut errors = serde_json::Map::new();

    if let Some(username) = username {
        if !username.is_empty() {
            if let Err(message) = validate_username(username) {
                errors.insert("username".to_string(), message.into());
            }
        }
    }

    if email.is_empty() {
        errors.insert("email".to_string(), "邮箱不能为空".into());
    } else if let Err(message) = validate_email(email) {
        errors.insert("email".to_string(), message.into());
    }

    if password.is_empty() {
        errors.insert("password".to_string(), "密码不能为空".into());
    } else if let Err(message) = validate_password(password) {
        errors.insert("password".to_string(), message.into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Generate a 32-byte URL-safe password-reset token.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("名字").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@host").is_err());
        assert!(validate_email("a b@host.com").is_err());
    }

    #[test]
    fn test_registration_collects_field_errors() {
        let errors = validate_registration("bad", "short", Some("a")).unwrap_err();
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("username"));
    }

    #[test]
    fn test_registration_username_optional() {
        assert!(validate_registration("alice@example.com", "Password123!@#", None).is_ok());
        assert!(validate_registration("alice@example.com", "Password123!@#", Some("")).is_ok());
    }

    #[test]
    fn test_reset_tokens_are_url_safe_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(a.len() >= 42);
    }
}
