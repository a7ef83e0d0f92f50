//! User entity.

use chrono::NaiveDateTime;
use serde_json::{json, Value};

/// A registered account. `password_hash` is opaque to everything except the
/// password module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Opaque 36-char identifier.
    pub id: String,
    /// Optional unique username.
    pub username: Option<String>,
    /// Unique email; always present.
    pub email: String,
    /// Argon2 hash.
    pub password_hash: String,
    /// Active password-reset token, if any.
    pub reset_token: Option<String>,
    /// Expiry of the reset token.
    pub reset_token_expires: Option<NaiveDateTime>,
    /// Deactivated accounts cannot log in.
    pub is_active: bool,
    /// Creation timestamp (UTC).
    pub created_at: NaiveDateTime,
    /// Last mutation timestamp (UTC).
    pub updated_at: NaiveDateTime,
    /// Last successful login.
    pub last_login: Option<NaiveDateTime>,
}

impl User {
    /// Public snapshot; never exposes the hash or reset token.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "is_active": self.is_active,
            "created_at": self.created_at.and_utc().to_rfc3339(),
            "updated_at": self.updated_at.and_utc().to_rfc3339(),
            "last_login": self.last_login.map(|t| t.and_utc().to_rfc3339()),
        })
    }

    /// Name to show in logs: username when set, email otherwise.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json_hides_secrets() {
        let user = User {
            id: "u-1".into(),
            username: None,
            email: "alice@example.com".into(),
            password_hash: "$argon2id$v=19$secret".into(),
            reset_token: Some("reset-secret".into()),
            reset_token_expires: None,
            is_active: true,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
            last_login: None,
        };
        let rendered = user.to_json().to_string();
        assert!(!rendered.contains("argon2"));
        assert!(!rendered.contains("reset-secret"));
        assert_eq!(user.display_name(), "alice@example.com");
    }
}
