//! JWT issue and verification (HS256).

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use normgate_error::AuthError;
use serde::{Deserialize, Serialize};

/// Clock drift tolerated when validating `exp`.
const LEEWAY_SECS: u64 = 10;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Token identifier; what the revoked set stores.
    pub jti: String,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Expiration time (Unix timestamp).
    pub exp: u64,
    /// Username snapshot, when the account has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email snapshot.
    pub email: String,
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        // Clock before epoch: treat as zero so issued tokens expire immediately.
        .unwrap_or(0)
}

/// Issue an access token for a user. Returns `(token, jti, exp)`.
pub fn issue_token(
    user_id: &str,
    username: Option<&str>,
    email: &str,
    secret: &str,
    expires_secs: u64,
) -> Result<(String, String, u64), AuthError> {
    let now = unix_now();
    let exp = now + expires_secs;
    let claims = Claims {
        sub: user_id.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp,
        username: username.map(ToString::to_string),
        email: email.to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation {
        reason: e.to_string(),
    })?;
    Ok((token, claims.jti, exp))
}

/// Verify a token and return its claims. Expired and malformed tokens are
/// distinguished so the HTTP layer can answer 401 vs 422.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = LEEWAY_SECS;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken {
            reason: e.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes!";

    #[test]
    fn test_issue_and_verify_round_trip() {
        let (token, jti, _) =
            issue_token("u-1", Some("alice"), "alice@example.com", SECRET, 3600).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.jti, jti);
        assert_eq!(claims.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_wrong_secret_is_invalid_not_expired() {
        let (token, _, _) = issue_token("u-1", None, "a@b.com", SECRET, 3600).unwrap();
        let err = verify_token(&token, "another-secret-32-bytes-long!!!!").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let now = unix_now();
        let claims = Claims {
            sub: "u-1".into(),
            jti: "j-1".into(),
            iat: now.saturating_sub(7200),
            exp: now.saturating_sub(3600),
            username: None,
            email: "a@b.com".into(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let err = verify_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[test]
    fn test_garbage_is_invalid() {
        let err = verify_token("not.a.token", SECRET).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_tokens_have_unique_jti() {
        let (_, jti_a, _) = issue_token("u-1", None, "a@b.com", SECRET, 3600).unwrap();
        let (_, jti_b, _) = issue_token("u-1", None, "a@b.com", SECRET, 3600).unwrap();
        assert_ne!(jti_a, jti_b);
    }
}
