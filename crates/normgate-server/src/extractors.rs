//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use normgate_core::model::User;
use normgate_error::{AuthError, GatewayError};

/// The authenticated caller, injected by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The account row as of this request.
    pub user: User,
    /// Token id, for revocation on logout.
    pub jti: String,
    /// Token expiry (Unix timestamp).
    pub exp: u64,
}

impl AuthUser {
    /// Name to use in request logs.
    pub fn log_name(&self) -> &str {
        self.user.display_name()
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}
