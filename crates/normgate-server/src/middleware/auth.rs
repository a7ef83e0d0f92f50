//! Authentication middleware.
//!
//! One place, one policy: every request outside the public allow-list must
//! carry a valid, non-revoked Bearer token for an active account. Auth
//! outcomes map to the gateway's status-code conventions (401 missing or
//! expired or revoked, 422 malformed, 403 disabled account).

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use normgate_core::auth::verify_token;
use normgate_error::{AuthError, GatewayError};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// Paths reachable without a token.
const PUBLIC_PATHS: [&str; 7] = [
    "/api/auth/register",
    "/api/auth/login",
    "/api/auth/forgot-password",
    "/api/auth/reset-password",
    "/api/health",
    "/api/ping",
    "/api/status",
];

/// The file download endpoint is deliberately public (shared links); only
/// the `(task_id, file_id)` pair gates access.
fn is_public_download(path: &str) -> bool {
    let mut segments = path.split('/').skip(1);
    matches!(
        (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ),
        (
            Some("api"),
            Some("tasks"),
            Some(task_id),
            Some("files"),
            Some(file_id),
            Some("download"),
            None,
        ) if !task_id.is_empty() && !file_id.is_empty()
    )
}

fn is_public(method: &Method, path: &str) -> bool {
    method == Method::OPTIONS || PUBLIC_PATHS.contains(&path) || is_public_download(path)
}

async fn authenticate(
    state: &AppState,
    headers: &header::HeaderMap,
) -> Result<AuthUser, GatewayError> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidToken {
            reason: "expected Bearer scheme".to_string(),
        })?;

    let claims = verify_token(token, &state.settings.jwt_secret_key)?;

    if state.revoked.is_revoked(&claims.jti) {
        return Err(AuthError::TokenRevoked.into());
    }

    let user = state
        .users
        .find_by_id(&claims.sub)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    if !user.is_active {
        return Err(AuthError::AccountDisabled.into());
    }

    Ok(AuthUser {
        user,
        jti: claims.jti,
        exp: claims.exp,
    })
}

/// Gate every non-public request behind token verification and inject the
/// caller as an [`AuthUser`] extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match authenticate(&state, request.headers()).await {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => {
            warn!(path = %request.uri().path(), error = %err, "request rejected by auth");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public(&Method::POST, "/api/auth/login"));
        assert!(is_public(&Method::POST, "/api/auth/register"));
        assert!(is_public(&Method::GET, "/api/health"));
        assert!(!is_public(&Method::GET, "/api/tasks"));
        assert!(!is_public(&Method::POST, "/api/auth/logout"));
    }

    #[test]
    fn test_download_is_public() {
        assert!(is_public_download("/api/tasks/t-1/files/f-1/download"));
        assert!(!is_public_download("/api/tasks/t-1/files/f-1/preview"));
        assert!(!is_public_download("/api/tasks/t-1/files/f-1/download/extra"));
        assert!(!is_public_download("/api/tasks//files/f-1/download"));
    }

    #[test]
    fn test_options_bypasses_auth() {
        assert!(is_public(&Method::OPTIONS, "/api/tasks"));
    }
}
