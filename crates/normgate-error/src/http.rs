use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::{AuthError, ExportError, FileError, GatewayError, TaskError, UpstreamError};

/// JSON envelope shared by every non-binary endpoint:
/// `{success, message, data?, errors?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T = serde_json::Value> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn fail_with_errors(message: impl Into<String>, errors: serde_json::Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: Some(errors),
        }
    }
}

/// Status-code policy:
///
/// - business lookups that miss ("用户不存在", "任务不存在") answer 200 with
///   `success=false` so clients treat them uniformly with bad credentials;
/// - 401 missing/expired/revoked token, 422 malformed token, 403 forbidden,
///   409 uniqueness conflict, 400 validation;
/// - upstream errors relay the upstream body and status verbatim.
fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Auth(e) => match e {
            AuthError::MissingToken | AuthError::TokenExpired | AuthError::TokenRevoked => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidToken { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::UnknownUser
            | AuthError::InvalidCredentials
            | AuthError::WrongCurrentPassword => StatusCode::OK,
            AuthError::InvalidResetToken | AuthError::ResetTokenExpired => StatusCode::BAD_REQUEST,
            AuthError::TokenCreation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        GatewayError::Task(e) => match e {
            TaskError::NotFound { .. } | TaskError::ResultNotFound { .. } => StatusCode::OK,
            TaskError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        },
        GatewayError::File(e) => match e {
            FileError::NotFound { .. } => StatusCode::OK,
            FileError::TaskMismatch => StatusCode::FORBIDDEN,
            FileError::BlobMissing => StatusCode::NOT_FOUND,
            FileError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        },
        GatewayError::Upstream(e) => {
            StatusCode::from_u16(e.relay_status()).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
        GatewayError::Conflict { .. } => StatusCode::CONFLICT,
        GatewayError::Export(ExportError::NothingToExport) => StatusCode::BAD_REQUEST,
        GatewayError::Export(_)
        | GatewayError::Config(_)
        | GatewayError::Database(_)
        | GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        // Upstream bodies are relayed verbatim instead of wrapped.
        if let GatewayError::Upstream(UpstreamError::Status { body, .. }) = &self {
            return (status, Json(body.clone())).into_response();
        }

        let body = match &self {
            GatewayError::Validation { field, message } => {
                let mut errors = serde_json::Map::new();
                errors.insert(
                    field.clone(),
                    serde_json::Value::String(message.clone()),
                );
                ApiResponse::fail_with_errors(self.to_string(), serde_json::Value::Object(errors))
            }
            GatewayError::Database(_) => {
                ApiResponse::fail("数据库错误".to_string())
            }
            _ => ApiResponse::fail(self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

/// Trait to enable `?` operator in handlers returning plain `Response`.
pub trait IntoHttpResponse {
    fn into_http_response(self) -> Response;
}

impl<T> IntoHttpResponse for Result<T, GatewayError>
where
    T: IntoResponse,
{
    fn into_http_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => err.into_response(),
        }
    }
}
