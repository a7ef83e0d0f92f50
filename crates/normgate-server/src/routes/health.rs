//! Health endpoints, unauthenticated.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::error;

use crate::state::AppState;

/// `/health`, `/ping`, `/status`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ping", get(ping))
        .route("/status", get(status))
}

/// Health check with a real database probe.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "database health check failed");
            false
        }
    };

    let body = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "message": if db_healthy { "系统运行正常" } else { "数据库连接异常" },
        "database": {"connected": db_healthy},
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(body))
}

async fn ping() -> impl IntoResponse {
    Json(json!({
        "message": "pong",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "标准处理网关服务正在运行",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
