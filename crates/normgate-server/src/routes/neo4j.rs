//! Standards-graph endpoints.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{error, info};

use normgate_error::ApiResponse;

use crate::extractors::AuthUser;
use crate::state::AppState;

/// Graph router under `/api/neo4j`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/related-data", get(related_data))
        .route("/health", get(health))
}

async fn related_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(standard_name) = params
        .get("standard_name")
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("standard_name参数是必需的")),
        )
            .into_response();
    };

    match state.graph.related_data(standard_name).await {
        Ok(graph_data) => {
            let nodes = graph_data["nodes"].as_array().map_or(0, Vec::len);
            let edges = graph_data["edges"].as_array().map_or(0, Vec::len);
            info!(
                user = %auth.log_name(),
                standard_name = %standard_name,
                nodes,
                edges,
                "graph query served"
            );
            (
                StatusCode::OK,
                Json(ApiResponse::ok(
                    "标准关联数据查询成功",
                    json!({
                        "standard_name": standard_name,
                        "nodes_count": nodes,
                        "edges_count": edges,
                        "graph_data": graph_data,
                    }),
                )),
            )
                .into_response()
        }
        Err(e) => {
            error!(standard_name = %standard_name, error = %e, "graph query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::fail(format!("查询失败: {e}"))),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>, _auth: AuthUser) -> Response {
    match state.graph.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(
                "Neo4j连接正常",
                json!({
                    "status": "healthy",
                    "connection_test": "passed",
                    "uri": state.graph.uri(),
                }),
            )),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "neo4j health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": format!("Neo4j连接失败: {e}"),
                    "data": {
                        "status": "unhealthy",
                        "connection_test": "failed",
                        "uri": state.graph.uri(),
                    },
                })),
            )
                .into_response()
        }
    }
}
