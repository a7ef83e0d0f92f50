//! Upstream proxy endpoints: scenario-scoped chat, conversation list,
//! message history and conversation operations.
//!
//! Streaming replies are copied byte-for-byte with SSE headers; nothing is
//! injected into the stream, and mid-stream errors are logged only.
//! Non-streaming replies (and error bodies) pass through unwrapped.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use normgate_core::config::{ApiType, DEFAULT_SCENARIO};
use normgate_error::{ApiResponse, GatewayError, UpstreamError};
use normgate_upstream::{
    delete_conversation, rename_conversation, validate_conversation_params,
    validate_message_params, Forwarded,
};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// Proxy router under `/api/dify/v2`.
pub fn router() -> Router<AppState> {
    Router::new()
        // Legacy non-scenario paths alias multilingual_qa.
        .route("/chat-simple", post(chat_simple_legacy))
        .route("/conversations", get(conversations_legacy))
        .route("/messages", get(messages_legacy))
        .route("/config", get(config_legacy))
        .route("/scenarios", get(scenarios))
        .route("/{scenario}/chat-simple", post(chat_simple))
        .route("/{scenario}/conversations", get(conversations))
        .route("/{scenario}/messages", get(messages))
        .route("/{scenario}/config", get(scenario_config))
        .route("/{scenario}/conversations/{conversation_id}/name", post(rename))
        .route(
            "/{scenario}/conversations/{conversation_id}",
            delete(remove),
        )
}

fn unknown_scenario(state: &AppState, scenario: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "message": format!("不支持的应用场景: {scenario}"),
            "valid_scenarios": state.scenarios.keys(),
        })),
    )
        .into_response()
}

fn relay(forwarded: &Forwarded) -> Response {
    let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(forwarded.body.clone())).into_response()
}

async fn chat_simple_legacy(
    state: State<AppState>,
    auth: AuthUser,
    body: Json<Value>,
) -> Result<Response, GatewayError> {
    warn!("deprecated route /api/dify/v2/chat-simple used, prefer the scenario route");
    chat_simple(state, auth, Path(DEFAULT_SCENARIO.to_string()), body).await
}

async fn conversations_legacy(
    state: State<AppState>,
    auth: AuthUser,
    params: Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    warn!("deprecated route /api/dify/v2/conversations used, prefer the scenario route");
    conversations(state, auth, Path(DEFAULT_SCENARIO.to_string()), params).await
}

async fn messages_legacy(
    state: State<AppState>,
    auth: AuthUser,
    params: Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    warn!("deprecated route /api/dify/v2/messages used, prefer the scenario route");
    messages(state, auth, Path(DEFAULT_SCENARIO.to_string()), params).await
}

async fn config_legacy(state: State<AppState>, auth: AuthUser) -> Response {
    warn!("deprecated route /api/dify/v2/config used, prefer the scenario route");
    scenarios(state, auth).await
}

/// Streaming chat: the upstream body is relayed verbatim in 8 KiB-ish
/// chunks under SSE headers.
async fn chat_simple(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(scenario): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if !state.scenarios.contains(&scenario) {
        return Ok(unknown_scenario(&state, &scenario));
    }
    let app = state.scenarios.resolve(&scenario, ApiType::Chat)?;

    info!(scenario = %scenario, user = %auth.log_name(), "chat stream requested");
    let upstream = match state.upstream.forward_stream(&app.url, &app.key, &body).await {
        Ok(stream) => stream,
        Err(UpstreamError::Status { status, body }) => {
            error!(scenario = %scenario, status, "upstream refused chat stream");
            return Ok((
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                Json(json!({
                    "success": false,
                    "message": format!("Dify API请求失败: {status}"),
                    "details": body,
                })),
            )
                .into_response());
        }
        Err(other) => return Err(other.into()),
    };

    let log_scenario = scenario.clone();
    let stream = upstream
        .take_while(move |chunk| {
            let keep = chunk.is_ok();
            if let Err(e) = chunk {
                // Logged only; never injected into the client stream.
                error!(scenario = %log_scenario, error = %e, "mid-stream upstream error");
            }
            futures::future::ready(keep)
        })
        .map(|chunk| chunk.map_err(axum::BoxError::from));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| GatewayError::internal(e.to_string()))?)
}

async fn conversations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(scenario): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    if !state.scenarios.contains(&scenario) {
        return Ok(unknown_scenario(&state, &scenario));
    }

    let cleaned = match validate_conversation_params(&params) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::fail_with_errors(
                    format!("参数验证失败: {}", errors.join("; ")),
                    json!(errors),
                )),
            )
                .into_response());
        }
    };

    let app = state.scenarios.resolve(&scenario, ApiType::Conversations)?;
    let forwarded = state
        .upstream
        .forward(Method::GET, &app.url, &app.key, Some(&cleaned), None)
        .await?;

    info!(scenario = %scenario, user = %auth.log_name(), status = forwarded.status, "conversation list relayed");
    Ok(relay(&forwarded))
}

async fn messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(scenario): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    if !state.scenarios.contains(&scenario) {
        return Ok(unknown_scenario(&state, &scenario));
    }

    let cleaned = match validate_message_params(&params) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::fail_with_errors(
                    format!("参数验证失败: {}", errors.join("; ")),
                    json!(errors),
                )),
            )
                .into_response());
        }
    };

    let app = state.scenarios.resolve(&scenario, ApiType::Messages)?;
    let forwarded = state
        .upstream
        .forward(Method::GET, &app.url, &app.key, Some(&cleaned), None)
        .await?;

    info!(scenario = %scenario, user = %auth.log_name(), status = forwarded.status, "message history relayed");
    Ok(relay(&forwarded))
}

async fn scenarios(State(state): State<AppState>, auth: AuthUser) -> Response {
    let summaries = state.scenarios.summaries();
    info!(user = %auth.log_name(), "scenario list served");
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取应用场景列表成功",
            json!({
                "scenarios": summaries,
                "total": summaries.len(),
            }),
        )),
    )
        .into_response()
}

async fn scenario_config(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(scenario): Path<String>,
) -> Response {
    let Some(status) = state.scenarios.status(&scenario) else {
        return unknown_scenario(&state, &scenario);
    };

    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取配置成功",
            json!({
                "scenario_info": status,
                "endpoints": {
                    "chat_simple": format!("/api/dify/v2/{scenario}/chat-simple"),
                    "conversations": format!("/api/dify/v2/{scenario}/conversations"),
                    "messages": format!("/api/dify/v2/{scenario}/messages"),
                    "config": format!("/api/dify/v2/{scenario}/config"),
                    "rename_conversation": format!("/api/dify/v2/{scenario}/conversations/{{conversation_id}}/name"),
                    "delete_conversation": format!("/api/dify/v2/{scenario}/conversations/{{conversation_id}}"),
                },
            }),
        )),
    )
        .into_response()
}

async fn rename(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((scenario, conversation_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if !state.scenarios.contains(&scenario) {
        return Ok(unknown_scenario(&state, &scenario));
    }
    let app = state.scenarios.resolve(&scenario, ApiType::ConversationOps)?;
    let forwarded =
        rename_conversation(&state.upstream, &app.url, &app.key, &conversation_id, &body).await?;

    info!(
        scenario = %scenario,
        conversation_id = %conversation_id,
        user = %auth.log_name(),
        status = forwarded.status,
        "conversation rename relayed"
    );
    Ok(relay(&forwarded))
}

async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((scenario, conversation_id)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> Result<Response, GatewayError> {
    if !state.scenarios.contains(&scenario) {
        return Ok(unknown_scenario(&state, &scenario));
    }
    let app = state.scenarios.resolve(&scenario, ApiType::ConversationOps)?;
    let forwarded = delete_conversation(
        &state.upstream,
        &app.url,
        &app.key,
        &conversation_id,
        body.as_deref(),
    )
    .await?;

    info!(
        scenario = %scenario,
        conversation_id = %conversation_id,
        user = %auth.log_name(),
        status = forwarded.status,
        "conversation delete relayed"
    );
    Ok(relay(&forwarded))
}
