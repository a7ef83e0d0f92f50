//! Identity endpoints.
//!
//! Authentication failures a client should treat uniformly (unknown user,
//! wrong password, disabled account at login) answer HTTP 200 with
//! `success=false`; transport-level auth failures are handled by the
//! middleware.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use normgate_core::auth::{
    generate_reset_token, hash_password, issue_token, validate_email, validate_password,
    validate_registration, validate_username, verify_password,
};
use normgate_error::{ApiResponse, GatewayError};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// Auth router under `/api/auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile).put(update_profile))
        .route("/verify-token", post(verify_token))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
}

fn ok(message: &str, data: serde_json::Value) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(message, data))).into_response()
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::fail(message))).into_response()
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Response, GatewayError> {
    let username = body.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let email = body.email.trim();

    if let Err(errors) = validate_registration(email, &body.password, username) {
        let details: Vec<String> = errors
            .iter()
            .map(|(field, message)| format!("{field}: {}", message.as_str().unwrap_or_default()))
            .collect();
        warn!(email = %email, "registration rejected by validation");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail_with_errors(
                format!("数据验证失败: {}", details.join("; ")),
                serde_json::Value::Object(errors),
            )),
        )
            .into_response());
    }

    if let Some(username) = username {
        if state.users.find_by_username(username).await?.is_some() {
            return Ok(fail(StatusCode::CONFLICT, "用户名已存在"));
        }
    }
    if state.users.find_by_email(email).await?.is_some() {
        return Ok(fail(StatusCode::CONFLICT, "邮箱已被注册"));
    }

    let password_hash = hash_password(&body.password)?;
    let user = state.users.create(email, username, &password_hash).await?;

    info!(user_id = %user.id, email = %email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("注册成功", json!({"user": user.to_json()}))),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(default)]
    credential: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Response, GatewayError> {
    let credential = body.credential.trim();
    if credential.is_empty() || body.password.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "请提供用户名/邮箱和密码"));
    }

    let Some(user) = state.users.find_by_credential(credential).await? else {
        warn!(credential = %credential, "login failed: unknown user");
        return Ok(fail(StatusCode::OK, "用户名/邮箱或密码错误"));
    };

    if !user.is_active {
        warn!(user_id = %user.id, "login failed: account disabled");
        return Ok(fail(StatusCode::OK, "账户已被禁用"));
    }

    if !verify_password(&body.password, &user.password_hash) {
        warn!(user_id = %user.id, "login failed: wrong password");
        return Ok(fail(StatusCode::OK, "用户名/邮箱或密码错误"));
    }

    state.users.update_last_login(&user.id).await?;

    let (access_token, _, _) = issue_token(
        &user.id,
        user.username.as_deref(),
        &user.email,
        &state.settings.jwt_secret_key,
        state.settings.jwt_access_token_expires,
    )?;

    info!(user_id = %user.id, "user logged in");
    Ok(ok(
        "登录成功",
        json!({
            "user": user.to_json(),
            "access_token": access_token,
            "token_type": "Bearer",
        }),
    ))
}

async fn logout(State(state): State<AppState>, auth: AuthUser) -> Response {
    state.revoked.revoke(&auth.jti, auth.exp);

    // Opportunistic pruning keeps the set bounded by live-token count.
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    let pruned = state.revoked.prune_expired(now);
    if pruned > 0 {
        info!(pruned, "revoked-token set pruned");
    }

    info!(user_id = %auth.user.id, "user logged out");
    (StatusCode::OK, Json(ApiResponse::ok_empty("登出成功"))).into_response()
}

async fn profile(auth: AuthUser) -> Response {
    ok("获取用户信息成功", json!({"user": auth.user.to_json()}))
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileBody>,
) -> Result<Response, GatewayError> {
    let username = body.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let email = body.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    if let Some(username) = username {
        if let Err(message) = validate_username(username) {
            return Err(GatewayError::validation("username", message));
        }
        if auth.user.username.as_deref() != Some(username)
            && state.users.find_by_username(username).await?.is_some()
        {
            return Ok(fail(StatusCode::CONFLICT, "用户名已被其他用户使用"));
        }
    }
    if let Some(email) = email {
        if let Err(message) = validate_email(email) {
            return Err(GatewayError::validation("email", message));
        }
        if auth.user.email != email && state.users.find_by_email(email).await?.is_some() {
            return Ok(fail(StatusCode::CONFLICT, "邮箱已被其他用户使用"));
        }
    }

    state.users.update_profile(&auth.user.id, username, email).await?;
    let user = state
        .users
        .find_by_id(&auth.user.id)
        .await?
        .map_or_else(|| auth.user.to_json(), |u| u.to_json());

    info!(user_id = %auth.user.id, "profile updated");
    Ok(ok("资料更新成功", json!({"user": user})))
}

async fn verify_token(auth: AuthUser) -> Response {
    ok(
        "Token有效",
        json!({
            "user_id": auth.user.id,
            "username": auth.user.username,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordBody {
    #[serde(default)]
    email: String,
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordBody>,
) -> Result<Response, GatewayError> {
    let email = body.email.trim();
    if email.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "请提供邮箱地址"));
    }

    let Some(user) = state.users.find_by_email(email).await? else {
        // Do not reveal whether the address is registered.
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::ok_empty("如果该邮箱已注册，您将收到密码重置链接")),
        )
            .into_response());
    };

    if !user.is_active {
        return Ok(fail(StatusCode::FORBIDDEN, "账户已被禁用，无法重置密码"));
    }

    let token = generate_reset_token();
    let expires = Utc::now().naive_utc() + Duration::seconds(3600);
    state.users.set_reset_token(&user.id, &token, expires).await?;

    info!(user_id = %user.id, "reset token issued");
    Ok(ok(
        "密码重置令牌已生成",
        json!({
            "reset_token": token,
            "expires_in": 3600,
            "note": "请在1小时内使用此令牌重置密码",
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct ResetPasswordBody {
    #[serde(default)]
    reset_token: String,
    #[serde(default)]
    new_password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordBody>,
) -> Result<Response, GatewayError> {
    let token = body.reset_token.trim();
    if token.is_empty() || body.new_password.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "请提供重置令牌和新密码"));
    }

    if let Err(message) = validate_password(&body.new_password) {
        return Ok(fail(
            StatusCode::BAD_REQUEST,
            format!("密码不符合要求: {message}"),
        ));
    }

    let Some(user) = state.users.find_by_reset_token(token).await? else {
        return Ok(fail(StatusCode::BAD_REQUEST, "无效的重置令牌"));
    };

    let now = Utc::now().naive_utc();
    let valid = user.reset_token_expires.is_some_and(|expires| expires > now);
    if !valid {
        // Single use: an expired token is cleared on detection.
        state.users.clear_reset_token(&user.id).await?;
        return Ok(fail(StatusCode::BAD_REQUEST, "重置令牌已过期或无效"));
    }

    let password_hash = hash_password(&body.new_password)?;
    state.users.set_password_hash(&user.id, &password_hash).await?;
    state.users.clear_reset_token(&user.id).await?;

    info!(user_id = %user.id, "password reset");
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok_empty("密码重置成功，请使用新密码登录")),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct ChangePasswordBody {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<Response, GatewayError> {
    if body.current_password.is_empty() || body.new_password.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "请提供当前密码和新密码"));
    }

    if let Err(message) = validate_password(&body.new_password) {
        return Ok(fail(
            StatusCode::BAD_REQUEST,
            format!("新密码不符合要求: {message}"),
        ));
    }

    if !verify_password(&body.current_password, &auth.user.password_hash) {
        return Ok(fail(StatusCode::OK, "当前密码错误"));
    }

    if verify_password(&body.new_password, &auth.user.password_hash) {
        return Ok(fail(StatusCode::BAD_REQUEST, "新密码不能与当前密码相同"));
    }

    let password_hash = hash_password(&body.new_password)?;
    state
        .users
        .set_password_hash(&auth.user.id, &password_hash)
        .await?;

    info!(user_id = %auth.user.id, "password changed");
    Ok((StatusCode::OK, Json(ApiResponse::ok_empty("密码修改成功"))).into_response())
}
