//! Task lifecycle endpoints: upload, processing, listing, deletion.

use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info};

use normgate_core::model::{new_id, Task, TaskFile, TaskStatus, TaskType, UploadStatus};
use normgate_core::store::parse_status_filter;
use normgate_error::{ApiResponse, FileError, GatewayError};
use normgate_upstream::{upload_file, MAX_FILE_SIZE};

use crate::extractors::AuthUser;
use crate::files;
use crate::jobs;
use crate::routes::{task_files, task_results};
use crate::state::AppState;

/// Task router under `/api/tasks`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/upload-multiple", post(upload_multiple))
        .route("/standard-processing", post(standard_processing))
        .route("/", get(list_tasks))
        .route("/types", get(task_types))
        .route("/dashboard", get(dashboard))
        .route("/{task_id}", get(task_detail).delete(delete_task))
        .route(
            "/{task_id}/files/{file_id}/preview",
            get(task_files::preview_file),
        )
        .route(
            "/{task_id}/files/{file_id}/download",
            get(task_files::download_file),
        )
        .route(
            "/{task_id}/results/{result_id}/export",
            get(task_results::export_pdf),
        )
        .route(
            "/{task_id}/results/{result_id}/export-markdown",
            get(task_results::export_markdown),
        )
        .route(
            "/{task_id}/results/paginated",
            get(task_results::paginated),
        )
        .route(
            "/{task_id}/results/export-excel",
            get(task_results::export_excel),
        )
        // Uploads may carry up to the 50 MiB file limit plus form overhead.
        .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + 1024 * 1024))
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::fail(message))).into_response()
}

struct IncomingFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Pull the task type and file parts out of a multipart form. Accepted
/// file field names: `file`, `file1`, `file2`.
async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<(Option<String>, Vec<IncomingFile>), GatewayError> {
    let mut task_type = None;
    let mut incoming = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::validation("multipart", e.to_string()))?
    {
        let name = field.name().map(ToString::to_string).unwrap_or_default();
        match name.as_str() {
            "task_type" => {
                task_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| GatewayError::validation("task_type", e.to_string()))?,
                );
            }
            "file" | "file1" | "file2" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::validation(name.clone(), e.to_string()))?;
                if !filename.is_empty() {
                    incoming.push(IncomingFile {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok((task_type, incoming))
}

fn parse_task_type(state: &AppState, raw: Option<&str>) -> Result<TaskType, Response> {
    let Some(raw) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Err(fail(StatusCode::BAD_REQUEST, "请提供任务类型"));
    };
    raw.parse().map_err(|_| {
        let valid: Vec<String> = state
            .standards
            .summaries()
            .iter()
            .filter_map(|t| t["key"].as_str().map(ToString::to_string))
            .collect();
        fail(
            StatusCode::BAD_REQUEST,
            format!("无效的任务类型。支持的类型: {}", valid.join(", ")),
        )
    })
}

struct UploadOutcome {
    uploaded: Vec<TaskFile>,
    failed: Vec<Value>,
}

/// Run the upload protocol over a fresh task: `pending -> uploading`, one
/// local-save + upstream-transfer per file, then `uploading -> uploaded`
/// only when every file succeeded; any failure flips the task to `failed`.
async fn upload_files_to_task(
    state: &AppState,
    task: &Task,
    user_id: &str,
    incoming: Vec<IncomingFile>,
) -> Result<UploadOutcome, GatewayError> {
    state
        .tasks
        .advance_status(&task.id, TaskStatus::Uploading)
        .await?;
    let app = state.standards.resolve(task.task_type)?.clone();

    let mut uploaded = Vec::new();
    let mut failed = Vec::new();

    for file in incoming {
        let filename = file.filename.clone();
        match upload_one(state, task, user_id, &app, file).await {
            Ok(record) => uploaded.push(record),
            Err(message) => {
                error!(task_id = %task.id, filename = %filename, error = %message, "file upload failed");
                failed.push(json!({"filename": filename, "error": message}));
            }
        }
    }

    if failed.is_empty() {
        state
            .tasks
            .advance_status(&task.id, TaskStatus::Uploaded)
            .await?;
    } else {
        state.tasks.mark_failed(&task.id).await;
    }

    Ok(UploadOutcome { uploaded, failed })
}

async fn upload_one(
    state: &AppState,
    task: &Task,
    user_id: &str,
    app: &normgate_core::config::StandardApp,
    file: IncomingFile,
) -> Result<TaskFile, String> {
    let IncomingFile {
        filename,
        content_type,
        bytes,
    } = file;

    let saved = files::save_local(&state.storage, user_id, &filename, &content_type, &bytes)
        .await
        .map_err(|e| format!("文件保存失败: {e}"))?;

    let now = Utc::now().naive_utc();
    let mut record = TaskFile {
        id: new_id(),
        task_id: task.id.clone(),
        user_id: user_id.to_string(),
        original_filename: saved.original_filename,
        stored_filename: saved.stored_filename,
        file_path: saved.file_path,
        file_size: saved.file_size,
        file_type: saved.file_type,
        file_extension: Some(saved.file_extension),
        dify_file_id: None,
        dify_response_data: None,
        upload_status: UploadStatus::Uploading,
        upload_error: None,
        created_at: now,
        updated_at: now,
    };
    state
        .files
        .insert(&record)
        .await
        .map_err(|e| format!("文件记录保存失败: {e}"))?;

    match upload_file(
        &state.upstream,
        &app.file_upload_url,
        &app.key,
        user_id,
        &filename,
        bytes,
    )
    .await
    {
        Ok(body) => {
            let dify_file_id = body
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let serialized = body.to_string();
            state
                .files
                .set_uploaded(&record.id, &dify_file_id, &serialized)
                .await
                .map_err(|e| format!("文件记录更新失败: {e}"))?;
            record.dify_file_id = Some(dify_file_id);
            record.dify_response_data = Some(serialized);
            record.upload_status = UploadStatus::Uploaded;
            Ok(record)
        }
        Err(e) => {
            let message = format!("Dify文件上传失败: {e}");
            if let Err(store_err) = state.files.set_failed(&record.id, &message).await {
                error!(file_id = %record.id, error = %store_err, "could not record upload failure");
            }
            Err(message)
        }
    }
}

async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Response, GatewayError> {
    let (task_type, mut incoming) = read_multipart(&mut multipart).await?;
    let task_type = match parse_task_type(&state, task_type.as_deref()) {
        Ok(task_type) => task_type,
        Err(response) => return Ok(response),
    };

    if incoming.is_empty() {
        return Err(FileError::Missing.into());
    }
    let file = incoming.remove(0);

    let task = state
        .tasks
        .create(&auth.user.id, task_type, None, None)
        .await?;
    let outcome = upload_files_to_task(&state, &task, &auth.user.id, vec![file]).await?;

    if let Some(failure) = outcome.failed.first() {
        let message = failure["error"].as_str().unwrap_or("未知错误");
        return Ok(fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("文件上传失败: {message}"),
        ));
    }

    let task = state.tasks.find_owned(&task.id, &auth.user.id).await?;
    info!(task_id = %task.id, user = %auth.log_name(), "single-file upload completed");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "文件上传成功",
            json!({
                "task": task.to_json(),
                "file": outcome.uploaded[0].to_json(),
            }),
        )),
    )
        .into_response())
}

async fn upload_multiple(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Response, GatewayError> {
    let (task_type, incoming) = read_multipart(&mut multipart).await?;
    let task_type = match parse_task_type(&state, task_type.as_deref()) {
        Ok(task_type) => task_type,
        Err(response) => return Ok(response),
    };

    if incoming.is_empty() {
        return Ok(fail(StatusCode::BAD_REQUEST, "至少需要上传一个文件"));
    }
    if task_type == TaskType::Comparison && incoming.len() != 2 {
        return Ok(fail(StatusCode::BAD_REQUEST, "标准对比任务需要上传两个文件"));
    }

    let task = state
        .tasks
        .create(&auth.user.id, task_type, None, None)
        .await?;
    let outcome = upload_files_to_task(&state, &task, &auth.user.id, incoming).await?;
    let task = state.tasks.find_owned(&task.id, &auth.user.id).await?;

    if !outcome.failed.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "部分文件上传失败",
                "data": {
                    "task": task.to_json(),
                    "successful_files": outcome.uploaded.iter().map(TaskFile::to_json).collect::<Vec<_>>(),
                    "failed_files": outcome.failed,
                },
            })),
        )
            .into_response());
    }

    info!(
        task_id = %task.id,
        files = outcome.uploaded.len(),
        user = %auth.log_name(),
        "multi-file upload completed"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "多文件上传成功",
            json!({
                "task": task.to_json(),
                "files": outcome.uploaded.iter().map(TaskFile::to_json).collect::<Vec<_>>(),
                "total_files": outcome.uploaded.len(),
            }),
        )),
    )
        .into_response())
}

async fn standard_processing(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let Some(task_id) = body.get("task_id").and_then(Value::as_str).map(ToString::to_string)
    else {
        return Ok(fail(StatusCode::BAD_REQUEST, "请提供任务ID"));
    };

    // Everything except task_id is forwarded verbatim.
    let mut payload = body;
    if let Some(object) = payload.as_object_mut() {
        object.remove("task_id");
    }

    jobs::spawn_standard_processing(state, task_id.clone(), auth.user.id.clone(), payload).await?;

    info!(task_id = %task_id, user = %auth.log_name(), "standard processing accepted");
    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "请求发送成功，任务正在后台处理中，请在任务中心查看进度",
            "task_id": task_id,
            "status": "processing",
        })),
    )
        .into_response())
}

async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    let statuses = params
        .get("status")
        .map(|raw| parse_status_filter(raw))
        .unwrap_or_default();
    // An unknown task_type filter is ignored, like unknown status tokens.
    let task_type = params
        .get("task_type")
        .and_then(|raw| raw.trim().parse::<TaskType>().ok());
    let page = params
        .get("page")
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let per_page = params
        .get("per_page")
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(20);

    let listing = state
        .tasks
        .list(&auth.user.id, &statuses, task_type, page, per_page)
        .await?;

    let mut tasks_data = Vec::with_capacity(listing.tasks.len());
    for task in &listing.tasks {
        let mut task_json = task.to_json();
        let files = state.files.find_by_task(&task.id).await?;
        task_json["files"] = files.iter().map(TaskFile::to_json).collect();
        task_json["file_count"] = json!(files.len());
        tasks_data.push(task_json);
    }

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取任务列表成功",
            json!({
                "tasks": tasks_data,
                "pagination": {
                    "page": listing.page,
                    "per_page": listing.per_page,
                    "total": listing.total,
                    "pages": listing.pages,
                    "has_prev": listing.page > 1,
                    "has_next": listing.page < listing.pages,
                },
            }),
        )),
    )
        .into_response())
}

async fn task_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Response, GatewayError> {
    let task = state.tasks.find_owned(&task_id, &auth.user.id).await?;
    let files = state.files.find_by_task(&task.id).await?;
    let results = state
        .results
        .find_by_user_and_task(&auth.user.id, &task.id)
        .await?;
    let conversations = state.conversations.find_by_task(&task.id).await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取任务详情成功",
            json!({
                "task": task.to_json(),
                "files": files.iter().map(TaskFile::to_json).collect::<Vec<_>>(),
                "results": results.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
                "conversations": conversations.iter().map(|c| c.to_json()).collect::<Vec<_>>(),
            }),
        )),
    )
        .into_response())
}

async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Response, GatewayError> {
    let task = state.tasks.find_owned(&task_id, &auth.user.id).await?;
    let files = state.files.find_by_task(&task.id).await?;

    state.tasks.delete_cascade(&task.id).await?;

    // Blob removal is best-effort; rows are already gone.
    for file in &files {
        files::delete_local(&file.file_path).await;
    }

    info!(task_id = %task.id, user = %auth.log_name(), "task deleted");
    Ok((StatusCode::OK, Json(ApiResponse::ok_empty("任务删除成功"))).into_response())
}

async fn task_types(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取任务类型成功",
            json!({"task_types": state.standards.summaries()}),
        )),
    )
        .into_response()
}

async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, GatewayError> {
    let status_counts = state.tasks.count_by_status(&auth.user.id).await?;
    let type_counts = state.tasks.count_by_type(&auth.user.id).await?;

    let total_tasks: i64 = status_counts.iter().map(|(_, count)| count).sum();
    let status_stats: serde_json::Map<String, Value> = status_counts
        .into_iter()
        .map(|(status, count)| (status, json!(count)))
        .collect();
    let type_stats: serde_json::Map<String, Value> = type_counts
        .into_iter()
        .map(|(task_type, count)| (task_type, json!(count)))
        .collect();

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(
            "获取仪表板数据成功",
            json!({
                "total_tasks": total_tasks,
                "status_stats": status_stats,
                "type_stats": type_stats,
            }),
        )),
    )
        .into_response())
}
