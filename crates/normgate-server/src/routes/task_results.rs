//! Task-result endpoints: pagination and the three export targets.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::info;

use normgate_core::model::TaskResult;
use normgate_core::paginate::{paginate_result, PageRequest, SortOrder};
use normgate_error::{ApiResponse, ExportError, GatewayError, TaskError};
use normgate_export::{clean_markdown, html_page, render_html};

use crate::extractors::AuthUser;
use crate::state::AppState;

/// Rows fetched when an export bypasses pagination.
const EXPORT_ROW_CAP: u32 = 10_000;

fn export_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn attachment_headers(content_type: &str, filename: &str) -> [(header::HeaderName, String); 2] {
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                char::from(b).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect();
    [
        (header::CONTENT_TYPE, content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename*=UTF-8''{encoded}"),
        ),
    ]
}

async fn find_owned_result(
    state: &AppState,
    task_id: &str,
    result_id: &str,
    user_id: &str,
) -> Result<TaskResult, GatewayError> {
    let result = state
        .results
        .find_by_id(result_id)
        .await?
        .ok_or_else(|| TaskError::ResultNotFound {
            result_id: result_id.to_string(),
        })?;
    if result.task_id != task_id || result.user_id != user_id {
        return Err(TaskError::Forbidden.into());
    }
    Ok(result)
}

/// Paginated view over the latest result of a paginatable, completed task.
pub async fn paginated(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    let task = state.tasks.find_owned(&task_id, &auth.user.id).await?;

    let page = params
        .get("page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(1);
    let per_page = params
        .get("per_page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(20);
    let sort_by = params.get("sort_by").map_or("sn", String::as_str);
    let sort_order = params.get("sort_order").map_or("asc", String::as_str);
    let request = PageRequest::new(page, per_page, sort_by, sort_order);

    let latest = state
        .results
        .latest_for_task(&auth.user.id, &task_id)
        .await?;
    let data = paginate_result(&task, latest.as_ref(), &request)?;

    info!(
        task_id = %task_id,
        page = request.page,
        total = data["pagination"]["total_items"].as_u64().unwrap_or(0),
        "paginated results served"
    );
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok("获取分页结果成功", data)),
    )
        .into_response())
}

/// PDF export of one result.
pub async fn export_pdf(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, result_id)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let result = find_owned_result(&state, &task_id, &result_id, &auth.user.id).await?;

    let export_dir = state.storage.export_dir_for(&auth.user.id)?;
    let filename = format!("task_result_{}_{}.pdf", task_id, export_timestamp());
    let output_path = export_dir.join(&filename);

    let content = result.answer.clone().unwrap_or_else(|| "暂无处理结果".to_string());
    let title = format!("任务结果 - {task_id}");
    let render_path = output_path.clone();
    tokio::task::spawn_blocking(move || {
        normgate_export::export_pdf(&content, &title, &render_path)
    })
    .await
    .map_err(|e| GatewayError::internal(format!("PDF导出失败: {e}")))??;

    let bytes = tokio::fs::read(&output_path)
        .await
        .map_err(|e| ExportError::Io {
            message: e.to_string(),
        })?;

    info!(result_id = %result.id, path = %output_path.display(), "pdf export served");
    Ok((
        StatusCode::OK,
        attachment_headers("application/pdf", &filename),
        bytes,
    )
        .into_response())
}

/// Markdown export of one result, raw `.md` or a rendered HTML preview.
pub async fn export_markdown(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, result_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, GatewayError> {
    let result = find_owned_result(&state, &task_id, &result_id, &auth.user.id).await?;

    let format = match params.get("format").map(String::as_str) {
        Some("raw") => "raw",
        _ => "preview",
    };

    let content = result.answer.clone().unwrap_or_else(|| "暂无处理结果".to_string());
    let cleaned = clean_markdown(&content);

    let export_dir = state.storage.export_dir_for(&auth.user.id)?;
    let (filename, payload, mime) = if format == "raw" {
        (
            format!("task_result_{}_raw_{}.md", task_id, export_timestamp()),
            cleaned,
            "text/markdown",
        )
    } else {
        let page = html_page(&render_html(&cleaned), &format!("任务结果 - {task_id}"));
        (
            format!("task_result_{}_preview_{}.html", task_id, export_timestamp()),
            page,
            "text/html",
        )
    };

    let output_path: PathBuf = export_dir.join(&filename);
    tokio::fs::write(&output_path, &payload)
        .await
        .map_err(|e| ExportError::Io {
            message: e.to_string(),
        })?;

    info!(result_id = %result.id, format = %format, "markdown export served");
    Ok((
        StatusCode::OK,
        attachment_headers(mime, &filename),
        payload.into_bytes(),
    )
        .into_response())
}

/// Excel export of the full result set (paginated task types only).
pub async fn export_excel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Response, GatewayError> {
    let task = state.tasks.find_owned(&task_id, &auth.user.id).await?;
    let latest = state
        .results
        .latest_for_task(&auth.user.id, &task_id)
        .await?;

    // The full set, bypassing the [1, 100] page-size window.
    let request = PageRequest {
        page: 1,
        per_page: EXPORT_ROW_CAP,
        sort_by: "sn".to_string(),
        sort_order: SortOrder::Asc,
    };
    let data = paginate_result(&task, latest.as_ref(), &request)?;

    let items: Vec<Value> = data["items"].as_array().cloned().unwrap_or_default();
    if items.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::fail("没有可导出的数据")),
        )
            .into_response());
    }
    let task_info = data["task_info"].clone();

    let export_dir = state.storage.export_dir_for(&auth.user.id)?;
    let filename = format!("task_results_{}_{}.xlsx", task_id, export_timestamp());
    let output_path = export_dir.join(&filename);

    let render_path = output_path.clone();
    tokio::task::spawn_blocking(move || {
        normgate_export::export_excel(&items, &task_info, &render_path)
    })
    .await
    .map_err(|e| GatewayError::internal(format!("Excel导出失败: {e}")))??;

    let bytes = tokio::fs::read(&output_path)
        .await
        .map_err(|e| ExportError::Io {
            message: e.to_string(),
        })?;

    info!(task_id = %task_id, path = %output_path.display(), "excel export served");
    Ok((
        StatusCode::OK,
        attachment_headers(
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            &filename,
        ),
        bytes,
    )
        .into_response())
}
