//! Task-file endpoints: preview and the public download.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use normgate_error::{ApiResponse, FileError, GatewayError};

use crate::extractors::AuthUser;
use crate::files;
use crate::state::AppState;

/// RFC 5987 encoding so CJK filenames survive the attachment header.
fn content_disposition(filename: &str) -> String {
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                char::from(b).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect();
    format!("attachment; filename*=UTF-8''{encoded}")
}

/// Authenticated inline preview of an uploaded file.
pub async fn preview_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((task_id, file_id)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let Some(file) = state.files.find_by_id(&file_id).await? else {
        return Err(FileError::NotFound { file_id }.into());
    };
    if file.task_id != task_id || file.user_id != auth.user.id {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::fail("无权限访问此文件")),
        )
            .into_response());
    }

    let preview = files::preview(&file.file_path).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(
            "文件预览成功",
            json!({
                "file_info": file.to_json(),
                "preview": preview,
            }),
        )),
    )
        .into_response())
}

/// Public download by `(task_id, file_id)` - deliberately unauthenticated
/// so upload links can be shared; only the id pair gates access.
pub async fn download_file(
    State(state): State<AppState>,
    Path((task_id, file_id)): Path<(String, String)>,
) -> Result<Response, GatewayError> {
    let Some(file) = state.files.find_by_id(&file_id).await? else {
        return Err(FileError::NotFound { file_id }.into());
    };
    if file.task_id != task_id {
        return Err(FileError::TaskMismatch.into());
    }

    let bytes = match tokio::fs::read(&file.file_path).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(FileError::BlobMissing.into()),
    };

    info!(file_id = %file.id, task_id = %task_id, "public file download");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.file_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&file.original_filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_percent_encodes_cjk() {
        let header = content_disposition("标准.pdf");
        assert!(header.starts_with("attachment; filename*=UTF-8''%E6%A0%87%E5%87%86.pdf"));
    }
}
