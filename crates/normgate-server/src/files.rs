//! Local file custody: validation, dated on-disk storage, preview.
//!
//! Uploaded originals keep their client-supplied name in the database (CJK
//! included) but are stored under a UUID-hex name at
//! `<uploads>/<YYYY>/<MM>/<DD>/<user_id>/`.

use std::path::Path;

use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use normgate_core::Storage;
use normgate_error::{FileError, GatewayError};
use normgate_upstream::{valid_extension, ALLOWED_EXTENSIONS, MAX_FILE_SIZE};

/// Preview is capped at this many characters of text.
const PREVIEW_MAX_CHARS: usize = 5000;

/// A file accepted into local custody.
#[derive(Debug, Clone)]
pub struct SavedFile {
    /// Client-supplied name, kept verbatim.
    pub original_filename: String,
    /// UUID-hex name on disk.
    pub stored_filename: String,
    /// Absolute path of the blob.
    pub file_path: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Declared MIME type.
    pub file_type: String,
    /// Lower-cased extension with dot.
    pub file_extension: String,
}

/// Validate an incoming upload before anything touches the disk.
pub fn validate_upload(filename: &str, size: usize) -> Result<(), FileError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(FileError::EmptyFilename);
    }
    if valid_extension(trimmed).is_none() {
        return Err(FileError::ExtensionNotAllowed {
            allowed: ALLOWED_EXTENSIONS.join(", "),
        });
    }
    if size > MAX_FILE_SIZE {
        return Err(FileError::TooLarge {
            size,
            max_mib: MAX_FILE_SIZE / (1024 * 1024),
        });
    }
    Ok(())
}

/// Write the bytes under the dated per-user directory.
pub async fn save_local(
    storage: &Storage,
    user_id: &str,
    filename: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<SavedFile, GatewayError> {
    validate_upload(filename, bytes.len()).map_err(GatewayError::from)?;

    let extension = valid_extension(filename).unwrap_or_else(|| ".txt".to_string());
    let directory = storage.upload_dir_for(user_id, Utc::now())?;
    let stored_filename = format!("{}{extension}", uuid::Uuid::new_v4().simple());
    let file_path = directory.join(&stored_filename);

    tokio::fs::write(&file_path, bytes)
        .await
        .map_err(|e| FileError::Io {
            message: e.to_string(),
        })?;

    info!(user_id = %user_id, filename = %filename, size = bytes.len(), "file saved locally");

    Ok(SavedFile {
        original_filename: filename.to_string(),
        stored_filename,
        file_path: file_path.display().to_string(),
        file_size: i64::try_from(bytes.len()).unwrap_or(i64::MAX),
        file_type: if content_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            content_type.to_string()
        },
        file_extension: extension,
    })
}

/// Best-effort removal of a local blob; errors are logged, never surfaced.
pub async fn delete_local(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!(path = %path, "local file deleted"),
        Err(e) => tracing::warn!(path = %path, error = %e, "local file delete failed"),
    }
}

fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    if text.chars().count() > max {
        (text.chars().take(max).collect(), true)
    } else {
        (text.to_string(), false)
    }
}

/// Build the preview payload for a stored file. Plain-text shapes and
/// images are rendered inline; rich document formats are not supported
/// here.
pub async fn preview(path: &str) -> Result<Value, FileError> {
    let file_path = Path::new(path);
    if !file_path.is_file() {
        return Err(FileError::BlobMissing);
    }

    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" | "xml" | "csv" => {
            let bytes = tokio::fs::read(file_path).await?;
            let text = String::from_utf8_lossy(&bytes);
            let (content, truncated) = truncate_chars(&text, PREVIEW_MAX_CHARS);
            Ok(json!({
                "content": content,
                "type": "text",
                "truncated": truncated,
            }))
        }
        "json" => {
            let bytes = tokio::fs::read(file_path).await?;
            let value: Value = serde_json::from_slice(&bytes).map_err(|_| {
                FileError::Io {
                    message: "JSON解析失败".to_string(),
                }
            })?;
            let pretty = serde_json::to_string_pretty(&value).unwrap_or_default();
            let (content, truncated) = truncate_chars(&pretty, PREVIEW_MAX_CHARS);
            Ok(json!({
                "content": content,
                "type": "json",
                "truncated": truncated,
            }))
        }
        "png" | "jpg" | "jpeg" | "gif" => {
            let bytes = tokio::fs::read(file_path).await?;
            let mime = match extension.as_str() {
                "png" => "image/png",
                "gif" => "image/gif",
                _ => "image/jpeg",
            };
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(json!({
                "content": format!("data:{mime};base64,{encoded}"),
                "type": "image",
                "size": bytes.len(),
            }))
        }
        _ => Err(FileError::PreviewUnsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_disallowed_extension() {
        assert!(matches!(
            validate_upload("payload.exe", 10),
            Err(FileError::ExtensionNotAllowed { .. })
        ));
        assert!(matches!(
            validate_upload("", 10),
            Err(FileError::EmptyFilename)
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        assert!(matches!(
            validate_upload("a.txt", MAX_FILE_SIZE + 1),
            Err(FileError::TooLarge { .. })
        ));
        assert!(validate_upload("a.txt", MAX_FILE_SIZE).is_ok());
    }

    #[tokio::test]
    async fn test_save_and_preview_text() {
        let tmp = tempfile::tempdir().unwrap();
        let mut settings = normgate_core::Settings::from_env().unwrap();
        settings.data_root_dir = tmp.path().display().to_string();
        settings.upload_files_dir = tmp.path().join("uploads").display().to_string();
        settings.export_files_dir = tmp.path().join("exports").display().to_string();
        settings.temp_files_dir = tmp.path().join("temp").display().to_string();
        let storage = Storage::init(&settings).unwrap();

        let saved = save_local(&storage, "u-1", "说明.txt", "text/plain", "你好 world".as_bytes())
            .await
            .unwrap();
        assert_eq!(saved.original_filename, "说明.txt");
        assert!(saved.stored_filename.ends_with(".txt"));

        let preview = preview(&saved.file_path).await.unwrap();
        assert_eq!(preview["type"], "text");
        assert_eq!(preview["content"], "你好 world");
        assert_eq!(preview["truncated"], false);
    }

    #[tokio::test]
    async fn test_preview_unsupported_format() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.docx");
        tokio::fs::write(&path, b"fake").await.unwrap();
        let err = preview(&path.display().to_string()).await.unwrap_err();
        assert!(matches!(err, FileError::PreviewUnsupported));
    }

    #[tokio::test]
    async fn test_preview_missing_blob() {
        let err = preview("/nonexistent/blob.txt").await.unwrap_err();
        assert!(matches!(err, FileError::BlobMissing));
    }
}
