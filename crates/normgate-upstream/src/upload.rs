//! File upload to the upstream platform.
//!
//! Wire contract: `multipart/form-data` with `file=(filename, bytes,
//! application/octet-stream)` and `user=<user_id>`, Bearer auth, and no
//! JSON content-type override. The upstream answers with an `id` that
//! becomes the stored file handle.

use serde_json::Value;
use tracing::{info, warn};

use normgate_error::UpstreamError;

use crate::client::{map_transport_error, UpstreamClient};

/// Extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: [&str; 16] = [
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "csv",
    "md", "json", "xml",
];

/// Maximum upload size: 50 MiB.
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Return the lower-cased extension (with dot) when the filename carries an
/// allowed one.
pub fn valid_extension(filename: &str) -> Option<String> {
    let filename = filename.trim();
    if filename.is_empty() || filename == "." || filename == ".." {
        return None;
    }
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    let ext = ext.to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Some(format!(".{ext}"))
    } else {
        None
    }
}

/// Repair a filename for the upstream: ASCII word characters only, a real
/// stem, and an allowed extension. Bare-extension names ("pdf") become
/// `document.<ext>`; hopeless names become `file.txt`.
pub fn sanitize_for_upstream(filename: &str) -> String {
    let trimmed = filename.trim();

    let Some(extension) = valid_extension(trimmed) else {
        // The whole name may be just an extension ("pdf").
        let lowered = trimmed.to_lowercase();
        if ALLOWED_EXTENSIONS.contains(&lowered.as_str()) {
            warn!(filename = %filename, "filename was a bare extension, repaired");
            return format!("document.{lowered}");
        }
        warn!(filename = %filename, "filename had no valid extension, defaulting");
        return "file.txt".to_string();
    };

    let stem = trimmed
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or_default();
    if stem.trim().is_empty() {
        return format!("document{extension}");
    }

    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_matches('_');
    if safe.is_empty() {
        format!("document{extension}")
    } else {
        format!("{safe}{extension}")
    }
}

/// Upload one file and return the parsed upstream reply. The reply must
/// carry a non-empty `id`.
pub async fn upload_file(
    client: &UpstreamClient,
    upload_url: &str,
    key: &str,
    user_id: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<Value, UpstreamError> {
    let safe_name = sanitize_for_upstream(filename);
    info!(filename = %safe_name, user_id = %user_id, url = %upload_url, "uploading file upstream");

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(safe_name.clone())
        .mime_str("application/octet-stream")
        .map_err(|e| UpstreamError::Request {
            message: e.to_string(),
        })?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("user", user_id.to_string());

    let response = client
        .forward_client()
        .post(upload_url)
        .header("Authorization", format!("Bearer {key}"))
        .multipart(form)
        .send()
        .await
        .map_err(map_transport_error)?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| {
            serde_json::json!({
                "error": format!("API返回错误: {}", status.as_u16()),
                "detail": text.chars().take(200).collect::<String>(),
            })
        });
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = serde_json::from_str(&text).map_err(|e| UpstreamError::InvalidResponse {
        reason: e.to_string(),
    })?;
    match body.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {
            info!(filename = %safe_name, dify_file_id = %id, "file accepted upstream");
            Ok(body)
        }
        _ => Err(UpstreamError::InvalidResponse {
            reason: "upload reply carried no file id".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_valid_extension_accepts_allow_list() {
        assert_eq!(valid_extension("report.PDF"), Some(".pdf".to_string()));
        assert_eq!(valid_extension("data.csv"), Some(".csv".to_string()));
        assert_eq!(valid_extension("archive.zip"), None);
        assert_eq!(valid_extension("noext"), None);
        assert_eq!(valid_extension(".."), None);
        assert_eq!(valid_extension(""), None);
    }

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize_for_upstream("draft_v2.pdf"), "draft_v2.pdf");
    }

    #[test]
    fn test_sanitize_replaces_cjk_stems() {
        assert_eq!(sanitize_for_upstream("标准草案.pdf"), "document.pdf");
        assert_eq!(sanitize_for_upstream("草案v2.docx"), "v2.docx");
    }

    #[test]
    fn test_sanitize_bare_extension() {
        assert_eq!(sanitize_for_upstream("pdf"), "document.pdf");
        assert_eq!(sanitize_for_upstream(".pdf"), "document.pdf");
    }

    #[test]
    fn test_sanitize_hopeless_name_defaults() {
        assert_eq!(sanitize_for_upstream("???"), "file.txt");
        assert_eq!(sanitize_for_upstream(""), "file.txt");
    }

    #[tokio::test]
    async fn test_upload_returns_body_with_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files/upload"))
            .and(header("Authorization", "Bearer app-key"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "file-1", "name": "draft.pdf"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let body = upload_file(
            &client,
            &format!("{}/v1/files/upload", server.uri()),
            "app-key",
            "user-1",
            "draft.pdf",
            b"content".to_vec(),
        )
        .await
        .unwrap();
        assert_eq!(body["id"], "file-1");
    }

    #[tokio::test]
    async fn test_upload_without_id_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "x"})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let err = upload_file(&client, &server.uri(), "k", "u", "a.txt", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_upload_error_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(413).set_body_json(json!({"message": "file too large"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let err = upload_file(&client, &server.uri(), "k", "u", "a.txt", vec![1])
            .await
            .unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 413);
                assert_eq!(body["message"], "file too large");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
