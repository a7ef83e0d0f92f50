//! Task-file entity: local custody plus the upstream file handle.

use chrono::NaiveDateTime;
use normgate_error::TaskError;
use serde_json::{json, Value};

/// Per-file upload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Recorded, not yet sent upstream.
    Pending,
    /// Upstream transfer in flight.
    Uploading,
    /// Upstream accepted the file; `dify_file_id` is set.
    Uploaded,
    /// Terminal failure; `upload_error` carries the cause.
    Failed,
}

impl UploadStatus {
    /// Wire / database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "failed" => Ok(Self::Failed),
            other => Err(TaskError::InvalidStatus {
                given: other.to_string(),
            }),
        }
    }
}

/// A file uploaded into a task.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskFile {
    /// Opaque identifier.
    pub id: String,
    /// Parent task.
    pub task_id: String,
    /// Owner.
    pub user_id: String,
    /// Name the client supplied (kept verbatim, CJK included).
    pub original_filename: String,
    /// UUID-hex name on disk.
    pub stored_filename: String,
    /// Absolute path of the local blob.
    pub file_path: String,
    /// Size in bytes.
    pub file_size: i64,
    /// Declared MIME type.
    pub file_type: String,
    /// Lower-cased extension including the dot.
    pub file_extension: Option<String>,
    /// Upstream file handle; non-empty once `upload_status` is uploaded.
    pub dify_file_id: Option<String>,
    /// Serialized verbatim upstream reply.
    pub dify_response_data: Option<String>,
    /// Upload lifecycle state.
    pub upload_status: UploadStatus,
    /// Error detail for failed uploads.
    pub upload_error: Option<String>,
    /// Creation timestamp (UTC).
    pub created_at: NaiveDateTime,
    /// Last mutation timestamp (UTC).
    pub updated_at: NaiveDateTime,
}

impl TaskFile {
    /// API representation; includes the public download URL and the parsed
    /// upstream reply.
    pub fn to_json(&self) -> Value {
        let dify_response = self
            .dify_response_data
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        json!({
            "id": self.id,
            "task_id": self.task_id,
            "user_id": self.user_id,
            "original_filename": self.original_filename,
            "stored_filename": self.stored_filename,
            "download_url": format!("/api/tasks/{}/files/{}/download", self.task_id, self.id),
            "file_size": self.file_size,
            "file_type": self.file_type,
            "file_extension": self.file_extension,
            "dify_file_id": self.dify_file_id,
            "dify_response": dify_response,
            "upload_status": self.upload_status.as_str(),
            "upload_error": self.upload_error,
            "created_at": self.created_at.and_utc().to_rfc3339(),
            "updated_at": self.updated_at.and_utc().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> TaskFile {
        TaskFile {
            id: "f-1".into(),
            task_id: "t-1".into(),
            user_id: "u-1".into(),
            original_filename: "标准草案.pdf".into(),
            stored_filename: "abc123.pdf".into(),
            file_path: "/data/uploads/2025/01/15/u-1/abc123.pdf".into(),
            file_size: 1024,
            file_type: "application/pdf".into(),
            file_extension: Some(".pdf".into()),
            dify_file_id: Some("dify-9".into()),
            dify_response_data: Some(r#"{"id":"dify-9"}"#.into()),
            upload_status: UploadStatus::Uploaded,
            upload_error: None,
            created_at: chrono::Utc::now().naive_utc(),
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_to_json_exposes_download_url() {
        let json = sample_file().to_json();
        assert_eq!(
            json["download_url"],
            "/api/tasks/t-1/files/f-1/download"
        );
    }

    #[test]
    fn test_to_json_parses_upstream_reply() {
        let json = sample_file().to_json();
        assert_eq!(json["dify_response"]["id"], "dify-9");
    }

    #[test]
    fn test_unparseable_upstream_reply_becomes_null() {
        let mut file = sample_file();
        file.dify_response_data = Some("not-json".into());
        assert!(file.to_json()["dify_response"].is_null());
    }
}
