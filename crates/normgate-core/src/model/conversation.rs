//! Conversation entity: one record per upstream dialog exchange run for a
//! task, kept for audit (request, reply ids, timing, failure cause).

use chrono::NaiveDateTime;
use normgate_error::TaskError;
use serde_json::{json, Value};

/// Dialog exchange lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Recorded, upstream call not yet started.
    Pending,
    /// Upstream call in flight.
    Processing,
    /// Reply stored.
    Completed,
    /// Terminal failure; `error_message` carries the cause.
    Failed,
}

impl ConversationStatus {
    /// Wire / database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(TaskError::InvalidStatus {
                given: other.to_string(),
            }),
        }
    }
}

/// One dialog exchange with the upstream, bound to a task.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    /// Opaque identifier.
    pub id: String,
    /// Parent task.
    pub task_id: String,
    /// Related file, when the exchange was file-driven.
    pub file_id: Option<String>,
    /// Owner.
    pub user_id: String,
    /// What the user asked (the forwarded query).
    pub user_message: String,
    /// Serialized upstream reply.
    pub dify_response: Option<String>,
    /// Upstream conversation id.
    pub conversation_id: Option<String>,
    /// Upstream message id.
    pub message_id: Option<String>,
    /// Exchange lifecycle state.
    pub status: ConversationStatus,
    /// Upstream round-trip in seconds.
    pub response_time: Option<f64>,
    /// Failure cause for failed exchanges.
    pub error_message: Option<String>,
    /// Serialized request payload.
    pub request_data: Option<String>,
    /// Creation timestamp (UTC).
    pub created_at: NaiveDateTime,
    /// Last mutation timestamp (UTC).
    pub updated_at: NaiveDateTime,
}

impl Conversation {
    /// API representation with the stored JSON blobs parsed back.
    pub fn to_json(&self) -> Value {
        let dify_response = self
            .dify_response
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        let request_data = self
            .request_data
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        json!({
            "id": self.id,
            "task_id": self.task_id,
            "file_id": self.file_id,
            "user_id": self.user_id,
            "user_message": self.user_message,
            "dify_response": dify_response,
            "conversation_id": self.conversation_id,
            "message_id": self.message_id,
            "status": self.status.as_str(),
            "response_time": self.response_time,
            "error_message": self.error_message,
            "request_data": request_data,
            "created_at": self.created_at.and_utc().to_rfc3339(),
            "updated_at": self.updated_at.and_utc().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ConversationStatus::Pending,
            ConversationStatus::Processing,
            ConversationStatus::Completed,
            ConversationStatus::Failed,
        ] {
            assert_eq!(
                status.as_str().parse::<ConversationStatus>().unwrap(),
                status
            );
        }
        assert!("done".parse::<ConversationStatus>().is_err());
    }

    #[test]
    fn test_to_json_parses_blobs() {
        let now = chrono::Utc::now().naive_utc();
        let conversation = Conversation {
            id: "c-1".into(),
            task_id: "t-1".into(),
            file_id: None,
            user_id: "u-1".into(),
            user_message: "审查这份文档".into(),
            dify_response: Some(r#"{"answer":"ok"}"#.into()),
            conversation_id: Some("dify-c-1".into()),
            message_id: None,
            status: ConversationStatus::Completed,
            response_time: Some(1.25),
            error_message: None,
            request_data: Some(r#"{"query":"审查这份文档"}"#.into()),
            created_at: now,
            updated_at: now,
        };
        let json = conversation.to_json();
        assert_eq!(json["dify_response"]["answer"], "ok");
        assert_eq!(json["request_data"]["query"], "审查这份文档");
        assert_eq!(json["status"], "completed");
    }
}
