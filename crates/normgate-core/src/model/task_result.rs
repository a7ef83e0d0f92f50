//! Task-result entity: what the upstream answered, verbatim and extracted.

use chrono::NaiveDateTime;
use serde_json::{json, Value};

/// One upstream reply persisted for a task. Immutable once written.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskResult {
    /// Opaque identifier.
    pub id: String,
    /// Parent task.
    pub task_id: String,
    /// Owner.
    pub user_id: String,
    /// Upstream message id.
    pub message_id: Option<String>,
    /// Upstream conversation id.
    pub conversation_id: Option<String>,
    /// Upstream mode.
    pub mode: Option<String>,
    /// Extracted payload; authoritative source for pagination and exports.
    pub answer: Option<String>,
    /// Serialized upstream metadata.
    pub result_metadata: Option<String>,
    /// Serialized verbatim upstream body.
    pub full_response: Option<String>,
    /// Creation timestamp (UTC).
    pub created_at: NaiveDateTime,
}

impl TaskResult {
    /// API representation with metadata / full response parsed back to JSON.
    pub fn to_json(&self) -> Value {
        let metadata = self
            .result_metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        let full_response = self
            .full_response
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Value>(raw).ok());
        json!({
            "id": self.id,
            "task_id": self.task_id,
            "user_id": self.user_id,
            "message_id": self.message_id,
            "conversation_id": self.conversation_id,
            "mode": self.mode,
            "answer": self.answer,
            "metadata": metadata,
            "full_response": full_response,
            "created_at": self.created_at.and_utc().to_rfc3339(),
        })
    }
}
