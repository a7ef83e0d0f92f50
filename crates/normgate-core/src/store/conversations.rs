//! Conversation repository.

use chrono::Utc;
use sqlx::mysql::MySqlPool;

use normgate_error::GatewayError;

use crate::model::{new_id, Conversation, ConversationStatus};

/// Repository over the `conversations` table.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    pool: MySqlPool,
}

impl ConversationStore {
    /// Wrap a pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Open a new exchange record in `pending`.
    pub async fn open(
        &self,
        task_id: &str,
        user_id: &str,
        user_message: &str,
        request_data: &str,
    ) -> Result<Conversation, GatewayError> {
        let now = Utc::now().naive_utc();
        let conversation = Conversation {
            id: new_id(),
            task_id: task_id.to_string(),
            file_id: None,
            user_id: user_id.to_string(),
            user_message: user_message.to_string(),
            dify_response: None,
            conversation_id: None,
            message_id: None,
            status: ConversationStatus::Pending,
            response_time: None,
            error_message: None,
            request_data: Some(request_data.to_string()),
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO conversations (id, task_id, file_id, user_id, user_message, status, \
             request_data, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.task_id)
        .bind(&conversation.file_id)
        .bind(&conversation.user_id)
        .bind(&conversation.user_message)
        .bind(conversation.status)
        .bind(&conversation.request_data)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(conversation)
    }

    /// Mark the upstream call as started.
    pub async fn set_processing(&self, id: &str) -> Result<(), GatewayError> {
        sqlx::query("UPDATE conversations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ConversationStatus::Processing)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store the reply with timing and upstream ids.
    pub async fn set_completed(
        &self,
        id: &str,
        dify_response: &str,
        conversation_id: Option<&str>,
        message_id: Option<&str>,
        response_time_secs: f64,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE conversations SET status = ?, dify_response = ?, conversation_id = ?, \
             message_id = ?, response_time = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ConversationStatus::Completed)
        .bind(dify_response)
        .bind(conversation_id)
        .bind(message_id)
        .bind(response_time_secs)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a terminal failure with its cause and timing.
    pub async fn set_failed(
        &self,
        id: &str,
        error: &str,
        response_time_secs: f64,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE conversations SET status = ?, error_message = ?, response_time = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(ConversationStatus::Failed)
        .bind(error)
        .bind(response_time_secs)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Exchanges of a task, newest first.
    pub async fn find_by_task(&self, task_id: &str) -> Result<Vec<Conversation>, GatewayError> {
        Ok(sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE task_id = ? ORDER BY created_at DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
