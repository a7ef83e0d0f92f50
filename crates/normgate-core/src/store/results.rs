//! Task-result repository. Results are append-only.

use sqlx::mysql::MySqlPool;

use normgate_error::GatewayError;

use crate::model::TaskResult;

/// Repository over the `task_results` table.
#[derive(Debug, Clone)]
pub struct ResultStore {
    pool: MySqlPool,
}

impl ResultStore {
    /// Wrap a pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Persist a new result.
    pub async fn insert(&self, result: &TaskResult) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO task_results (id, task_id, user_id, message_id, conversation_id, mode, \
             answer, result_metadata, full_response, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&result.id)
        .bind(&result.task_id)
        .bind(&result.user_id)
        .bind(&result.message_id)
        .bind(&result.conversation_id)
        .bind(&result.mode)
        .bind(&result.answer)
        .bind(&result.result_metadata)
        .bind(&result.full_response)
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up by id.
    pub async fn find_by_id(&self, result_id: &str) -> Result<Option<TaskResult>, GatewayError> {
        Ok(
            sqlx::query_as::<_, TaskResult>("SELECT * FROM task_results WHERE id = ?")
                .bind(result_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Results of a task for a user, newest first.
    pub async fn find_by_user_and_task(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Vec<TaskResult>, GatewayError> {
        Ok(sqlx::query_as::<_, TaskResult>(
            "SELECT * FROM task_results WHERE user_id = ? AND task_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// The most recent result of a task, if any.
    pub async fn latest_for_task(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Option<TaskResult>, GatewayError> {
        Ok(sqlx::query_as::<_, TaskResult>(
            "SELECT * FROM task_results WHERE user_id = ? AND task_id = ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
