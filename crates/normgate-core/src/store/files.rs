//! Task-file repository.

use chrono::Utc;
use sqlx::mysql::MySqlPool;

use normgate_error::GatewayError;

use crate::model::{TaskFile, UploadStatus};

/// Repository over the `task_files` table.
#[derive(Debug, Clone)]
pub struct FileStore {
    pool: MySqlPool,
}

impl FileStore {
    /// Wrap a pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly saved file row.
    pub async fn insert(&self, file: &TaskFile) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO task_files (id, task_id, user_id, original_filename, stored_filename, \
             file_path, file_size, file_type, file_extension, dify_file_id, dify_response_data, \
             upload_status, upload_error, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.id)
        .bind(&file.task_id)
        .bind(&file.user_id)
        .bind(&file.original_filename)
        .bind(&file.stored_filename)
        .bind(&file.file_path)
        .bind(file.file_size)
        .bind(&file.file_type)
        .bind(&file.file_extension)
        .bind(&file.dify_file_id)
        .bind(&file.dify_response_data)
        .bind(file.upload_status)
        .bind(&file.upload_error)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record upstream acceptance: handle + verbatim reply, status uploaded.
    pub async fn set_uploaded(
        &self,
        file_id: &str,
        dify_file_id: &str,
        dify_response: &str,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE task_files SET dify_file_id = ?, dify_response_data = ?, upload_status = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(dify_file_id)
        .bind(dify_response)
        .bind(UploadStatus::Uploaded)
        .bind(Utc::now().naive_utc())
        .bind(file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a terminal upload failure with its cause.
    pub async fn set_failed(&self, file_id: &str, error: &str) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE task_files SET upload_status = ?, upload_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(UploadStatus::Failed)
        .bind(error)
        .bind(Utc::now().naive_utc())
        .bind(file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up by id.
    pub async fn find_by_id(&self, file_id: &str) -> Result<Option<TaskFile>, GatewayError> {
        Ok(
            sqlx::query_as::<_, TaskFile>("SELECT * FROM task_files WHERE id = ?")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// All files of a task, oldest first.
    pub async fn find_by_task(&self, task_id: &str) -> Result<Vec<TaskFile>, GatewayError> {
        Ok(sqlx::query_as::<_, TaskFile>(
            "SELECT * FROM task_files WHERE task_id = ? ORDER BY created_at ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
