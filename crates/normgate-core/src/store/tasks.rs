//! Task repository and the transactional state machine.

use chrono::Utc;
use sqlx::mysql::MySqlPool;
use tracing::{info, warn};

use normgate_error::{GatewayError, TaskError};

use crate::model::{new_id, validate_transition, Task, TaskStatus, TaskType};

/// Parse a comma-separated multi-status filter. Tokens are trimmed and
/// matched case-sensitively; unknown tokens are silently dropped.
pub fn parse_status_filter(raw: &str) -> Vec<TaskStatus> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// A page of tasks with the listing metadata.
#[derive(Debug)]
pub struct TaskPage {
    /// Rows for the requested page.
    pub tasks: Vec<Task>,
    /// Effective page number.
    pub page: u32,
    /// Page size.
    pub per_page: u32,
    /// Total matching rows.
    pub total: i64,
    /// Total page count.
    pub pages: u32,
}

/// Repository over the `tasks` table.
#[derive(Debug, Clone)]
pub struct TaskStore {
    pool: MySqlPool,
}

impl TaskStore {
    /// Wrap a pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Create a task in `pending`. A missing title falls back to
    /// "`<display> 任务 - <YYYY-MM-DD HH:MM>`".
    pub async fn create(
        &self,
        user_id: &str,
        task_type: TaskType,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<Task, GatewayError> {
        let now = Utc::now().naive_utc();
        let title = match title.filter(|t| !t.trim().is_empty()) {
            Some(title) => title.to_string(),
            None => format!(
                "{}任务 - {}",
                task_type.display_name(),
                now.format("%Y-%m-%d %H:%M")
            ),
        };
        let description = description
            .filter(|d| !d.trim().is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("自动创建的{}任务", task_type.display_name()));

        let task = Task {
            id: new_id(),
            user_id: user_id.to_string(),
            task_type,
            title,
            description: Some(description),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO tasks (id, user_id, task_type, title, description, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.user_id)
        .bind(task.task_type)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        info!(task_id = %task.id, user_id = %user_id, task_type = %task_type, "task created");
        Ok(task)
    }

    /// Look up by id.
    pub async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>, GatewayError> {
        Ok(sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Look up a task the caller must own. Missing rows answer "not found",
    /// foreign rows "forbidden".
    pub async fn find_owned(&self, task_id: &str, user_id: &str) -> Result<Task, GatewayError> {
        let task = self
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound {
                task_id: task_id.to_string(),
            })?;
        if task.user_id != user_id {
            return Err(TaskError::Forbidden.into());
        }
        Ok(task)
    }

    /// Advance a task's status inside a row-locking transaction. The legal-
    /// transition check runs against the row as currently stored, so only
    /// one writer can advance a task at a time.
    pub async fn advance_status(
        &self,
        task_id: &str,
        next: TaskStatus,
    ) -> Result<Task, GatewayError> {
        let mut tx = self.pool.begin().await?;
        let mut task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ? FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| TaskError::NotFound {
                task_id: task_id.to_string(),
            })?;

        validate_transition(task.status, next)?;

        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(next)
            .bind(now)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(task_id = %task_id, from = %task.status, to = %next, "task status advanced");
        task.status = next;
        task.updated_at = now;
        Ok(task)
    }

    /// Best-effort terminal failure: flips any non-terminal task to
    /// `failed`; terminal tasks are left untouched.
    pub async fn mark_failed(&self, task_id: &str) {
        let outcome = async {
            let mut tx = self.pool.begin().await?;
            let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ? FOR UPDATE")
                .bind(task_id)
                .fetch_optional(&mut *tx)
                .await?;
            let Some(task) = task else {
                return Ok::<_, GatewayError>(());
            };
            if task.status.is_terminal() {
                return Ok(());
            }
            sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
                .bind(TaskStatus::Failed)
                .bind(Utc::now().naive_utc())
                .bind(task_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => info!(task_id = %task_id, "task marked failed"),
            Err(e) => warn!(task_id = %task_id, error = %e, "failed to mark task failed"),
        }
    }

    /// List the caller's tasks, newest first, with optional multi-status and
    /// type filters.
    pub async fn list(
        &self,
        user_id: &str,
        statuses: &[TaskStatus],
        task_type: Option<TaskType>,
        page: u32,
        per_page: u32,
    ) -> Result<TaskPage, GatewayError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut filters = String::new();
        if !statuses.is_empty() {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            filters.push_str(&format!(" AND status IN ({placeholders})"));
        }
        if task_type.is_some() {
            filters.push_str(" AND task_type = ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM tasks WHERE user_id = ?{filters}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        for status in statuses {
            count_query = count_query.bind(*status);
        }
        if let Some(task_type) = task_type {
            count_query = count_query.bind(task_type);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            "SELECT * FROM tasks WHERE user_id = ?{filters} ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let mut list_query = sqlx::query_as::<_, Task>(&list_sql).bind(user_id);
        for status in statuses {
            list_query = list_query.bind(*status);
        }
        if let Some(task_type) = task_type {
            list_query = list_query.bind(task_type);
        }
        let tasks = list_query
            .bind(i64::from(per_page))
            .bind(i64::from((page - 1) * per_page))
            .fetch_all(&self.pool)
            .await?;

        let pages = (u32::try_from(total).unwrap_or(u32::MAX)).div_ceil(per_page);
        Ok(TaskPage {
            tasks,
            page,
            per_page,
            total,
            pages,
        })
    }

    /// Per-status counts for one user's dashboard.
    pub async fn count_by_status(&self, user_id: &str) -> Result<Vec<(String, i64)>, GatewayError> {
        Ok(sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM tasks WHERE user_id = ? GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Per-type counts for one user's dashboard.
    pub async fn count_by_type(&self, user_id: &str) -> Result<Vec<(String, i64)>, GatewayError> {
        Ok(sqlx::query_as::<_, (String, i64)>(
            "SELECT task_type, COUNT(*) FROM tasks WHERE user_id = ? GROUP BY task_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Delete a task with its results and file rows in one transaction.
    /// On-disk blobs are the caller's responsibility (best-effort, after
    /// commit).
    pub async fn delete_cascade(&self, task_id: &str) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM conversations WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task_results WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM task_files WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(task_id = %task_id, "task deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_multi() {
        let parsed = parse_status_filter("processing,completed,failed");
        assert_eq!(
            parsed,
            vec![
                TaskStatus::Processing,
                TaskStatus::Completed,
                TaskStatus::Failed
            ]
        );
    }

    #[test]
    fn test_status_filter_trims_tokens() {
        let parsed = parse_status_filter(" processing , failed ");
        assert_eq!(parsed, vec![TaskStatus::Processing, TaskStatus::Failed]);
    }

    #[test]
    fn test_status_filter_ignores_unknown_tokens() {
        assert_eq!(
            parse_status_filter("bogus,completed"),
            vec![TaskStatus::Completed]
        );
        assert!(parse_status_filter("bogus").is_empty());
        assert!(parse_status_filter("").is_empty());
    }

    #[test]
    fn test_status_filter_is_case_sensitive() {
        assert!(parse_status_filter("Processing,COMPLETED").is_empty());
    }
}
