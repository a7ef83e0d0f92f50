//! Background job executor for the standard-processing path.
//!
//! One detached worker per job. The submit call returns as soon as the
//! worker is launched; the outcome is observable only through task
//! queries. Every error path ends with the task in `failed`.

use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use normgate_core::config::StandardApp;
use normgate_core::extract::extract_answer;
use normgate_core::model::{new_id, TaskResult, TaskStatus};
use normgate_error::{GatewayError, TaskError};

use crate::state::AppState;

/// Validate the gate and launch the worker. If the worker cannot be
/// launched after the gate passed, the task is flipped to `failed` before
/// returning.
pub async fn spawn_standard_processing(
    state: AppState,
    task_id: String,
    user_id: String,
    payload: Value,
) -> Result<(), GatewayError> {
    let task = state.tasks.find_owned(&task_id, &user_id).await?;
    if task.status != TaskStatus::Uploaded {
        return Err(TaskError::NotReadyForProcessing.into());
    }
    let app = state.standards.resolve(task.task_type)?.clone();

    // A worker needs a live runtime to be detached onto.
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(run_job(state, task_id, user_id, app, payload));
            Ok(())
        }
        Err(e) => {
            error!(task_id = %task_id, error = %e, "worker launch failed");
            state.tasks.mark_failed(&task_id).await;
            Err(GatewayError::internal("无法启动后台任务"))
        }
    }
}

async fn run_job(
    state: AppState,
    task_id: String,
    user_id: String,
    app: StandardApp,
    payload: Value,
) {
    info!(task_id = %task_id, url = %app.url, "standard processing job started");

    // First side-effect: uploaded -> processing, observable before any
    // upstream bytes arrive.
    if let Err(e) = state
        .tasks
        .advance_status(&task_id, TaskStatus::Processing)
        .await
    {
        error!(task_id = %task_id, error = %e, "could not enter processing");
        state.tasks.mark_failed(&task_id).await;
        return;
    }

    // Audit trail for the exchange. Bookkeeping failures never fail the
    // job itself.
    let user_message = payload
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let audit = match state
        .conversations
        .open(&task_id, &user_id, &user_message, &payload.to_string())
        .await
    {
        Ok(conversation) => {
            if let Err(e) = state.conversations.set_processing(&conversation.id).await {
                warn!(task_id = %task_id, error = %e, "conversation record update failed");
            }
            Some(conversation.id)
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "conversation record create failed");
            None
        }
    };

    let started = Instant::now();
    let body = match state.upstream.send_blocking(&app.url, &app.key, &payload).await {
        Ok(body) => body,
        Err(e) => {
            error!(task_id = %task_id, error = %e, "upstream call failed");
            if let Some(audit_id) = &audit {
                let elapsed = started.elapsed().as_secs_f64();
                if let Err(store_err) = state
                    .conversations
                    .set_failed(audit_id, &e.to_string(), elapsed)
                    .await
                {
                    warn!(task_id = %task_id, error = %store_err, "conversation record update failed");
                }
            }
            state.tasks.mark_failed(&task_id).await;
            return;
        }
    };

    if let Some(audit_id) = &audit {
        let elapsed = started.elapsed().as_secs_f64();
        if let Err(e) = state
            .conversations
            .set_completed(
                audit_id,
                &body.to_string(),
                body.get("conversation_id").and_then(Value::as_str),
                body.get("message_id").and_then(Value::as_str),
                elapsed,
            )
            .await
        {
            warn!(task_id = %task_id, error = %e, "conversation record update failed");
        }
    }

    let result = build_result(&task_id, &user_id, &body);
    if let Err(e) = state.results.insert(&result).await {
        error!(task_id = %task_id, error = %e, "result persist failed");
        state.tasks.mark_failed(&task_id).await;
        return;
    }

    match state
        .tasks
        .advance_status(&task_id, TaskStatus::Completed)
        .await
    {
        Ok(_) => info!(task_id = %task_id, result_id = %result.id, "standard processing completed"),
        Err(e) => {
            error!(task_id = %task_id, error = %e, "could not complete task");
            state.tasks.mark_failed(&task_id).await;
        }
    }
}

/// Shape a persisted result from the verbatim upstream body.
fn build_result(task_id: &str, user_id: &str, body: &Value) -> TaskResult {
    let metadata = body
        .get("metadata")
        .filter(|m| !m.is_null())
        .map(ToString::to_string);
    TaskResult {
        id: new_id(),
        task_id: task_id.to_string(),
        user_id: user_id.to_string(),
        message_id: body
            .get("message_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        conversation_id: body
            .get("conversation_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        mode: body.get("mode").and_then(Value::as_str).map(ToString::to_string),
        answer: extract_answer(body),
        result_metadata: metadata,
        full_response: Some(body.to_string()),
        created_at: Utc::now().naive_utc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_result_extracts_answer_and_ids() {
        let body = json!({
            "message_id": "m-1",
            "conversation_id": "c-1",
            "mode": "blocking",
            "answer": "[{\"sn\":1}]",
            "metadata": {"usage": {"total_tokens": 5}},
        });
        let result = build_result("t-1", "u-1", &body);
        assert_eq!(result.message_id.as_deref(), Some("m-1"));
        assert_eq!(result.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(result.answer.as_deref(), Some("[{\"sn\":1}]"));
        assert!(result.result_metadata.as_deref().unwrap().contains("total_tokens"));
        assert!(result.full_response.is_some());
    }

    #[test]
    fn test_build_result_workflow_shape() {
        let body = json!({
            "data": {"outputs": {"审查意见": "```json\n[{\"sn\":1}]\n```"}}
        });
        let result = build_result("t-1", "u-1", &body);
        assert_eq!(result.answer.as_deref(), Some("[{\"sn\":1}]"));
    }

    #[test]
    fn test_build_result_without_answer() {
        let result = build_result("t-1", "u-1", &json!({"event": "ping"}));
        assert!(result.answer.is_none());
        assert!(result.result_metadata.is_none());
    }
}
