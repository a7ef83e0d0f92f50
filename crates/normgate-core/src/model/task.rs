//! Task entity, task-type/status closed sets, and transition enforcement.
//!
//! ```text
//! pending -> uploading | failed
//! uploading -> uploaded | failed
//! uploaded -> processing | failed
//! processing -> completed | failed
//! completed / failed -> ERROR (terminal, no further transitions)
//! ```

use chrono::NaiveDateTime;
use normgate_error::TaskError;
use serde_json::{json, Value};

/// The six standard-processing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum TaskType {
    /// 标准解读
    #[sqlx(rename = "standard_interpretation")]
    Interpretation,
    /// 标准推荐
    #[sqlx(rename = "standard_recommendation")]
    Recommendation,
    /// 标准对比
    #[sqlx(rename = "standard_comparison")]
    Comparison,
    /// 标准国际化辅助
    #[sqlx(rename = "standard_international")]
    International,
    /// 标准符合性检查
    #[sqlx(rename = "standard_compliance")]
    Compliance,
    /// 标准审查
    #[sqlx(rename = "standard_review")]
    Review,
}

impl TaskType {
    /// All task types, in registry order.
    pub const ALL: [Self; 6] = [
        Self::Interpretation,
        Self::Recommendation,
        Self::Comparison,
        Self::International,
        Self::Compliance,
        Self::Review,
    ];

    /// Wire / database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interpretation => "standard_interpretation",
            Self::Recommendation => "standard_recommendation",
            Self::Comparison => "standard_comparison",
            Self::International => "standard_international",
            Self::Compliance => "standard_compliance",
            Self::Review => "standard_review",
        }
    }

    /// Chinese display name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Interpretation => "标准解读",
            Self::Recommendation => "标准推荐",
            Self::Comparison => "标准对比",
            Self::International => "标准国际化辅助",
            Self::Compliance => "标准符合性检查",
            Self::Review => "标准审查",
        }
    }

    /// Whether paginated result queries are offered for this type.
    pub const fn supports_pagination(self) -> bool {
        matches!(self, Self::Review | Self::Recommendation | Self::Compliance)
    }
}

impl std::str::FromStr for TaskType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaskError::InvalidTaskType {
                given: s.to_string(),
            })
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, no file activity yet.
    Pending,
    /// File upload in flight.
    Uploading,
    /// Every file reached the upstream; ready for processing.
    Uploaded,
    /// Background job running against the upstream.
    Processing,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
}

impl TaskStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Uploading,
        Self::Uploaded,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    /// Wire / database representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Chinese display name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "待处理",
            Self::Uploading => "上传中",
            Self::Uploaded => "上传完成",
            Self::Processing => "处理中",
            Self::Completed => "已完成",
            Self::Failed => "失败",
        }
    }

    /// Terminal states admit no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Uploading | Self::Failed)
                | (Self::Uploading, Self::Uploaded | Self::Failed)
                | (Self::Uploaded, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaskError::InvalidStatus {
                given: s.to_string(),
            })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a status transition; illegal targets and terminal sources fail.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}

/// A standard-processing task.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    /// Opaque 36-char identifier.
    pub id: String,
    /// Owner; immutable after creation.
    pub user_id: String,
    /// Which of the six operations this task runs.
    pub task_type: TaskType,
    /// Title; defaulted when the client does not supply one.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Creation timestamp (UTC).
    pub created_at: NaiveDateTime,
    /// Last mutation timestamp (UTC).
    pub updated_at: NaiveDateTime,
}

impl Task {
    /// API representation.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "task_type": self.task_type.as_str(),
            "task_type_display": self.task_type.display_name(),
            "title": self.title,
            "description": self.description,
            "status": self.status.as_str(),
            "status_display": self.status.display_name(),
            "created_at": self.created_at.and_utc().to_rfc3339(),
            "updated_at": self.updated_at.and_utc().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Uploading).is_ok());
        assert!(validate_transition(TaskStatus::Uploading, TaskStatus::Uploaded).is_ok());
        assert!(validate_transition(TaskStatus::Uploaded, TaskStatus::Processing).is_ok());
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Completed).is_ok());
    }

    #[test]
    fn test_every_active_state_can_fail() {
        for from in [
            TaskStatus::Pending,
            TaskStatus::Uploading,
            TaskStatus::Uploaded,
            TaskStatus::Processing,
        ] {
            assert!(validate_transition(from, TaskStatus::Failed).is_ok());
        }
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Processing).is_err());
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Uploaded).is_err());
        assert!(validate_transition(TaskStatus::Uploaded, TaskStatus::Completed).is_err());
        assert!(validate_transition(TaskStatus::Uploading, TaskStatus::Processing).is_err());
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed] {
            for target in TaskStatus::ALL {
                let result = validate_transition(terminal, target);
                assert!(
                    result.is_err(),
                    "expected error for {terminal:?} -> {target:?}"
                );
            }
        }
    }

    #[test]
    fn test_self_transition_is_illegal() {
        for status in TaskStatus::ALL {
            assert!(validate_transition(status, status).is_err());
        }
    }

    #[test]
    fn test_task_type_round_trip() {
        for task_type in TaskType::ALL {
            assert_eq!(task_type.as_str().parse::<TaskType>().unwrap(), task_type);
        }
        assert!("standard_bogus".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_status_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_pagination_support_set() {
        assert!(TaskType::Review.supports_pagination());
        assert!(TaskType::Recommendation.supports_pagination());
        assert!(TaskType::Compliance.supports_pagination());
        assert!(!TaskType::Interpretation.supports_pagination());
        assert!(!TaskType::Comparison.supports_pagination());
        assert!(!TaskType::International.supports_pagination());
    }
}
