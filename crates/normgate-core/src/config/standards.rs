//! Standard-processing registry: one upstream application per task type,
//! plus the shared file-upload endpoint.

use normgate_error::TaskError;
use serde_json::{json, Value};

use super::{env_or, mask_key};
use crate::model::TaskType;

/// Resolved upstream application for one task type.
#[derive(Debug, Clone)]
pub struct StandardApp {
    /// Display name of the task type.
    pub name: &'static str,
    /// Chat endpoint URL for this type.
    pub url: String,
    /// Bearer credential for this type.
    pub key: String,
    /// Shared file-upload endpoint.
    pub file_upload_url: String,
}

/// Registry mapping the six task types to their upstream credentials.
#[derive(Debug, Clone)]
pub struct StandardTypeRegistry {
    entries: Vec<(TaskType, StandardApp)>,
}

fn env_suffix(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Interpretation => "INTERPRETATION",
        TaskType::Recommendation => "RECOMMENDATION",
        TaskType::Comparison => "COMPARISON",
        TaskType::International => "INTERNATIONAL",
        TaskType::Compliance => "COMPLIANCE",
        TaskType::Review => "REVIEW",
    }
}

fn default_key(task_type: TaskType) -> String {
    format!("app-{}-key", env_suffix(task_type).to_lowercase())
}

impl StandardTypeRegistry {
    /// Build the registry from the environment.
    pub fn from_env(file_upload_url: &str) -> Self {
        let entries = TaskType::ALL
            .iter()
            .map(|&task_type| {
                let suffix = env_suffix(task_type);
                let app = StandardApp {
                    name: task_type.display_name(),
                    url: env_or(
                        &format!("DIFY_STANDARD_{suffix}_URL"),
                        "http://localhost/v1/chat-messages",
                    ),
                    key: env_or(&format!("DIFY_STANDARD_{suffix}_KEY"), &default_key(task_type)),
                    file_upload_url: file_upload_url.to_string(),
                };
                (task_type, app)
            })
            .collect();

        Self { entries }
    }

    /// Resolve the upstream application for a task type.
    pub fn resolve(&self, task_type: TaskType) -> Result<&StandardApp, TaskError> {
        self.entries
            .iter()
            .find(|(t, _)| *t == task_type)
            .map(|(_, app)| app)
            .ok_or_else(|| TaskError::InvalidTaskType {
                given: task_type.as_str().to_string(),
            })
    }

    /// All supported task types for the `/tasks/types` endpoint.
    pub fn summaries(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(task_type, app)| {
                json!({
                    "key": task_type.as_str(),
                    "name": app.name,
                    "description": format!("{}服务", app.name),
                })
            })
            .collect()
    }

    /// Configuration status across all types, with masked credentials.
    pub fn status(&self) -> Value {
        let details: Vec<Value> = self
            .entries
            .iter()
            .map(|(task_type, app)| {
                json!({
                    "standard_type": task_type.as_str(),
                    "name": app.name,
                    "is_configured": !app.url.is_empty() && !app.key.is_empty(),
                    "api_key_masked": mask_key(&app.key),
                })
            })
            .collect();
        json!({
            "total_types": self.entries.len(),
            "type_details": details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_six_types_registered() {
        let registry = StandardTypeRegistry::from_env("http://localhost/v1/files/upload");
        assert_eq!(registry.summaries().len(), 6);
        for task_type in TaskType::ALL {
            assert!(registry.resolve(task_type).is_ok());
        }
    }

    #[test]
    fn test_file_upload_url_is_shared() {
        let registry = StandardTypeRegistry::from_env("http://upstream/v1/files/upload");
        let review = registry.resolve(TaskType::Review).unwrap();
        let comparison = registry.resolve(TaskType::Comparison).unwrap();
        assert_eq!(review.file_upload_url, comparison.file_upload_url);
    }
}
