//! Persisted entities and the task state machine.

mod conversation;
mod task;
mod task_file;
mod task_result;
mod user;

pub use conversation::{Conversation, ConversationStatus};
pub use task::{validate_transition, Task, TaskStatus, TaskType};
pub use task_file::{TaskFile, UploadStatus};
pub use task_result::TaskResult;
pub use user::User;

/// Generate a fresh 36-char opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
