#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("任务不存在: {task_id}")]
    NotFound { task_id: String },

    #[error("无权限访问此任务")]
    Forbidden,

    #[error("无效的任务类型: {given}")]
    InvalidTaskType { given: String },

    #[error("无效的任务状态: {given}")]
    InvalidStatus { given: String },

    #[error("非法的任务状态变更: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("任务类型 '{display}' 不支持分页查询，请使用任务详情接口获取完整结果")]
    NotPaginatable { display: String },

    #[error("任务状态为 '{display}'，只有已完成的任务才能进行分页查询")]
    NotCompleted { display: String },

    #[error("任务结果数据为空或无法解析")]
    EmptyResult,

    #[error("任务结果数据格式不正确，应为列表格式")]
    MalformedResult,

    #[error("任务结果不存在: {result_id}")]
    ResultNotFound { result_id: String },

    #[error("任务不处于可处理状态，请先完成文件上传")]
    NotReadyForProcessing,
}

impl TaskError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "task_not_found",
            Self::Forbidden => "task_forbidden",
            Self::InvalidTaskType { .. } => "invalid_task_type",
            Self::InvalidStatus { .. } => "invalid_task_status",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotPaginatable { .. } => "task_not_paginatable",
            Self::NotCompleted { .. } => "task_not_completed",
            Self::EmptyResult => "task_result_empty",
            Self::MalformedResult => "task_result_malformed",
            Self::ResultNotFound { .. } => "task_result_not_found",
            Self::NotReadyForProcessing => "task_not_ready",
        }
    }
}
