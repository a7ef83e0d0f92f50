#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("未找到上传的文件")]
    Missing,

    #[error("文件名无效")]
    EmptyFilename,

    #[error("不支持的文件类型。支持的类型: {allowed}")]
    ExtensionNotAllowed { allowed: String },

    #[error("文件大小超过限制（最大 {max_mib}MB）")]
    TooLarge { size: usize, max_mib: usize },

    #[error("文件不存在: {file_id}")]
    NotFound { file_id: String },

    #[error("文件不属于该任务")]
    TaskMismatch,

    #[error("文件不存在或已被删除")]
    BlobMissing,

    #[error("不支持预览此文件类型")]
    PreviewUnsupported,

    #[error("文件保存失败: {message}")]
    Io { message: String },
}

impl FileError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "file_missing",
            Self::EmptyFilename => "file_empty_filename",
            Self::ExtensionNotAllowed { .. } => "file_extension_not_allowed",
            Self::TooLarge { .. } => "file_too_large",
            Self::NotFound { .. } => "file_not_found",
            Self::TaskMismatch => "file_task_mismatch",
            Self::BlobMissing => "file_blob_missing",
            Self::PreviewUnsupported => "file_preview_unsupported",
            Self::Io { .. } => "file_io_error",
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
