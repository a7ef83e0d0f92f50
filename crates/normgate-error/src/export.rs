#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("没有可导出的数据")]
    NothingToExport,

    #[error("导出渲染失败: {reason}")]
    Render { reason: String },

    #[error("导出文件写入失败: {message}")]
    Io { message: String },
}

impl ExportError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NothingToExport => "export_empty",
            Self::Render { .. } => "export_render_failed",
            Self::Io { .. } => "export_io_error",
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}
