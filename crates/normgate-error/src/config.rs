#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {name}")]
    MissingVar { name: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidVar { name: String, reason: String },

    #[error("Failed to prepare directory {path}: {message}")]
    Directory { path: String, message: String },
}

impl ConfigError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingVar { .. } => "config_missing_var",
            Self::InvalidVar { .. } => "config_invalid_var",
            Self::Directory { .. } => "config_directory",
        }
    }
}
