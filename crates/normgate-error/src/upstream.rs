#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("网络请求失败: {message}")]
    Request { message: String },

    /// Non-2xx reply from the upstream. `body` carries the upstream payload
    /// verbatim (parsed JSON when possible, `{error, detail}` otherwise) so
    /// handlers can forward it unchanged.
    #[error("API返回错误: {status}")]
    Status { status: u16, body: serde_json::Value },

    #[error("上游请求超时")]
    Timeout,

    #[error("上游响应无效: {reason}")]
    InvalidResponse { reason: String },

    #[error("不支持的应用场景: {given}")]
    UnknownScenario { given: String },

    #[error("未知的API类型: {given}")]
    UnknownApiType { given: String },
}

impl UpstreamError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Request { .. } => "upstream_request_failed",
            Self::Status { .. } => "upstream_error",
            Self::Timeout => "upstream_timeout",
            Self::InvalidResponse { .. } => "upstream_invalid_response",
            Self::UnknownScenario { .. } => "unknown_scenario",
            Self::UnknownApiType { .. } => "unknown_api_type",
        }
    }

    /// HTTP status the gateway should relay for this error.
    pub fn relay_status(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            Self::Timeout => 504,
            _ => 500,
        }
    }
}
