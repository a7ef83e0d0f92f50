#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("缺少授权token，请先登录")]
    MissingToken,

    #[error("Token无效，请检查格式或重新登录")]
    InvalidToken { reason: String },

    #[error("Token已过期，请重新登录")]
    TokenExpired,

    #[error("Token已被撤销，请重新登录")]
    TokenRevoked,

    #[error("用户不存在")]
    UnknownUser,

    #[error("账户已被禁用")]
    AccountDisabled,

    #[error("用户名/邮箱或密码错误")]
    InvalidCredentials,

    #[error("当前密码错误")]
    WrongCurrentPassword,

    #[error("无效的重置令牌")]
    InvalidResetToken,

    #[error("重置令牌已过期或无效")]
    ResetTokenExpired,

    #[error("Token签发失败: {reason}")]
    TokenCreation { reason: String },
}

impl AuthError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "token_missing",
            Self::InvalidToken { .. } => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::TokenRevoked => "token_revoked",
            Self::UnknownUser => "unknown_user",
            Self::AccountDisabled => "account_disabled",
            Self::InvalidCredentials => "invalid_credentials",
            Self::WrongCurrentPassword => "wrong_current_password",
            Self::InvalidResetToken => "invalid_reset_token",
            Self::ResetTokenExpired => "reset_token_expired",
            Self::TokenCreation { .. } => "token_creation_failed",
        }
    }
}
