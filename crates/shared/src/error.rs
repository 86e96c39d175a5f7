//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum FlowlineError {
    // ==================== 数据库错误 ====================
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("invalid state transition: {entity} id={id} - {reason}")]
    InvalidTransition {
        entity: String,
        id: String,
        reason: String,
    },

    // ==================== 配置错误 ====================
    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    // ==================== 序列化错误 ====================
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==================== 通用错误 ====================
    #[error("internal error: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, FlowlineError>;

impl FlowlineError {
    /// 获取错误码
    ///
    /// 错误码用于日志检索和监控告警的分类聚合，保持稳定不随错误文案变化。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为持久层错误
    ///
    /// 持久层错误对当前操作是致命的：批处理流程遇到此类错误应中止并向上传播，
    /// 而不是像投递失败那样记录到单条通知后继续。
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
