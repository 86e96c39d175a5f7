//! 通知服务错误类型
//!
//! 区分两类故障：投递类错误（记录到单条通知的 error 字段后批处理继续）
//! 与持久层错误（对当前操作致命，向上传播）。错误文案会直接写入通知记录，
//! 供仪表盘和排障查询展示，因此保持稳定措辞。

use thiserror::Error;

use flowline_shared::error::FlowlineError;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("unknown notification channel: {0}")]
    UnknownChannel(String),

    #[error("{target} not configured")]
    NotConfigured { target: String },

    #[error("transport failure: channel={channel}, reason={reason}")]
    SendFailed { channel: String, reason: String },

    #[error("webhook returned non-success status: {status} {detail}")]
    WebhookStatus { status: u16, detail: String },

    #[error(transparent)]
    Store(#[from] FlowlineError),
}
