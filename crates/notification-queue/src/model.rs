//! 通知数据模型
//!
//! 定义通知记录、渠道、状态与预览的统一结构。渠道和状态以小写字符串
//! 形式序列化及入库；渠道枚举保留未识别的原始字符串而不是拒绝解析，
//! 保证渲染和调度对任意输入都是全函数。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NotificationChannel — 通知渠道
// ---------------------------------------------------------------------------

/// 通知渠道
///
/// 渠道同时决定渲染模板与投递传输。未识别的渠道值保留在 `Other` 中，
/// 由调度器在投递阶段将其转化为单条失败，而不是在解析阶段报错。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationChannel {
    Email,
    Stakeholder,
    Dashboard,
    Milestone,
    /// 未识别的渠道，保留原始字符串用于错误展示
    Other(String),
}

impl NotificationChannel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::Stakeholder => "stakeholder",
            Self::Dashboard => "dashboard",
            Self::Milestone => "milestone",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for NotificationChannel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "email" => Self::Email,
            "stakeholder" => Self::Stakeholder,
            "dashboard" => Self::Dashboard,
            "milestone" => Self::Milestone,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for NotificationChannel {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<NotificationChannel> for String {
    fn from(channel: NotificationChannel) -> Self {
        channel.as_str().to_string()
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NotificationStatus — 通知生命周期状态
// ---------------------------------------------------------------------------

/// 通知生命周期状态
///
/// 状态转换只允许 queued -> sent 或 queued -> failed，各至多一次。
/// 终态不会被本服务重置回 queued——重新排队是外部系统的职责。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// 是否为终态（sent 或 failed）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued)
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Notification — 通知记录
// ---------------------------------------------------------------------------

/// 通知记录
///
/// 队列中的中心实体。`payload` 以 JSON 承载渠道/类型相关的业务字段，
/// 其中 `type` 字段选择渲染模板；载荷形状在入队时不做校验，
/// 缺失字段在渲染阶段以占位符兜底。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// 记录唯一标识（UUID v7），由存储层在插入时分配
    pub id: String,
    /// 所属工作流 ID，一个工作流可对应多条通知
    pub workflow_id: String,
    pub channel: NotificationChannel,
    pub payload: serde_json::Value,
    pub status: NotificationStatus,
    /// 期望投递时间；本服务只记录不做时间门控，实际触发由外部调度器负责
    pub scheduled_for: DateTime<Utc>,
    /// 投递成功时间，status 为 sent 时必有且仅设置一次
    pub sent_at: Option<DateTime<Utc>>,
    /// 投递失败原因，status 为 failed 时必有且仅设置一次
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 待插入的通知
///
/// id、status、created_at 由存储层在插入时补齐，调用方只描述业务内容。
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub workflow_id: String,
    pub channel: NotificationChannel,
    pub payload: serde_json::Value,
    /// 缺省时由存储层取当前时间
    pub scheduled_for: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// DeliveryOutcome — 投递结果
// ---------------------------------------------------------------------------

/// 单条通知的投递结果
///
/// 插入之后记录能接受的仅有的两种变更，与状态机的两条合法转换一一对应。
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Sent { sent_at: DateTime<Utc> },
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// NotificationPreview — 渲染预览
// ---------------------------------------------------------------------------

/// 通知的人类可读预览
///
/// 由渲染器纯函数生成，既用于投递前的内容检查，也是邮件类渠道
/// 构建出站消息的来源。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreview {
    pub channel: NotificationChannel,
    pub recipients: Vec<String>,
    pub subject: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}
