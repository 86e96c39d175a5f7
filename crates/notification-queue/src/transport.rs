//! 渠道传输层
//!
//! 通过 `EmailTransport` / `WebhookTransport` trait 抽象出站投递行为。
//! 邮件传输当前为模拟实现（仅记录日志），便于在无外部依赖的情况下
//! 验证队列管道的完整性；替换为真实 SMTP 客户端时只需实现同一 trait。
//! Webhook 传输基于 reqwest，POST JSON 并以 HTTP 2xx 作为成功判定。

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use flowline_shared::config::SmtpConfig;

use crate::error::NotificationError;

// ---------------------------------------------------------------------------
// EmailTransport — 邮件传输
// ---------------------------------------------------------------------------

/// 出站邮件消息
///
/// text 为纯文本正文，html 为同一内容的最小标记形式（逐行 `<p>` 包裹）。
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// 邮件传输 trait
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// 发送一封邮件，失败时返回带原因的错误
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// 模拟 SMTP 邮件传输
///
/// 持有连接参数但只记录日志，生产环境中替换为真实 SMTP 会话
/// 或邮件服务商（如 SendGrid）的 API 调用。
pub struct SmtpEmailTransport {
    config: SmtpConfig,
}

impl SmtpEmailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        let message_id = Uuid::now_v7().to_string();

        info!(
            transport = "SMTP",
            host = %self.config.host,
            port = self.config.port,
            from = %self.config.from_address,
            to = %message.to,
            subject = %message.subject,
            message_id = %message_id,
            "模拟发送邮件通知"
        );

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookTransport — Webhook 传输
// ---------------------------------------------------------------------------

/// Webhook 传输 trait
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// 向目标地址 POST JSON，携带 Bearer 认证；HTTP 2xx 视为成功
    async fn post(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<(), NotificationError>;
}

/// 基于 reqwest 的 Webhook 传输
///
/// Client 内部持有连接池，整个服务共享一个实例。
pub struct HttpWebhookTransport {
    client: reqwest::Client,
}

impl HttpWebhookTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpWebhookTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post(
        &self,
        url: &str,
        api_key: &str,
        body: &serde_json::Value,
    ) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed {
                channel: "dashboard".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::WebhookStatus {
                status: status.as_u16(),
                detail: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }

        info!(url = %url, status = status.as_u16(), "仪表盘 webhook 投递成功");
        Ok(())
    }
}
