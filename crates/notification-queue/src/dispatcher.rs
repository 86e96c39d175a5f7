//! 渠道调度器
//!
//! 将一条 queued 通知路由到对应的传输通道：邮件类渠道（email、stakeholder、
//! milestone）经预览渲染后走邮件传输，dashboard 渠道将原始载荷 POST 到
//! 配置的 webhook 地址，未识别渠道直接判定失败。每次调度至多一次出站调用，
//! 不触碰存储——状态落账由批处理器负责。

use std::sync::Arc;

use tracing::debug;

use flowline_shared::config::DashboardConfig;

use crate::error::NotificationError;
use crate::model::{Notification, NotificationChannel};
use crate::preview::PreviewRenderer;
use crate::transport::{EmailMessage, EmailTransport, WebhookTransport};

/// 渠道调度器
///
/// 服务启动时构造一次，持有共享的传输句柄；不维护可变状态，
/// 可被批处理器并发调用。
pub struct ChannelDispatcher {
    renderer: PreviewRenderer,
    email: Arc<dyn EmailTransport>,
    webhook: Arc<dyn WebhookTransport>,
    dashboard: DashboardConfig,
}

impl ChannelDispatcher {
    pub fn new(
        email: Arc<dyn EmailTransport>,
        webhook: Arc<dyn WebhookTransport>,
        dashboard: DashboardConfig,
    ) -> Self {
        let renderer = PreviewRenderer::new(dashboard.target_name());
        Self {
            renderer,
            email,
            webhook,
            dashboard,
        }
    }

    /// 投递一条通知
    ///
    /// 返回的错误即该条通知的失败原因，调用方据此落账；
    /// 本方法不传播持久层错误，因为它从不访问存储。
    pub async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        match &notification.channel {
            NotificationChannel::Email
            | NotificationChannel::Stakeholder
            | NotificationChannel::Milestone => self.dispatch_email(notification).await,
            NotificationChannel::Dashboard => self.dispatch_dashboard(notification).await,
            NotificationChannel::Other(raw) => {
                Err(NotificationError::UnknownChannel(raw.clone()))
            }
        }
    }

    /// 邮件类渠道：预览渲染 -> 构建出站消息 -> 邮件传输
    async fn dispatch_email(&self, notification: &Notification) -> Result<(), NotificationError> {
        let preview = self.renderer.render(notification);

        let message = EmailMessage {
            to: preview.recipients.join(", "),
            subject: preview.subject,
            html: text_to_html(&preview.message),
            text: preview.message,
        };

        debug!(
            notification_id = %notification.id,
            channel = %notification.channel,
            to = %message.to,
            "构建邮件消息完成"
        );

        self.email.send(&message).await
    }

    /// 仪表盘渠道：原始载荷（非渲染预览）POST 到配置的 webhook
    async fn dispatch_dashboard(
        &self,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let Some(url) = self.dashboard.webhook_url.as_deref() else {
            return Err(NotificationError::NotConfigured {
                target: "dashboard webhook".to_string(),
            });
        };
        let Some(api_key) = self.dashboard.api_key.as_deref() else {
            return Err(NotificationError::NotConfigured {
                target: "dashboard api key".to_string(),
            });
        };

        self.webhook.post(url, api_key, &notification.payload).await
    }
}

/// 将纯文本正文转为最小 HTML：每行包裹为一个段落元素
fn text_to_html(text: &str) -> String {
    text.lines()
        .map(|line| format!("<p>{line}</p>"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NotificationStatus;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use serde_json::json;

    /// 记录收到消息的测试邮件传输
    #[derive(Default)]
    struct RecordingEmailTransport {
        messages: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailTransport for RecordingEmailTransport {
        async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
            self.messages.lock().push(message.clone());
            Ok(())
        }
    }

    /// 记录请求的测试 webhook 传输
    #[derive(Default)]
    struct RecordingWebhookTransport {
        requests: Mutex<Vec<(String, String, serde_json::Value)>>,
    }

    #[async_trait]
    impl WebhookTransport for RecordingWebhookTransport {
        async fn post(
            &self,
            url: &str,
            api_key: &str,
            body: &serde_json::Value,
        ) -> Result<(), NotificationError> {
            self.requests
                .lock()
                .push((url.to_string(), api_key.to_string(), body.clone()));
            Ok(())
        }
    }

    fn make_notification(channel: &str, payload: serde_json::Value) -> Notification {
        Notification {
            id: "n-test-001".to_string(),
            workflow_id: "w-001".to_string(),
            channel: NotificationChannel::from(channel),
            payload,
            status: NotificationStatus::Queued,
            scheduled_for: Utc::now(),
            sent_at: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    fn make_dispatcher(
        dashboard: DashboardConfig,
    ) -> (
        ChannelDispatcher,
        Arc<RecordingEmailTransport>,
        Arc<RecordingWebhookTransport>,
    ) {
        let email = Arc::new(RecordingEmailTransport::default());
        let webhook = Arc::new(RecordingWebhookTransport::default());
        let dispatcher = ChannelDispatcher::new(email.clone(), webhook.clone(), dashboard);
        (dispatcher, email, webhook)
    }

    fn configured_dashboard() -> DashboardConfig {
        DashboardConfig {
            webhook_url: Some("https://dashboard.flowline.dev/hooks/workflow".to_string()),
            api_key: Some("secret-key".to_string()),
            target: None,
        }
    }

    #[tokio::test]
    async fn test_email_channel_builds_message_from_preview() {
        let (dispatcher, email, _) = make_dispatcher(DashboardConfig::default());
        let notification = make_notification(
            "email",
            json!({
                "type": "workflow_initiated",
                "incidentTitle": "DB outage",
                "dueAt": "2024-01-01"
            }),
        );

        dispatcher.dispatch(&notification).await.unwrap();

        let messages = email.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to, "operations@flowline.dev");
        assert_eq!(messages[0].subject, "Workflow Initiated - DB outage");
        // html 正文逐行包裹为段落
        assert!(messages[0].html.starts_with("<p>"));
        assert_eq!(messages[0].html.matches("<p>").count(), 2);
    }

    #[tokio::test]
    async fn test_milestone_channel_uses_email_transport() {
        let (dispatcher, email, webhook) = make_dispatcher(DashboardConfig::default());
        let notification = make_notification("milestone", json!({ "timeRemaining": "3 days" }));

        dispatcher.dispatch(&notification).await.unwrap();

        assert_eq!(email.messages.lock().len(), 1);
        assert!(webhook.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_posts_raw_payload() {
        let (dispatcher, email, webhook) = make_dispatcher(configured_dashboard());
        let payload = json!({ "type": "status_update", "progress": 80 });
        let notification = make_notification("dashboard", payload.clone());

        dispatcher.dispatch(&notification).await.unwrap();

        let requests = webhook.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "https://dashboard.flowline.dev/hooks/workflow");
        assert_eq!(requests[0].1, "secret-key");
        // 发送的是原始载荷而非渲染预览
        assert_eq!(requests[0].2, payload);
        assert!(email.messages.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_without_url_fails_with_not_configured() {
        let (dispatcher, _, webhook) = make_dispatcher(DashboardConfig::default());
        let notification = make_notification("dashboard", json!({ "type": "status_update" }));

        let err = dispatcher.dispatch(&notification).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
        // 未配置时不应有出站调用
        assert!(webhook.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_channel_fails_without_transport_call() {
        let (dispatcher, email, webhook) = make_dispatcher(configured_dashboard());
        let notification = make_notification("carrier-pigeon", json!({}));

        let err = dispatcher.dispatch(&notification).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown notification channel: carrier-pigeon"
        );
        assert!(email.messages.lock().is_empty());
        assert!(webhook.requests.lock().is_empty());
    }

    #[test]
    fn test_text_to_html_wraps_each_line() {
        let html = text_to_html("first line\nsecond line");
        assert_eq!(html, "<p>first line</p>\n<p>second line</p>");
    }
}
