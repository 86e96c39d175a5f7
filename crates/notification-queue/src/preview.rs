//! 通知预览渲染
//!
//! 将通知记录映射为人类可读的预览（收件人、主题、正文）。渲染是纯函数：
//! 不读写存储、无副作用，相同输入恒得相同输出。分发为两级：先按渠道，
//! 邮件渠道再按 payload.type 选择模板。所有分支都有兜底模板，
//! 未识别的渠道或类型渲染为回退预览而不是错误。

use crate::model::{Notification, NotificationChannel, NotificationPreview};

/// 工作流启动类邮件的收件地址（运维值班组）
const OPS_ADDRESS: &str = "operations@flowline.dev";
/// SLA 预警类邮件的收件地址（管理层）
const MANAGEMENT_ADDRESS: &str = "management@flowline.dev";
/// 未识别邮件类型的兜底收件地址
const SYSTEM_ADDRESS: &str = "system@flowline.dev";
/// 里程碑提醒的收件地址（工作流参与者组）
const PARTICIPANTS_ADDRESS: &str = "participants@flowline.dev";
/// 干系人记录缺失邮箱时使用的占位地址
const UNKNOWN_STAKEHOLDER_ADDRESS: &str = "unknown-stakeholder@flowline.dev";

/// 通知预览渲染器
///
/// 除仪表盘标识来自配置外，收件地址和模板措辞均为固定规则。
pub struct PreviewRenderer {
    /// 仪表盘渠道在预览中展示的目标标识
    dashboard_target: String,
}

impl PreviewRenderer {
    pub fn new(dashboard_target: impl Into<String>) -> Self {
        Self {
            dashboard_target: dashboard_target.into(),
        }
    }

    /// 渲染通知预览
    ///
    /// 对任意渠道和载荷都能给出结果，永不报错。
    pub fn render(&self, notification: &Notification) -> NotificationPreview {
        let preview = match &notification.channel {
            NotificationChannel::Email => self.render_email(notification),
            NotificationChannel::Stakeholder => self.render_stakeholder(notification),
            NotificationChannel::Dashboard => self.render_dashboard(notification),
            NotificationChannel::Milestone => self.render_milestone(notification),
            NotificationChannel::Other(_) => self.render_unknown(notification),
        };

        NotificationPreview {
            channel: notification.channel.clone(),
            scheduled_for: Some(notification.scheduled_for),
            ..preview
        }
    }

    /// 邮件渠道：按 payload.type 二级分发
    fn render_email(&self, notification: &Notification) -> NotificationPreview {
        let payload = &notification.payload;
        match extract_str(payload, "type", "").as_str() {
            "workflow_initiated" => {
                let incident_title = extract_str(payload, "incidentTitle", "unknown incident");
                let due_at = extract_str(payload, "dueAt", "unspecified");
                preview(
                    vec![OPS_ADDRESS.to_string()],
                    format!("Workflow Initiated - {incident_title}"),
                    format!(
                        "Workflow for incident \"{incident_title}\" has been initiated.\nResponse is due by {due_at}."
                    ),
                )
            }
            "sla_breach_warning" => {
                let incident_title = extract_str(payload, "incidentTitle", "unknown incident");
                let time_remaining = extract_str(payload, "timeRemaining", "unknown");
                preview(
                    vec![MANAGEMENT_ADDRESS.to_string()],
                    format!("SLA Breach Warning - {incident_title}"),
                    format!(
                        "Incident \"{incident_title}\" is at risk of breaching its SLA.\nTime remaining: {time_remaining}."
                    ),
                )
            }
            // 未识别的邮件类型：原样展示载荷，不报错
            _ => preview(
                vec![SYSTEM_ADDRESS.to_string()],
                "Workflow Notification".to_string(),
                serialize_payload(payload),
            ),
        }
    }

    /// 干系人渠道：收件人取载荷中的邮箱，缺失时用占位地址
    fn render_stakeholder(&self, notification: &Notification) -> NotificationPreview {
        let payload = &notification.payload;
        let email = extract_str(payload, "email", UNKNOWN_STAKEHOLDER_ADDRESS);
        let name = extract_str(payload, "stakeholderName", "Stakeholder");
        let role = extract_str(payload, "stakeholderRole", "participant");
        let workflow_id = extract_str(payload, "workflowId", &notification.workflow_id);

        preview(
            vec![email],
            format!("You have been added as {role}"),
            format!("Hello {name}, you have been added to workflow {workflow_id} as {role}."),
        )
    }

    /// 仪表盘渠道：描述 webhook 目标并完整序列化载荷
    fn render_dashboard(&self, notification: &Notification) -> NotificationPreview {
        preview(
            vec![self.dashboard_target.clone()],
            "Dashboard Update".to_string(),
            format!(
                "Webhook POST to {}: {}",
                self.dashboard_target,
                serialize_payload(&notification.payload)
            ),
        )
    }

    /// 里程碑渠道：主题与正文都包含剩余时间
    fn render_milestone(&self, notification: &Notification) -> NotificationPreview {
        let time_remaining = extract_str(&notification.payload, "timeRemaining", "unknown");
        preview(
            vec![PARTICIPANTS_ADDRESS.to_string()],
            format!("Milestone Due in {time_remaining}"),
            format!("A workflow milestone is due in {time_remaining}."),
        )
    }

    /// 未识别渠道的通用兜底，保证渲染对所有渠道值是全函数
    fn render_unknown(&self, notification: &Notification) -> NotificationPreview {
        preview(
            vec!["Unknown".to_string()],
            "Unknown notification type".to_string(),
            serialize_payload(&notification.payload),
        )
    }
}

/// 构造预览骨架，channel 与 scheduled_for 由 render 统一补齐
fn preview(recipients: Vec<String>, subject: String, message: String) -> NotificationPreview {
    NotificationPreview {
        channel: NotificationChannel::Other(String::new()),
        recipients,
        subject,
        message,
        scheduled_for: None,
    }
}

/// 从 JSON 对象中安全提取字符串值
///
/// 优先取字符串类型的值，对数值等非字符串类型自动转换为字符串表示，
/// 确保模板渲染不会因类型不匹配而 panic。
fn extract_str(data: &serde_json::Value, key: &str, default: &str) -> String {
    data.get(key)
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| default.to_string())
}

/// 载荷的兜底序列化，理论上 Value 序列化不会失败
fn serialize_payload(payload: &serde_json::Value) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| payload.to_string())
}
