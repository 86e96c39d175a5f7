//! 入队服务
//!
//! 从工作流与干系人事件创建 queued 状态的通知记录。载荷形状在此不做
//! 校验：畸形载荷在渲染阶段以兜底模板呈现，而不是在入队时报错。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use flowline_shared::error::Result;

use crate::model::{NewNotification, Notification, NotificationChannel};
use crate::store::NotificationStore;

/// 工作流干系人
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stakeholder {
    pub name: String,
    pub role: String,
    pub email: String,
}

/// 入队服务
pub struct EnqueueService {
    store: Arc<dyn NotificationStore>,
}

impl EnqueueService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// 创建一条 queued 通知
    ///
    /// `scheduled_for` 缺省为当前时间；该字段仅作记录，
    /// 实际的触发时机由外部调度器决定。
    pub async fn schedule_notification(
        &self,
        workflow_id: impl Into<String>,
        channel: NotificationChannel,
        payload: serde_json::Value,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Notification> {
        let notification = self
            .store
            .insert(NewNotification {
                workflow_id: workflow_id.into(),
                channel,
                payload,
                scheduled_for,
            })
            .await?;

        info!(
            notification_id = %notification.id,
            workflow_id = %notification.workflow_id,
            channel = %notification.channel,
            "通知已入队"
        );

        Ok(notification)
    }

    /// 为一组干系人批量创建 stakeholder_added 通知
    ///
    /// 按干系人迭代顺序逐条插入。批量为 best-effort 而非事务：
    /// 某条插入失败时整个调用以该错误返回，之前已成功的插入保留。
    pub async fn schedule_for_stakeholders(
        &self,
        workflow_id: &str,
        stakeholders: &[Stakeholder],
    ) -> Result<Vec<Notification>> {
        let mut notifications = Vec::with_capacity(stakeholders.len());

        for stakeholder in stakeholders {
            let payload = json!({
                "type": "stakeholder_added",
                "stakeholderName": stakeholder.name,
                "stakeholderRole": stakeholder.role,
                "email": stakeholder.email,
                "workflowId": workflow_id,
            });

            let notification = self
                .schedule_notification(
                    workflow_id,
                    NotificationChannel::Stakeholder,
                    payload,
                    None,
                )
                .await?;
            notifications.push(notification);
        }

        Ok(notifications)
    }
}
