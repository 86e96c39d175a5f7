//! 通知存储层
//!
//! 通过 `NotificationStore` trait 抽象持久化行为：生产环境使用 PostgreSQL
//! 实现，测试与本地运行使用内存实现。状态的 exactly-once 转换约束在
//! 存储层强制（只允许从 queued 变更），而不是依赖调用方自觉。

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use flowline_shared::error::{FlowlineError, Result};

use crate::model::{
    DeliveryOutcome, NewNotification, Notification, NotificationChannel, NotificationStatus,
};

// ---------------------------------------------------------------------------
// NotificationStore — 存储抽象
// ---------------------------------------------------------------------------

/// 通知记录查询条件
///
/// 两个条件都可选，同时给出时取交集。
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub workflow_id: Option<String>,
    pub status: Option<NotificationStatus>,
}

impl NotificationFilter {
    /// 查询指定状态的全部记录
    pub fn by_status(status: NotificationStatus) -> Self {
        Self {
            workflow_id: None,
            status: Some(status),
        }
    }

    /// 查询指定工作流的全部记录
    pub fn by_workflow(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: Some(workflow_id.into()),
            status: None,
        }
    }
}

/// 通知存储 trait
///
/// 返回的记录顺序即插入顺序，批处理按此顺序逐条投递。
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// 插入一条通知，由存储层分配 id 并补齐 status/created_at
    async fn insert(&self, new: NewNotification) -> Result<Notification>;

    /// 按条件查询通知，按创建顺序返回
    async fn select(&self, filter: &NotificationFilter) -> Result<Vec<Notification>>;

    /// 记录投递结果，仅允许作用于 queued 状态的记录
    ///
    /// 目标记录不存在或已处于终态时返回错误，保证 sent_at / error
    /// 各自只被设置一次。
    async fn mark_outcome(&self, id: &str, outcome: DeliveryOutcome) -> Result<()>;
}

// ---------------------------------------------------------------------------
// PgNotificationStore — PostgreSQL 实现
// ---------------------------------------------------------------------------

/// PostgreSQL 通知存储
///
/// 对应 migrations/0001_create_notifications.sql 中的 notifications 表。
/// id 使用 UUID v7：时间有序，按主键排序即可得到插入顺序。
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 将数据库行映射为通知记录
    fn map_row(row: &PgRow) -> std::result::Result<Notification, sqlx::Error> {
        let channel: String = row.try_get("channel")?;
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<NotificationStatus>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Notification {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            channel: NotificationChannel::from(channel),
            payload: row.try_get("payload")?,
            status,
            scheduled_for: row.try_get("scheduled_for")?,
            sent_at: row.try_get("sent_at")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let scheduled_for = new.scheduled_for.unwrap_or(now);

        let row = sqlx::query(
            r#"INSERT INTO notifications
               (id, workflow_id, channel, payload, status, scheduled_for, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, workflow_id, channel, payload, status,
                         scheduled_for, sent_at, error, created_at"#,
        )
        .bind(&id)
        .bind(&new.workflow_id)
        .bind(new.channel.as_str())
        .bind(&new.payload)
        .bind(NotificationStatus::Queued.as_str())
        .bind(scheduled_for)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::map_row(&row)?)
    }

    async fn select(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        // 动态构建 SQL 查询
        // 条件组合有限，使用字符串拼接 + 顺序绑定即可保持类型安全
        let mut sql = String::from(
            r#"SELECT id, workflow_id, channel, payload, status,
                      scheduled_for, sent_at, error, created_at
               FROM notifications
               WHERE 1=1"#,
        );

        if filter.workflow_id.is_some() {
            sql.push_str(" AND workflow_id = $1");
        }
        if filter.status.is_some() {
            let position = if filter.workflow_id.is_some() { 2 } else { 1 };
            sql.push_str(&format!(" AND status = ${position}"));
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(workflow_id) = &filter.workflow_id {
            query = query.bind(workflow_id);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;

        let notifications = rows
            .iter()
            .map(Self::map_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(notifications)
    }

    async fn mark_outcome(&self, id: &str, outcome: DeliveryOutcome) -> Result<()> {
        // WHERE status = 'queued' 保证终态记录不会被二次变更
        let result = match outcome {
            DeliveryOutcome::Sent { sent_at } => {
                sqlx::query(
                    r#"UPDATE notifications
                       SET status = 'sent', sent_at = $2
                       WHERE id = $1 AND status = 'queued'"#,
                )
                .bind(id)
                .bind(sent_at)
                .execute(&self.pool)
                .await?
            }
            DeliveryOutcome::Failed { error } => {
                sqlx::query(
                    r#"UPDATE notifications
                       SET status = 'failed', error = $2
                       WHERE id = $1 AND status = 'queued'"#,
                )
                .bind(id)
                .bind(&error)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(FlowlineError::InvalidTransition {
                entity: "notification".to_string(),
                id: id.to_string(),
                reason: "record missing or already in terminal state".to_string(),
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryNotificationStore — 内存实现
// ---------------------------------------------------------------------------

/// 内存通知存储
///
/// Vec 保持插入顺序，与 PostgreSQL 实现按 UUID v7 主键排序的语义一致。
/// 用于测试和无数据库的本地运行，状态转换约束与生产实现相同。
#[derive(Default)]
pub struct MemoryNotificationStore {
    records: RwLock<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, new: NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::now_v7().to_string(),
            workflow_id: new.workflow_id,
            channel: new.channel,
            payload: new.payload,
            status: NotificationStatus::Queued,
            scheduled_for: new.scheduled_for.unwrap_or(now),
            sent_at: None,
            error: None,
            created_at: now,
        };

        self.records.write().push(notification.clone());
        Ok(notification)
    }

    async fn select(&self, filter: &NotificationFilter) -> Result<Vec<Notification>> {
        let records = self.records.read();
        let matched = records
            .iter()
            .filter(|n| {
                filter
                    .workflow_id
                    .as_ref()
                    .is_none_or(|w| &n.workflow_id == w)
                    && filter.status.is_none_or(|s| n.status == s)
            })
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn mark_outcome(&self, id: &str, outcome: DeliveryOutcome) -> Result<()> {
        let mut records = self.records.write();
        let Some(record) = records
            .iter_mut()
            .find(|n| n.id == id && n.status == NotificationStatus::Queued)
        else {
            return Err(FlowlineError::InvalidTransition {
                entity: "notification".to_string(),
                id: id.to_string(),
                reason: "record missing or already in terminal state".to_string(),
            });
        };

        match outcome {
            DeliveryOutcome::Sent { sent_at } => {
                record.status = NotificationStatus::Sent;
                record.sent_at = Some(sent_at);
            }
            DeliveryOutcome::Failed { error } => {
                record.status = NotificationStatus::Failed;
                record.error = Some(error);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_new(workflow_id: &str, channel: &str) -> NewNotification {
        NewNotification {
            workflow_id: workflow_id.to_string(),
            channel: NotificationChannel::from(channel),
            payload: json!({ "type": "workflow_initiated" }),
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn test_insert_defaults() {
        let store = MemoryNotificationStore::new();
        let notification = store.insert(make_new("w-1", "email")).await.unwrap();

        assert!(!notification.id.is_empty());
        assert_eq!(notification.status, NotificationStatus::Queued);
        assert!(notification.sent_at.is_none());
        assert!(notification.error.is_none());
        // scheduled_for 缺省为创建时间
        assert_eq!(notification.scheduled_for, notification.created_at);
    }

    #[tokio::test]
    async fn test_select_preserves_insertion_order() {
        let store = MemoryNotificationStore::new();
        let first = store.insert(make_new("w-1", "email")).await.unwrap();
        let second = store.insert(make_new("w-1", "milestone")).await.unwrap();

        let all = store.select(&NotificationFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);
    }

    #[tokio::test]
    async fn test_select_filters_by_workflow_and_status() {
        let store = MemoryNotificationStore::new();
        let target = store.insert(make_new("w-1", "email")).await.unwrap();
        store.insert(make_new("w-2", "email")).await.unwrap();

        store
            .mark_outcome(&target.id, DeliveryOutcome::Sent { sent_at: Utc::now() })
            .await
            .unwrap();

        let filter = NotificationFilter {
            workflow_id: Some("w-1".to_string()),
            status: Some(NotificationStatus::Sent),
        };
        let matched = store.select(&filter).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, target.id);

        let queued = store
            .select(&NotificationFilter::by_status(NotificationStatus::Queued))
            .await
            .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].workflow_id, "w-2");
    }

    #[tokio::test]
    async fn test_mark_outcome_sets_fields_exactly_once() {
        let store = MemoryNotificationStore::new();
        let notification = store.insert(make_new("w-1", "email")).await.unwrap();

        store
            .mark_outcome(
                &notification.id,
                DeliveryOutcome::Failed {
                    error: "boom".to_string(),
                },
            )
            .await
            .unwrap();

        let all = store.select(&NotificationFilter::default()).await.unwrap();
        assert_eq!(all[0].status, NotificationStatus::Failed);
        assert_eq!(all[0].error.as_deref(), Some("boom"));
        assert!(all[0].sent_at.is_none());

        // 终态记录拒绝二次变更
        let again = store
            .mark_outcome(&notification.id, DeliveryOutcome::Sent { sent_at: Utc::now() })
            .await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_mark_outcome_unknown_id() {
        let store = MemoryNotificationStore::new();
        let result = store
            .mark_outcome("missing", DeliveryOutcome::Sent { sent_at: Utc::now() })
            .await;
        assert!(matches!(
            result,
            Err(FlowlineError::InvalidTransition { .. })
        ));
    }
}
