//! 通知统计
//!
//! 对存储中的记录按状态分组计数的只读查询，一致性以读取快照为准。

use std::sync::Arc;

use serde::Serialize;

use flowline_shared::error::Result;

use crate::model::NotificationStatus;
use crate::store::{NotificationFilter, NotificationStore};

/// 按状态分组的通知计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub total: usize,
    pub sent: usize,
    pub queued: usize,
    pub failed: usize,
}

/// 统计聚合器
pub struct StatsAggregator {
    store: Arc<dyn NotificationStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// 统计通知数量，可选按工作流过滤
    pub async fn stats(&self, workflow_id: Option<&str>) -> Result<NotificationStats> {
        let filter = NotificationFilter {
            workflow_id: workflow_id.map(str::to_string),
            status: None,
        };
        let records = self.store.select(&filter).await?;

        let mut stats = NotificationStats {
            total: records.len(),
            sent: 0,
            queued: 0,
            failed: 0,
        };

        for record in &records {
            match record.status {
                NotificationStatus::Sent => stats.sent += 1,
                NotificationStatus::Queued => stats.queued += 1,
                NotificationStatus::Failed => stats.failed += 1,
            }
        }

        Ok(stats)
    }
}
