//! 队列批处理器
//!
//! 每轮批处理对当前 queued 快照逐条投递并落账：成功记 sent + sent_at，
//! 失败记 failed + error。单条投递失败被就地转化为状态更新，绝不中断
//! 整轮处理——这是队列处理器与朴素循环的核心区别。持久层错误例外：
//! 存储不可用时中止本轮并向上传播。

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use flowline_shared::error::Result;

use crate::dispatcher::ChannelDispatcher;
use crate::model::{DeliveryOutcome, NotificationStatus};
use crate::store::{NotificationFilter, NotificationStore};

/// 单轮批处理的聚合结果
///
/// 调用方只看到计数；单条失败的详细原因落在记录的 error 字段，
/// 通过存储或统计查询检视。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
}

/// 队列批处理器
///
/// 由外部调度器（cron 或服务内置的轮询循环）触发，无参数调用。
pub struct QueueProcessor {
    store: Arc<dyn NotificationStore>,
    dispatcher: ChannelDispatcher,
}

impl QueueProcessor {
    pub fn new(store: Arc<dyn NotificationStore>, dispatcher: ChannelDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// 处理当前全部 queued 通知
    ///
    /// 快照语义：处理期间新入队的记录留到下一轮。已处理记录因状态
    /// 变更自动退出后续轮次，重复调用是安全的。
    pub async fn process_queued(&self) -> Result<DispatchSummary> {
        let queued = self
            .store
            .select(&NotificationFilter::by_status(NotificationStatus::Queued))
            .await?;

        info!(count = queued.len(), "开始处理队列中的通知");

        let mut sent = 0;
        let mut failed = 0;

        for notification in &queued {
            match self.dispatcher.dispatch(notification).await {
                Ok(()) => {
                    self.store
                        .mark_outcome(
                            &notification.id,
                            DeliveryOutcome::Sent { sent_at: Utc::now() },
                        )
                        .await?;
                    sent += 1;

                    info!(
                        notification_id = %notification.id,
                        workflow_id = %notification.workflow_id,
                        channel = %notification.channel,
                        "通知投递成功"
                    );
                }
                Err(e) => {
                    // 投递失败转化为单条落账，批处理继续
                    self.store
                        .mark_outcome(
                            &notification.id,
                            DeliveryOutcome::Failed {
                                error: e.to_string(),
                            },
                        )
                        .await?;
                    failed += 1;

                    warn!(
                        notification_id = %notification.id,
                        workflow_id = %notification.workflow_id,
                        channel = %notification.channel,
                        error = %e,
                        "通知投递失败"
                    );
                }
            }
        }

        let summary = DispatchSummary { sent, failed };
        info!(sent = summary.sent, failed = summary.failed, "本轮批处理完成");
        Ok(summary)
    }
}
