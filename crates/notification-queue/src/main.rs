//! 通知调度队列服务
//!
//! 加载配置并装配存储、传输与调度器，随后以固定间隔轮询队列执行批处理，
//! 直到收到 ctrl-c。轮询循环充当外部调度器的进程内替身，
//! 也可以关闭本服务改由 cron 直接触发批处理入口。

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use flowline_shared::config::AppConfig;
use flowline_shared::database::Database;
use notification_queue::dispatcher::ChannelDispatcher;
use notification_queue::processor::QueueProcessor;
use notification_queue::store::{NotificationStore, PgNotificationStore};
use notification_queue::transport::{
    EmailTransport, HttpWebhookTransport, SmtpEmailTransport, WebhookTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notification-queue")?;
    flowline_shared::observability::init(&config.observability)?;

    info!(
        environment = %config.environment,
        "Starting notification-queue..."
    );

    let db = Database::connect(&config.database).await?;
    db.health_check().await?;

    let store: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(db.pool().clone()));
    let email: Arc<dyn EmailTransport> = Arc::new(SmtpEmailTransport::new(config.smtp.clone()));
    let webhook: Arc<dyn WebhookTransport> = Arc::new(HttpWebhookTransport::new());
    let dispatcher = ChannelDispatcher::new(email, webhook, config.dashboard.clone());
    let processor = QueueProcessor::new(store, dispatcher);

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.worker.poll_interval_seconds));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match processor.process_queued().await {
                    Ok(summary) => {
                        if summary.sent + summary.failed > 0 {
                            info!(sent = summary.sent, failed = summary.failed, "批处理轮次完成");
                        }
                    }
                    // 持久层错误不终止服务，等待下一轮重新尝试读取队列
                    Err(e) => error!(error = %e, code = e.code(), "批处理轮次失败"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("收到退出信号，停止轮询");
                break;
            }
        }
    }

    db.close().await;
    Ok(())
}
