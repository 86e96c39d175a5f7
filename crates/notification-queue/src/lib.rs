//! 通知调度队列服务
//!
//! 接收工作流相关的通知意图并以 queued 状态持久化，
//! 支持无副作用的预览渲染；批处理时按渠道路由到对应的传输通道投递，
//! 单条通知的投递失败不影响同批其他通知，结果以 sent / failed 落账。

pub mod dispatcher;
pub mod enqueue;
pub mod error;
pub mod model;
pub mod preview;
pub mod processor;
pub mod stats;
pub mod store;
pub mod transport;
