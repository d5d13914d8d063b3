//! 客户端层：连接生命周期、入站分发与出站发送
//!
//! - **connection**: 状态机与主循环（连接 / 保活 / 重连 / 关停）
//! - **dispatcher**: 入站帧分类分发（跨重连持有历史与回复生成器）
//! - **sender**: 出站帧发送（仅在 Open 状态写出）

pub mod connection;
pub mod dispatcher;
pub mod sender;

pub use connection::{ConnectionManager, ConnectionState};
pub use dispatcher::{Dispatch, MessageDispatcher};
pub use sender::{FrameSink, MemorySink, OutboundSender};
