//! Cheer - Devin 会话应援客户端
//!
//! 维护到 Devin 会话事件流的 WebSocket 长连接，镜像有限长度的对话历史，
//! 通过 Gemini 自动生成鼓励式回复（有限重试 + 人工兜底）。
//!
//! 模块划分：
//! - **client**: 连接生命周期状态机、入站事件分发、出站帧发送
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **history**: 有限长度对话历史（FIFO 淘汰）
//! - **llm**: 文本生成客户端抽象与实现（Gemini / Mock）
//! - **protocol**: 线上帧定义与入站事件分类
//! - **responder**: 自动回复流水线（提示词构建、重试与人工升级）

pub mod client;
pub mod config;
pub mod history;
pub mod llm;
pub mod protocol;
pub mod responder;
