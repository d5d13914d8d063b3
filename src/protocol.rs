//! 线上协议：出站帧定义与入站事件分类
//!
//! 出站每帧一个 JSON 对象。入站只关心 devin_event 下的 devin_message /
//! user_message 两种事件，其余类型与无法解析的帧一律静默丢弃。

use serde::{Deserialize, Serialize};

/// 出站帧
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// 订阅 Devin 事件流（连接建立后发送一次）
    SubscribeDevin,
    /// 心跳
    Ping,
    /// 用户消息（自动回复走此帧）
    UserMessage {
        message: String,
        origin: String,
        ensure_awake: bool,
        event_id: String,
    },
}

impl OutboundFrame {
    /// 构造用户消息帧；event_id 每次新生成，重发相同文本也视为新事件
    pub fn user_message(message: impl Into<String>) -> Self {
        OutboundFrame::UserMessage {
            message: message.into(),
            origin: "web".to_string(),
            ensure_awake: true,
            event_id: format!("event-{}", uuid::Uuid::new_v4()),
        }
    }
}

/// 入站帧顶层（只认 devin_event）
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawFrame {
    #[serde(rename = "devin_event")]
    DevinEvent { event: RawEvent },
    #[serde(other)]
    Other,
}

/// devin_event 内层事件
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawEvent {
    #[serde(rename = "devin_message")]
    DevinMessage {
        #[serde(default)]
        timestamp: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        acus_to_refund: f64,
    },
    #[serde(rename = "user_message")]
    UserMessage {
        #[serde(default)]
        timestamp: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// 分类后的入站事件
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// Devin 发来的消息
    DevinMessage {
        timestamp: String,
        message: String,
        acus_to_refund: f64,
    },
    /// 通道回显的用户消息
    UserMessage {
        timestamp: String,
        message: String,
        /// username，缺失时退回 user_id
        user_label: String,
    },
}

/// 解析并分类一帧入站文本
///
/// 解析失败或不关心的类型返回 None（静默丢弃，不是可上报的错误）。
pub fn classify(raw: &str) -> Option<InboundEvent> {
    let frame: RawFrame = serde_json::from_str(raw).ok()?;
    let RawFrame::DevinEvent { event } = frame else {
        return None;
    };
    match event {
        RawEvent::DevinMessage {
            timestamp,
            message,
            acus_to_refund,
        } => Some(InboundEvent::DevinMessage {
            timestamp,
            message,
            acus_to_refund,
        }),
        RawEvent::UserMessage {
            timestamp,
            message,
            username,
            user_id,
        } => Some(InboundEvent::UserMessage {
            timestamp,
            message,
            user_label: username.or(user_id).unwrap_or_default(),
        }),
        RawEvent::Other => None,
    }
}
