//! 入站分发：解析、分类并驱动历史 / 回复生成 / 出站发送
//!
//! 单消费者顺序处理：一帧分发完成（含生成调用的挂起）后才处理下一帧；
//! 解析失败与不关心的帧静默丢弃。分发器跨重连存活，历史与回复生成器
//! 不随连接重建。

use crate::client::sender::{FrameSink, OutboundSender};
use crate::history::{HistoryBuffer, HistoryEntry};
use crate::protocol::{classify, InboundEvent, OutboundFrame};
use crate::responder::ResponseGenerator;

/// 单帧分发的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// 继续处理后续帧
    Continue,
    /// 收到终止哨兵，应关闭连接并结束进程
    Terminate,
}

/// 入站分发器
pub struct MessageDispatcher {
    history: HistoryBuffer,
    responder: ResponseGenerator,
    /// 终止哨兵：Devin 消息正文与其完全相等时走关停路径
    sentinel: String,
}

impl MessageDispatcher {
    pub fn new(history: HistoryBuffer, responder: ResponseGenerator, sentinel: String) -> Self {
        Self {
            history,
            responder,
            sentinel,
        }
    }

    /// 处理一帧入站文本，完成全部副作用后返回
    pub async fn dispatch<S: FrameSink>(
        &mut self,
        raw: &str,
        sender: &OutboundSender<S>,
    ) -> Dispatch {
        let Some(event) = classify(raw) else {
            // 解析失败或不关心的帧：静默丢弃
            return Dispatch::Continue;
        };
        match event {
            InboundEvent::DevinMessage {
                timestamp,
                message,
                acus_to_refund,
            } => {
                tracing::info!(%timestamp, acus_to_refund, message = %message, "收到 Devin 消息");
                self.history.append(HistoryEntry::remote(message.clone(), timestamp));

                if message == self.sentinel {
                    tracing::info!("收到会话终止消息，准备关停");
                    return Dispatch::Terminate;
                }

                // 生成的回复不在此处写入历史：历史只记录通道回显的事件，
                // 避免与回显重复
                if let Some(reply) = self.responder.generate(&self.history).await {
                    tracing::info!(reply = %reply, "自动回复生成完成");
                    sender.send(OutboundFrame::user_message(reply)).await;
                }
            }
            InboundEvent::UserMessage {
                timestamp,
                message,
                user_label,
            } => {
                tracing::info!(%timestamp, user = %user_label, "收到用户消息回显");
                self.history.append(HistoryEntry::local(message, timestamp));
            }
        }
        Dispatch::Continue
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }
}
