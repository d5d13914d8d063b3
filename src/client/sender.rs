//! 出站发送：校验连接状态后写帧
//!
//! 连接未处于 Open 时发送静默失败（仅记日志，不向上抛错）；帧序列化为
//! 单个 JSON 对象文本后经 FrameSink 写出。发送器可克隆，分发路径与
//! 保活任务各持一份，写入端由锁串行化。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::client::ConnectionState;
use crate::protocol::OutboundFrame;

/// 帧写入端抽象（生产实现为 WebSocket sink，测试用内存收集）
#[async_trait]
pub trait FrameSink: Send {
    /// 写出一帧已序列化的文本
    async fn send_text(&mut self, text: String) -> Result<(), String>;

    /// 关闭底层通道
    async fn close(&mut self) -> Result<(), String>;
}

/// 出站发送器：持有帧写入端与连接状态的只读视图
pub struct OutboundSender<S: FrameSink> {
    sink: Arc<tokio::sync::Mutex<S>>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl<S: FrameSink> Clone for OutboundSender<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            state_rx: self.state_rx.clone(),
        }
    }
}

impl<S: FrameSink> OutboundSender<S> {
    pub fn new(sink: S, state_rx: watch::Receiver<ConnectionState>) -> Self {
        Self {
            sink: Arc::new(tokio::sync::Mutex::new(sink)),
            state_rx,
        }
    }

    /// 发送一帧；连接未 Open 时丢弃并告警
    pub async fn send(&self, frame: OutboundFrame) {
        let state = *self.state_rx.borrow();
        if state != ConnectionState::Open {
            tracing::warn!(?state, "连接未就绪，丢弃出站帧");
            return;
        }
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "出站帧序列化失败");
                return;
            }
        };
        tracing::debug!(frame = %text, "发送出站帧");
        if let Err(e) = self.sink.lock().await.send_text(text).await {
            tracing::warn!(error = %e, "出站帧写入失败");
        }
    }

    /// 关闭底层通道
    pub async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            tracing::warn!(error = %e, "关闭通道失败");
        }
    }
}

/// 内存帧写入端：收集已写出的帧（用于测试）
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写出的帧快照
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send_text(&mut self, text: String) -> Result<(), String> {
        self.frames.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), String> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_at(
        state: ConnectionState,
    ) -> (OutboundSender<MemorySink>, MemorySink, watch::Sender<ConnectionState>) {
        let (state_tx, state_rx) = watch::channel(state);
        let sink = MemorySink::new();
        (OutboundSender::new(sink.clone(), state_rx), sink, state_tx)
    }

    #[tokio::test]
    async fn test_send_while_open() {
        let (sender, sink, _state_tx) = sender_at(ConnectionState::Open);
        sender.send(OutboundFrame::Ping).await;
        assert_eq!(sink.frames(), vec![r#"{"type":"ping"}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_send_dropped_unless_open() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Closing,
        ] {
            let (sender, sink, _state_tx) = sender_at(state);
            sender.send(OutboundFrame::Ping).await;
            assert!(sink.frames().is_empty());
        }
    }

    #[tokio::test]
    async fn test_send_observes_state_change() {
        let (sender, sink, state_tx) = sender_at(ConnectionState::Open);
        sender.send(OutboundFrame::Ping).await;
        state_tx.send_replace(ConnectionState::Disconnected);
        sender.send(OutboundFrame::Ping).await;
        assert_eq!(sink.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_cloned_sender_shares_sink() {
        let (sender, sink, _state_tx) = sender_at(ConnectionState::Open);
        let other = sender.clone();
        sender.send(OutboundFrame::Ping).await;
        other.send(OutboundFrame::SubscribeDevin).await;
        assert_eq!(sink.frames().len(), 2);
    }

    #[tokio::test]
    async fn test_close_marks_sink_closed() {
        let (sender, sink, _state_tx) = sender_at(ConnectionState::Open);
        sender.close().await;
        assert!(sink.is_closed());
    }
}
