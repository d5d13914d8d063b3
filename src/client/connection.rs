//! 连接生命周期：连接、保活、断线重连与终止
//!
//! 状态机 {Disconnected, Connecting, Open, Closing}，状态只由本模块推进，
//! 其他组件通过 watch 只读观察。保活由独立任务驱动，不受分发挂起影响；
//! 分发挂起期间入站帧继续读入并缓存，仍按到达顺序逐帧处理。断开后固定
//! 延迟无限重连（不设上限、不退避）；收到终止哨兵时优雅关闭通道并结束
//! 主循环，这是中断信号之外唯一的退出路径。

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::client::dispatcher::{Dispatch, MessageDispatcher};
use crate::client::sender::{FrameSink, OutboundSender};
use crate::protocol::OutboundFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 连接状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// 单次会话的结束方式
enum SessionEnd {
    /// 通道关闭（任何原因），走重连
    Closed,
    /// 收到终止哨兵，整体关停
    Terminated,
}

/// WebSocket 帧写入端
struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait::async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), String> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| e.to_string())
    }

    async fn close(&mut self) -> Result<(), String> {
        self.inner.close().await.map_err(|e| e.to_string())
    }
}

/// 连接管理器：唯一持有活动通道，驱动状态机与分发器
pub struct ConnectionManager {
    url: String,
    keepalive: Duration,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    dispatcher: MessageDispatcher,
}

impl ConnectionManager {
    pub fn new(
        url: String,
        keepalive: Duration,
        reconnect_delay: Duration,
        dispatcher: MessageDispatcher,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url,
            keepalive,
            reconnect_delay,
            state_tx,
            dispatcher,
        }
    }

    /// 当前连接状态的只读视图
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// 主循环：连接 → 会话 → 断开后固定延迟重连，直到收到终止哨兵
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.set_state(ConnectionState::Connecting);
            tracing::info!(url = %self.url, "开始 WebSocket 连接");
            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    if let SessionEnd::Terminated = self.run_session(stream).await {
                        self.set_state(ConnectionState::Disconnected);
                        tracing::info!("连接已关闭，进程退出");
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "连接失败");
                }
            }
            self.set_state(ConnectionState::Disconnected);
            tracing::info!(
                delay_secs = self.reconnect_delay.as_secs(),
                "连接断开，稍后重连"
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// 单次会话：订阅、启动保活任务、逐帧分发，直到通道关闭或收到终止哨兵
    async fn run_session(&mut self, stream: WsStream) -> SessionEnd {
        tracing::info!("WebSocket 已连接");
        let (sink, mut source) = stream.split();
        let sender = OutboundSender::new(WsSink { inner: sink }, self.state_tx.subscribe());

        self.set_state(ConnectionState::Open);
        sender.send(OutboundFrame::SubscribeDevin).await;

        // 保活独立于分发：生成调用或人工升级挂起期间 Ping 照常发出；
        // 发送器内部校验状态，Open 之外的 tick 静默丢弃
        let keepalive = self.keepalive;
        let ping_sender = sender.clone();
        let ping_task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(keepalive);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval 的首个 tick 立即完成，先消费掉，让首个 Ping 在一个完整周期后发出
            timer.tick().await;
            loop {
                timer.tick().await;
                ping_sender.send(OutboundFrame::Ping).await;
            }
        });

        let end = self.drain_frames(&mut source, &sender).await;
        ping_task.abort();
        if let SessionEnd::Terminated = end {
            self.set_state(ConnectionState::Closing);
            sender.close().await;
        }
        end
    }

    /// 逐帧顺序分发；分发挂起期间继续读入并缓存后续帧与关闭事件
    async fn drain_frames(
        &mut self,
        source: &mut SplitStream<WsStream>,
        sender: &OutboundSender<WsSink>,
    ) -> SessionEnd {
        let mut pending: VecDeque<String> = VecDeque::new();
        let mut closed = false;
        loop {
            let text = match pending.pop_front() {
                Some(text) => text,
                None if closed => return SessionEnd::Closed,
                None => match source.next().await {
                    None => return SessionEnd::Closed,
                    Some(Err(e)) => {
                        // 错误仅记录，不改状态，等待随后的关闭
                        tracing::warn!(error = %e, "通道错误");
                        continue;
                    }
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "收到关闭帧");
                        return SessionEnd::Closed;
                    }
                    // 其余控制帧（Ping/Pong/Binary）忽略
                    Some(Ok(_)) => continue,
                },
            };

            let dispatch = self.dispatcher.dispatch(&text, sender);
            tokio::pin!(dispatch);
            let outcome = loop {
                tokio::select! {
                    outcome = &mut dispatch => break outcome,
                    maybe = source.next(), if !closed => match maybe {
                        None => closed = true,
                        Some(Err(e)) => tracing::warn!(error = %e, "通道错误"),
                        Some(Ok(Message::Text(text))) => pending.push_back(text),
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "收到关闭帧");
                            closed = true;
                        }
                        Some(Ok(_)) => {}
                    },
                }
            };
            if let Dispatch::Terminate = outcome {
                return SessionEnd::Terminated;
            }
        }
    }
}
