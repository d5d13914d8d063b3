//! 连接层端到端测试：用本机 WebSocket 服务端验证订阅、保活、重连与关停
//!
//! 服务端用 tokio-tungstenite 的 accept_async 搭建，生成客户端用
//! MockGenerateClient 代替，整个 ConnectionManager 跑真实的连接循环。

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use cheer::client::{ConnectionManager, MessageDispatcher};
use cheer::history::HistoryBuffer;
use cheer::llm::MockGenerateClient;
use cheer::responder::{OperatorSignal, ResponseGenerator};

fn make_manager(
    url: String,
    keepalive: Duration,
    reconnect_delay: Duration,
    client: Arc<MockGenerateClient>,
) -> (ConnectionManager, mpsc::UnboundedSender<OperatorSignal>) {
    let (op_tx, op_rx) = mpsc::unbounded_channel();
    let responder = ResponseGenerator::new(client, 10, op_rx);
    let dispatcher = MessageDispatcher::new(
        HistoryBuffer::new(20),
        responder,
        "Session terminated".to_string(),
    );
    (
        ConnectionManager::new(url, keepalive, reconnect_delay, dispatcher),
        op_tx,
    )
}

async fn bind_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

fn frame_type(text: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(text).unwrap();
    value["type"].as_str().unwrap_or_default().to_string()
}

fn devin_frame(message: &str) -> Message {
    Message::Text(format!(
        r#"{{"type":"devin_event","event":{{"type":"devin_message","timestamp":"T1","message":"{}","acus_to_refund":0}}}}"#,
        message
    ))
}

#[tokio::test]
async fn test_subscribe_sent_on_open() {
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::new("好"));
    let (mut manager, _op_tx) =
        make_manager(url, Duration::from_secs(10), Duration::from_secs(5), client);
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    let first = timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first.into_text().unwrap(), r#"{"type":"subscribe_devin"}"#);
    run.abort();
}

#[tokio::test]
async fn test_first_ping_after_full_interval() {
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::new("好"));
    let (mut manager, _op_tx) = make_manager(
        url,
        Duration::from_millis(300),
        Duration::from_secs(5),
        client,
    );
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    let first = timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(first.to_text().unwrap()), "subscribe_devin");
    let opened = Instant::now();

    // 订阅之后半个周期内不应有任何帧，首个 Ping 在一个完整周期后到来
    assert!(timeout(Duration::from_millis(150), ws.next()).await.is_err());
    let next = timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(next.to_text().unwrap()), "ping");
    assert!(opened.elapsed() >= Duration::from_millis(250));
    run.abort();
}

#[tokio::test]
async fn test_single_reconnect_after_close() {
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::new("好"));
    let (mut manager, _op_tx) = make_manager(
        url,
        Duration::from_secs(10),
        Duration::from_millis(200),
        client,
    );
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    ws.close(None).await.unwrap();
    let closed_at = Instant::now();

    // 断开后恰好一次重连：固定延迟之后到来，新会话重新订阅
    let mut ws2 = timeout(Duration::from_secs(2), accept_ws(&listener))
        .await
        .expect("关闭后应发起重连");
    assert!(closed_at.elapsed() >= Duration::from_millis(150));
    let first = timeout(Duration::from_secs(2), ws2.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(first.to_text().unwrap()), "subscribe_devin");

    // 第二条连接存续期间不应出现第三条
    assert!(timeout(Duration::from_millis(400), listener.accept())
        .await
        .is_err());
    run.abort();
}

#[tokio::test]
async fn test_sentinel_closes_channel_and_exits() {
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::new("不应被调用"));
    let (mut manager, _op_tx) = make_manager(
        url,
        Duration::from_secs(10),
        Duration::from_millis(100),
        Arc::clone(&client),
    );
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    let first = timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(first.to_text().unwrap()), "subscribe_devin");
    ws.send(devin_frame("Session terminated")).await.unwrap();

    // 哨兵之后只应收到关闭，不应再有任何出站帧
    loop {
        match timeout(Duration::from_secs(2), ws.next()).await.unwrap() {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(Message::Text(text))) => panic!("关停路径不应再发帧：{}", text),
            Some(Ok(_)) => {}
            Some(Err(_)) => break,
        }
    }
    assert_eq!(client.calls(), 0);

    // 主循环随之正常退出，而不是重连
    let result = timeout(Duration::from_secs(2), run).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(timeout(Duration::from_millis(300), listener.accept())
        .await
        .is_err());
}

#[tokio::test]
async fn test_keepalive_continues_while_reply_generation_waits() {
    // 生成一直失败且操作员迟迟不给信号：分发挂起等待期间保活不得停摆
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::always_failing());
    let (mut manager, op_tx) = make_manager(
        url,
        Duration::from_millis(100),
        Duration::from_secs(5),
        Arc::clone(&client),
    );
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    let first = timeout(Duration::from_secs(2), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(first.to_text().unwrap()), "subscribe_devin");
    ws.send(devin_frame("写完了")).await.unwrap();

    let mut pings = 0;
    let deadline = Instant::now() + Duration::from_millis(650);
    while Instant::now() < deadline {
        match timeout(deadline - Instant::now(), ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) if frame_type(&text) == "ping" => pings += 1,
            Ok(Some(Ok(_))) => {}
            _ => break,
        }
    }
    assert!(client.calls() >= 11, "重试应已用尽进入等待");
    assert!(pings >= 3, "挂起等待期间保活应继续，只收到 {} 个 ping", pings);
    drop(op_tx);
    run.abort();
}

#[tokio::test]
async fn test_close_read_during_suspended_dispatch() {
    // 分发挂起等待操作员期间收到关闭帧：放弃后本次会话立即结束并重连
    let (listener, url) = bind_server().await;
    let client = Arc::new(MockGenerateClient::always_failing());
    let (mut manager, op_tx) = make_manager(
        url,
        Duration::from_secs(10),
        Duration::from_millis(100),
        Arc::clone(&client),
    );
    let run = tokio::spawn(async move { manager.run().await });

    let mut ws = accept_ws(&listener).await;
    timeout(Duration::from_secs(2), ws.next()).await.unwrap();
    ws.send(devin_frame("你好")).await.unwrap();

    // 等重试用尽进入挂起
    while client.calls() < 11 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ws.close(None).await.unwrap();
    op_tx.send(OperatorSignal::Abort).unwrap();

    let mut ws2 = timeout(Duration::from_secs(2), accept_ws(&listener))
        .await
        .expect("放弃后应发起重连");
    let first = timeout(Duration::from_secs(2), ws2.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame_type(first.to_text().unwrap()), "subscribe_devin");
    run.abort();
}
