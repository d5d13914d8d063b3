//! Cheer - Devin 会话应援客户端
//!
//! 入口：初始化日志、加载配置、校验 GEMINI_API_KEY、确定 WebSocket 地址，
//! 然后进入连接主循环；Ctrl-C 或收到终止哨兵时以退出码 0 结束。
//!
//! 环境变量:
//! - GEMINI_API_KEY: Gemini API Key（必填；缺失时不发起连接，退出码 1）
//! - CHEER__WS__URL 等: 覆盖 config/default.toml 的同名配置
//! - RUST_LOG: 日志级别（默认 info）

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cheer::client::{ConnectionManager, MessageDispatcher};
use cheer::config::load_config;
use cheer::history::HistoryBuffer;
use cheer::llm::{GeminiClient, GenerateClient, DEFAULT_API_URL};
use cheer::responder::{OperatorSignal, ResponseGenerator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None)?;

    // 缺失 API Key 属致命配置错误：不发起任何连接，直接退出
    let api_key = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("错误: 未设置 GEMINI_API_KEY 环境变量");
            std::process::exit(1);
        }
    };

    let url = match cfg.ws.url.clone() {
        Some(url) => url,
        None => prompt_ws_url().await?,
    };
    tracing::info!(url = %url, "连接目标");

    let api_url = cfg
        .gemini
        .api_url
        .clone()
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let client: Arc<dyn GenerateClient> = Arc::new(GeminiClient::new(api_url, api_key));

    // 操作员信号：重试用尽后由标准输入驱动（回车重试 / exit 放弃）
    let (operator_tx, operator_rx) = mpsc::unbounded_channel();
    tokio::spawn(operator_input_loop(operator_tx));

    let responder = ResponseGenerator::new(client, cfg.gemini.max_retries, operator_rx);
    let dispatcher = MessageDispatcher::new(
        HistoryBuffer::new(cfg.history.max_entries),
        responder,
        cfg.ws.termination_sentinel.clone(),
    );
    let mut manager = ConnectionManager::new(
        url,
        Duration::from_secs(cfg.ws.keepalive_secs),
        Duration::from_secs(cfg.ws.reconnect_delay_secs),
        dispatcher,
    );

    tokio::select! {
        result = manager.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("收到中断信号，退出");
            Ok(())
        }
    }
}

/// 交互式询问 WebSocket 地址（配置未提供时）
async fn prompt_ws_url() -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all("请输入 WebSocket URL: ".as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let url = line.trim().to_string();
    anyhow::ensure!(!url.is_empty(), "未输入 WebSocket URL");
    Ok(url)
}

/// 标准输入 → 操作员信号：输入 exit 放弃，其余（含空行）视为重试
async fn operator_input_loop(tx: mpsc::UnboundedSender<OperatorSignal>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let signal = if line.trim().eq_ignore_ascii_case("exit") {
            OperatorSignal::Abort
        } else {
            OperatorSignal::Retry
        };
        if tx.send(signal).is_err() {
            break;
        }
    }
}
