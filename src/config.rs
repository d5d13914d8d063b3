//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CHEER__*` 覆盖（双下划线表示嵌套，如 `CHEER__WS__URL=wss://...`）。
//! Gemini API Key 不进配置文件，启动时直接读环境变量 GEMINI_API_KEY。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub ws: WsSection,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub history: HistorySection,
}

/// [ws] 段：连接地址、保活与重连
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsSection {
    /// 连接地址；未配置时启动后交互式输入
    pub url: Option<String>,
    /// 保活 Ping 间隔（秒），仅在连接 Open 时发送
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// 断开后的重连延迟（秒），固定间隔、不设上限
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// 终止哨兵：Devin 消息正文与其完全相等时优雅关停
    #[serde(default = "default_termination_sentinel")]
    pub termination_sentinel: String,
}

fn default_keepalive_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_termination_sentinel() -> String {
    "Session terminated".to_string()
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            url: None,
            keepalive_secs: default_keepalive_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            termination_sentinel: default_termination_sentinel(),
        }
    }
}

/// [gemini] 段：接口地址与重试上限
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiSection {
    /// generateContent 接口地址，未配置时用内置默认（gemini-2.5-flash）
    pub api_url: Option<String>,
    /// 失败后的最大重试次数（不含首次调用）
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    10
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            api_url: None,
            max_retries: default_max_retries(),
        }
    }
}

/// [history] 段：对话历史容量
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    /// 保留的最近消息条数，超出时从头部淘汰
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    20
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws: WsSection::default(),
            gemini: GeminiSection::default(),
            history: HistorySection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 CHEER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CHEER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CHEER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
