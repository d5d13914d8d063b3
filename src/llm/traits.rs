//! 文本生成客户端抽象
//!
//! 所有后端（Gemini / Mock）实现 GenerateClient：输入完整提示词，输出生成文本。

use async_trait::async_trait;
use thiserror::Error;

/// 单次生成调用的失败原因（每种都计入一次失败尝试）
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("接口返回非成功状态: {0}")]
    Status(reqwest::StatusCode),

    #[error("响应缺少文本字段")]
    MissingText,
}

/// 文本生成客户端 trait
#[async_trait]
pub trait GenerateClient: Send + Sync {
    /// 根据提示词生成一段文本
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}
