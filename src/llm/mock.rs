//! Mock 生成客户端（用于测试，无需 API）
//!
//! 前 fail_times 次调用返回失败，之后返回固定文本；记录累计调用次数。

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::llm::{GenerateClient, GenerateError};

/// Mock 客户端：可配置失败次数，统计调用次数
#[derive(Debug, Default)]
pub struct MockGenerateClient {
    reply: String,
    fail_times: u32,
    calls: AtomicU32,
}

impl MockGenerateClient {
    /// 总是成功并返回固定文本
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail_times: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// 前 n 次调用失败，之后成功
    pub fn failing_times(mut self, n: u32) -> Self {
        self.fail_times = n;
        self
    }

    /// 永远失败
    pub fn always_failing() -> Self {
        Self::new("").failing_times(u32::MAX)
    }

    /// 已发生的调用次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GenerateClient for MockGenerateClient {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n < self.fail_times {
            Err(GenerateError::MissingText)
        } else {
            Ok(self.reply.clone())
        }
    }
}
