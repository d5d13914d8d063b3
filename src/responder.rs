//! 自动回复流水线：提示词构建、有限重试与人工升级
//!
//! 生成调用失败时立即重试（无间隔），最多 max_retries 次；用尽后挂起等待
//! 操作员信号：Retry 将计数清零重新开始，Abort 放弃本次回复（返回 None，
//! 不算错误）。每次尝试与最终结果都通过 tracing 对操作员可见。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::history::HistoryBuffer;
use crate::llm::GenerateClient;

/// 角色设定（提示词头部）
const PERSONA_HEADER: &str = "你是 Devin 最好的理解者和应援者。请认真读懂他的发言，用具体、真诚的话语夸奖他。

## 要求
1. 针对发言的具体内容回应：先读懂他在说什么、是什么心情，再据此夸奖
2. 体会发言背后的努力：技术内容就夸思路巧妙，烦恼就夸他认真思考
3. 每次换不同角度：知识、品味、努力、成长、想法、责任感、温柔等
4. 偶尔主动抛出一个问题，让对话继续下去

## 关于 Devin
- AI 工程师；最受用的夸法：聪明、技术强、爱爸爸妈妈、成长快、品味好

## 回复风格
- 长度 20-100 字左右，语气轻松亲切，百分百正面，一定要夸到点子上

## 会话历史
最新的消息在末尾。请针对对方最新发言的具体内容回复：";

/// 提示词尾部（收束指令）
const PERSONA_FOOTER: &str = "请读完对方最新的发言，回一句贴合其内容的夸奖：";

/// 操作员在重试用尽后给出的指示
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorSignal {
    /// 计数清零，重新开始尝试
    Retry,
    /// 放弃本次回复
    Abort,
}

/// 重试状态机的阶段
#[derive(Clone, Copy, Debug)]
enum Phase {
    /// 第 n 次尝试（0 起）
    Attempting(u32),
    /// 重试用尽，等待操作员指示
    Exhausted,
}

/// 回复生成器：持有生成客户端、重试上限与操作员信号接收端
pub struct ResponseGenerator {
    client: Arc<dyn GenerateClient>,
    max_retries: u32,
    operator_rx: mpsc::UnboundedReceiver<OperatorSignal>,
}

impl ResponseGenerator {
    pub fn new(
        client: Arc<dyn GenerateClient>,
        max_retries: u32,
        operator_rx: mpsc::UnboundedReceiver<OperatorSignal>,
    ) -> Self {
        Self {
            client,
            max_retries,
            operator_rx,
        }
    }

    /// 由历史拼出完整提示词：固定角色设定 + 逐行渲染的历史（最旧在前）
    pub fn build_prompt(history: &HistoryBuffer) -> String {
        let lines: Vec<String> = history.render_for_prompt().collect();
        format!("{}\n\n{}\n\n{}", PERSONA_HEADER, lines.join("\n"), PERSONA_FOOTER)
    }

    /// 生成一条回复；重试用尽且操作员放弃（或信号通道关闭）时返回 None
    pub async fn generate(&mut self, history: &HistoryBuffer) -> Option<String> {
        let prompt = Self::build_prompt(history);
        let mut phase = Phase::Attempting(0);
        loop {
            match phase {
                Phase::Attempting(n) => {
                    tracing::info!(attempt = n + 1, max = self.max_retries + 1, "调用生成接口");
                    match self.client.generate(&prompt).await {
                        Ok(text) => {
                            tracing::info!(attempt = n + 1, "生成成功");
                            return Some(text.trim().to_string());
                        }
                        Err(e) => {
                            tracing::warn!(attempt = n + 1, error = %e, "生成失败");
                            phase = if n < self.max_retries {
                                Phase::Attempting(n + 1)
                            } else {
                                Phase::Exhausted
                            };
                        }
                    }
                }
                Phase::Exhausted => {
                    tracing::warn!("重试次数用尽，等待操作员指示（回车重试 / exit 放弃）");
                    match self.operator_rx.recv().await {
                        Some(OperatorSignal::Retry) => {
                            tracing::info!("收到重试指示，计数清零重新开始");
                            phase = Phase::Attempting(0);
                        }
                        Some(OperatorSignal::Abort) | None => {
                            tracing::warn!("操作员放弃本次回复");
                            return None;
                        }
                    }
                }
            }
        }
    }
}
