//! 对话历史：有限长度的消息记录
//!
//! 保留最近 N 条消息（默认 20），超出时从头部淘汰（FIFO），供提示词拼接使用。

use std::collections::VecDeque;

/// 消息发送方
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    /// 本端（通道回显的 user_message）
    Local,
    /// 对端（Devin）
    Remote,
}

/// 单条历史记录，创建后不再修改
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub message: String,
    /// ISO-8601 时间戳，来自事件原文，原样保留
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn local(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            sender: Sender::Local,
            message: message.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn remote(message: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            sender: Sender::Remote,
            message: message.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// 有限长度历史缓冲：尾部追加，超容量时淘汰最旧记录
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 追加一条记录；长度超过容量时从头部淘汰到恰好等于容量
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// 按提示词格式逐行渲染：对端记为「对方」，本端记为「自己」，最旧在前
    pub fn render_for_prompt(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(|entry| {
            let label = match entry.sender {
                Sender::Remote => "对方",
                Sender::Local => "自己",
            };
            format!("{}「{}」", label, entry.message)
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
