//! Notifier Port：带时间戳与角色的叙述消息，发出即忘
//!
//! BroadcastNotifier 通过 tokio broadcast 分发给所有订阅者；订阅者落后时丢弃旧消息，不产生背压。

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// 消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    Agent,
    User,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Agent => "agent",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条叙述消息（仅用于展示）
#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub timestamp: DateTime<Utc>,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role,
            content: content.into(),
        }
    }
}

/// Notifier Port：不返回结果，核心层视其为不会失败
pub trait Notifier: Send + Sync {
    fn notify(&self, role: ChatRole, content: &str);
}

/// 广播实现：每个 subscribe() 得到独立的接收端
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChatMessage>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, role: ChatRole, content: &str) {
        tracing::debug!(role = %role, "{}", content);
        // 无订阅者时 send 返回 Err，忽略即可
        let _ = self.tx.send(ChatMessage::new(role, content));
    }
}

/// 记录全部消息到内存（测试与离线回放用）
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<ChatMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// (role, content) 对，便于断言
    pub fn transcript(&self) -> Vec<(ChatRole, String)> {
        self.messages()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.messages.lock() {
            m.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, role: ChatRole, content: &str) {
        if let Ok(mut m) = self.messages.lock() {
            m.push(ChatMessage::new(role, content));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_preserves_emission_order() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.notify(ChatRole::System, "one");
        notifier.notify(ChatRole::Agent, "two");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.role, first.content.as_str()), (ChatRole::System, "one"));
        assert_eq!((second.role, second.content.as_str()), (ChatRole::Agent, "two"));
        assert!(first.timestamp <= second.timestamp);
    }

    #[test]
    fn test_broadcast_without_subscribers_does_not_panic() {
        let notifier = BroadcastNotifier::new(1);
        notifier.notify(ChatRole::System, "nobody listening");
    }

    #[test]
    fn test_recording_notifier_transcript() {
        let notifier = RecordingNotifier::new();
        notifier.notify(ChatRole::User, "hi");
        notifier.notify(ChatRole::System, "ok");
        assert_eq!(
            notifier.transcript(),
            vec![
                (ChatRole::User, "hi".to_string()),
                (ChatRole::System, "ok".to_string())
            ]
        );
        notifier.clear();
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::new(ChatRole::Agent, "x");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "agent");
    }
}
