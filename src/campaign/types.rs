//! Campaign 数据模型：Campaign / Task / Artifact 及状态
//!
//! 由 Storage Port 持久化；核心层每一步都从存储重新读取，不在步与步之间缓存。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Campaign 唯一标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub Uuid);

impl CampaignId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Task 唯一标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Campaign 状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignStatus {
    Initializing,
    Active,
    Paused,
    Completed,
    Error,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Initializing" => Some(Self::Initializing),
            "Active" => Some(Self::Active),
            "Paused" => Some(Self::Paused),
            "Completed" => Some(Self::Completed),
            "Error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Task 状态：只允许 Pending → InProgress → Done 前进
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "InProgress" => Some(Self::InProgress),
            "Done" => Some(Self::Done),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub status: CampaignStatus,
}

impl Campaign {
    /// 新建 Campaign，名称取当前 UTC 时间（Campaign-YYYYMMDDHHMM）
    pub fn new_active() -> Self {
        Self {
            id: CampaignId::new(),
            name: format!("Campaign-{}", chrono::Utc::now().format("%Y%m%d%H%M")),
            status: CampaignStatus::Active,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn pending(description: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            status: TaskStatus::Pending,
        }
    }

    /// 由用户指令生成的任务，描述原样嵌入指令
    pub fn for_instruction(text: &str) -> Self {
        Self::pending(format!("Process: {}", text))
    }
}

/// Artifact 类型标签；未知标签原样保留
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactKind {
    UserMessage,
    Research,
    Other(String),
}

impl ArtifactKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserMessage => "user_message",
            Self::Research => "research",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ArtifactKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user_message" => Self::UserMessage,
            "research" => Self::Research,
            _ => Self::Other(s),
        }
    }
}

impl From<ArtifactKind> for String {
    fn from(kind: ArtifactKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 只追加、不修改的上下文记录，作为 Oracle 的累积输入
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub key: String,
    pub content: String,
}

impl Artifact {
    pub fn user_message(text: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::UserMessage,
            key: Uuid::new_v4().to_string(),
            content: text.into(),
        }
    }

    pub fn research(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Research,
            key: url.into(),
            content: content.into(),
        }
    }
}

/// 单次 load_state 的结果；tasks / artifacts 保持存储返回的顺序
#[derive(Clone, Debug)]
pub struct CampaignState {
    pub campaign: Campaign,
    pub tasks: Vec<Task>,
    pub artifacts: Vec<Artifact>,
}

impl CampaignState {
    /// 下一个要推进的任务：已在执行中的任务优先（等待用户输入或上一步失败），否则取首个 Pending
    pub fn next_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::InProgress)
            .or_else(|| self.tasks.iter().find(|t| t.status == TaskStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(tasks: Vec<Task>) -> CampaignState {
        CampaignState {
            campaign: Campaign::new_active(),
            tasks,
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_campaign_name_format() {
        let c = Campaign::new_active();
        assert!(c.name.starts_with("Campaign-"));
        assert_eq!(c.name.len(), "Campaign-".len() + 12);
        assert_eq!(c.status, CampaignStatus::Active);
    }

    #[test]
    fn test_instruction_task_description() {
        let t = Task::for_instruction("find X");
        assert_eq!(t.description, "Process: find X");
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn test_next_task_prefers_in_progress() {
        let mut a = Task::pending("a");
        a.status = TaskStatus::Done;
        let b = Task::pending("b");
        let mut c = Task::pending("c");
        c.status = TaskStatus::InProgress;
        let state = state_with(vec![a, b, c.clone()]);
        assert_eq!(state.next_task().map(|t| t.id), Some(c.id));
    }

    #[test]
    fn test_next_task_first_pending_in_order() {
        let mut a = Task::pending("a");
        a.status = TaskStatus::Done;
        let b = Task::pending("b");
        let c = Task::pending("c");
        let state = state_with(vec![a, b.clone(), c]);
        assert_eq!(state.next_task().map(|t| t.id), Some(b.id));
    }

    #[test]
    fn test_next_task_none_when_all_done() {
        let mut a = Task::pending("a");
        a.status = TaskStatus::Done;
        assert!(state_with(vec![a]).next_task().is_none());
    }

    #[test]
    fn test_artifact_serializes_type_tag() {
        let a = Artifact::research("https://example.com/a", "BODY");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "research");
        assert_eq!(json["key"], "https://example.com/a");

        let back: Artifact =
            serde_json::from_str(r#"{"type":"summary","key":"k","content":"c"}"#).unwrap();
        assert_eq!(back.kind, ArtifactKind::Other("summary".into()));
    }

    #[test]
    fn test_status_text_roundtrip() {
        for s in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Done] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CampaignStatus::parse("Paused"), Some(CampaignStatus::Paused));
        assert_eq!(CampaignStatus::parse("paused"), None);
    }
}
