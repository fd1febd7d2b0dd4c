//! Runtime Loop 状态机：NoCampaign / Running / Paused
//!
//! 状态是循环内部显式传递的值，不是全局可变状态；同一进程可以并存多个独立的 runtime。

use serde::Serialize;

use crate::campaign::CampaignId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "campaign_id", rename_all = "snake_case")]
pub enum RuntimeState {
    NoCampaign,
    Running(CampaignId),
    Paused(CampaignId),
}

impl RuntimeState {
    pub fn campaign_id(&self) -> Option<CampaignId> {
        match self {
            Self::NoCampaign => None,
            Self::Running(id) | Self::Paused(id) => Some(*id),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running(_))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused(_))
    }

    /// Stop：有 Campaign 时进入 Paused，否则不变
    pub fn on_stop(self) -> Self {
        match self.campaign_id() {
            Some(id) => Self::Paused(id),
            None => self,
        }
    }

    /// Resume：仅 Paused → Running
    pub fn on_resume(self) -> Self {
        match self {
            Self::Paused(id) => Self::Running(id),
            other => other,
        }
    }

    /// 用户指令已记入 `id`：总是进入 Running（新指令意味着新的意图）
    pub fn on_instruction(self, id: CampaignId) -> Self {
        Self::Running(id)
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::NoCampaign
    }
}
