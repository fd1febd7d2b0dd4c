//! Campaign 领域模型：ID、Campaign / Task / Artifact、命令

pub mod command;
pub mod types;

pub use command::Command;
pub use types::{
    Artifact, ArtifactKind, Campaign, CampaignId, CampaignState, CampaignStatus, Task, TaskId,
    TaskStatus,
};
