//! Campaign Controller：把用户指令转为 Campaign 生命周期变更，并把单步推进委托给 StepExecutor

use std::sync::Arc;

use crate::campaign::{Artifact, Campaign, CampaignId, CampaignStatus, Task};
use crate::core::executor::{StepExecutor, StepOutcome};
use crate::core::{StepError, StorageError};
use crate::notify::{ChatRole, Notifier};
use crate::store::CampaignStore;

pub struct CampaignController {
    store: Arc<dyn CampaignStore>,
    notifier: Arc<dyn Notifier>,
    executor: StepExecutor,
}

impl CampaignController {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        notifier: Arc<dyn Notifier>,
        executor: StepExecutor,
    ) -> Self {
        Self {
            store,
            notifier,
            executor,
        }
    }

    /// 记录一条用户指令，返回（可能新建的）Campaign ID
    ///
    /// 没有当前 Campaign 时新建并置为 Active；已有时重新置为 Active（新指令意味着继续执行）。
    /// 指令写入 user_message artifact，并追加 Pending 任务 "Process: {text}"。
    /// 已有 Campaign 的 Active 在指令写入成功后才落盘：写入失败时持久化状态保持不变。
    pub async fn handle_user_message(
        &self,
        current: Option<CampaignId>,
        text: &str,
    ) -> Result<CampaignId, StorageError> {
        let id = match current {
            Some(id) => id,
            None => self.create_campaign().await?,
        };

        self.store
            .append_artifact(id, &Artifact::user_message(text))
            .await?;
        self.store
            .create_task(id, &Task::for_instruction(text))
            .await?;
        if current.is_some() {
            self.store
                .set_campaign_status(id, CampaignStatus::Active)
                .await?;
        }
        tracing::info!(campaign = %id, "user instruction recorded");
        self.notifier
            .notify(ChatRole::System, "User instruction recorded.");
        Ok(id)
    }

    /// 持久化 Paused，不改动任何任务
    pub async fn pause(&self, campaign_id: CampaignId) -> Result<(), StorageError> {
        self.store
            .set_campaign_status(campaign_id, CampaignStatus::Paused)
            .await
    }

    /// 持久化 Active，恢复推进
    pub async fn resume(&self, campaign_id: CampaignId) -> Result<(), StorageError> {
        self.store
            .set_campaign_status(campaign_id, CampaignStatus::Active)
            .await
    }

    pub async fn execute_one_step(&self, campaign_id: CampaignId) -> Result<StepOutcome, StepError> {
        self.executor.execute_one_step(campaign_id).await
    }

    async fn create_campaign(&self) -> Result<CampaignId, StorageError> {
        let campaign = Campaign::new_active();
        self.store.create_campaign(&campaign).await?;
        tracing::info!(campaign = %campaign.id, name = %campaign.name, "campaign created");
        self.notifier.notify(
            ChatRole::System,
            &format!("Campaign created: {}", campaign.name),
        );
        Ok(campaign.id)
    }
}
