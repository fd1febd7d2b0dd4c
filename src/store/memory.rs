//! 内存存储：单进程内的 Campaign 记录，Task 与 Artifact 保持插入顺序

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CampaignStore;
use crate::campaign::{Artifact, Campaign, CampaignId, CampaignState, CampaignStatus, Task, TaskId, TaskStatus};
use crate::core::StorageError;

#[derive(Default)]
struct Inner {
    campaigns: HashMap<CampaignId, Campaign>,
    /// 每个 Campaign 的任务，按创建顺序
    tasks: HashMap<CampaignId, Vec<Task>>,
    /// 任务 → 所属 Campaign
    task_owner: HashMap<TaskId, CampaignId>,
    artifacts: HashMap<CampaignId, Vec<Artifact>>,
}

/// 内存 Campaign 存储
#[derive(Default)]
pub struct InMemoryCampaignStore {
    inner: RwLock<Inner>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录的 Campaign 数
    pub async fn campaign_count(&self) -> usize {
        self.inner.read().await.campaigns.len()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(StorageError::Backend(format!(
                "campaign {} already exists",
                campaign.id
            )));
        }
        inner.campaigns.insert(campaign.id, campaign.clone());
        inner.tasks.entry(campaign.id).or_default();
        inner.artifacts.entry(campaign.id).or_default();
        Ok(())
    }

    async fn create_task(&self, campaign_id: CampaignId, task: &Task) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.campaigns.contains_key(&campaign_id) {
            return Err(StorageError::NotFound(format!("campaign {}", campaign_id)));
        }
        inner.task_owner.insert(task.id, campaign_id);
        inner.tasks.entry(campaign_id).or_default().push(task.clone());
        Ok(())
    }

    async fn append_artifact(
        &self,
        campaign_id: CampaignId,
        artifact: &Artifact,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.campaigns.contains_key(&campaign_id) {
            return Err(StorageError::NotFound(format!("campaign {}", campaign_id)));
        }
        inner
            .artifacts
            .entry(campaign_id)
            .or_default()
            .push(artifact.clone());
        Ok(())
    }

    async fn load_state(&self, campaign_id: CampaignId) -> Result<CampaignState, StorageError> {
        let inner = self.inner.read().await;
        let campaign = inner
            .campaigns
            .get(&campaign_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("campaign {}", campaign_id)))?;
        Ok(CampaignState {
            campaign,
            tasks: inner.tasks.get(&campaign_id).cloned().unwrap_or_default(),
            artifacts: inner.artifacts.get(&campaign_id).cloned().unwrap_or_default(),
        })
    }

    async fn set_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let owner = *inner
            .task_owner
            .get(&task_id)
            .ok_or_else(|| StorageError::NotFound(format!("task {}", task_id)))?;
        let task = inner
            .tasks
            .get_mut(&owner)
            .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
            .ok_or_else(|| StorageError::NotFound(format!("task {}", task_id)))?;
        task.status = status;
        Ok(())
    }

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let campaign = inner
            .campaigns
            .get_mut(&campaign_id)
            .ok_or_else(|| StorageError::NotFound(format!("campaign {}", campaign_id)))?;
        campaign.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = InMemoryCampaignStore::new();
        let campaign = Campaign::new_active();
        store.create_campaign(&campaign).await.unwrap();

        let first = Task::pending("first");
        let second = Task::pending("second");
        store.create_task(campaign.id, &first).await.unwrap();
        store.create_task(campaign.id, &second).await.unwrap();
        store
            .append_artifact(campaign.id, &Artifact::user_message("hello"))
            .await
            .unwrap();

        store.set_task_status(first.id, TaskStatus::Done).await.unwrap();
        store
            .set_campaign_status(campaign.id, CampaignStatus::Paused)
            .await
            .unwrap();

        let state = store.load_state(campaign.id).await.unwrap();
        assert_eq!(state.campaign.status, CampaignStatus::Paused);
        assert_eq!(
            state.tasks.iter().map(|t| t.description.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(state.tasks[0].status, TaskStatus::Done);
        assert_eq!(state.artifacts.len(), 1);
        assert_eq!(store.campaign_count().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_unknown_ids() {
        let store = InMemoryCampaignStore::new();
        let missing = CampaignId::new();
        assert!(matches!(
            store.load_state(missing).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.create_task(missing, &Task::pending("x")).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.set_task_status(TaskId::new(), TaskStatus::Done).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_campaign() {
        let store = InMemoryCampaignStore::new();
        let campaign = Campaign::new_active();
        store.create_campaign(&campaign).await.unwrap();
        assert!(store.create_campaign(&campaign).await.is_err());
    }
}
