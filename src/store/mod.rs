//! Storage Port：Campaign / Task / Artifact 的持久化接口
//!
//! 每个操作单独原子；核心层不需要跨操作事务。支持内存与 SQLite（`sqlite` feature）两种实现。

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::campaign::{Artifact, Campaign, CampaignId, CampaignState, CampaignStatus, Task, TaskId, TaskStatus};
use crate::config::StorageSection;
use crate::core::StorageError;

pub use memory::InMemoryCampaignStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCampaignStore;

/// Campaign 存储接口
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), StorageError>;

    async fn create_task(&self, campaign_id: CampaignId, task: &Task) -> Result<(), StorageError>;

    async fn append_artifact(
        &self,
        campaign_id: CampaignId,
        artifact: &Artifact,
    ) -> Result<(), StorageError>;

    /// 读取 Campaign 及其全部 Task（创建顺序）与 Artifact（写入顺序）
    async fn load_state(&self, campaign_id: CampaignId) -> Result<CampaignState, StorageError>;

    async fn set_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StorageError>;

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<(), StorageError>;
}

/// 创建存储
///
/// backend = "memory" 使用内存存储；"sqlite" 需要启用 sqlite feature，打不开数据库时返回错误，不退回内存存储
pub async fn create_store(cfg: &StorageSection) -> Result<Arc<dyn CampaignStore>, StorageError> {
    match cfg.backend.to_ascii_lowercase().as_str() {
        "memory" => {
            tracing::info!("Using in-memory campaign store");
            Ok(Arc::new(InMemoryCampaignStore::new()))
        }
        "sqlite" => open_sqlite(cfg).await,
        other => Err(StorageError::Backend(format!(
            "unknown storage backend: {}",
            other
        ))),
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(cfg: &StorageSection) -> Result<Arc<dyn CampaignStore>, StorageError> {
    let store = SqliteCampaignStore::new(&cfg.sqlite_path).await?;
    tracing::info!("Using SQLite campaign store: {:?}", cfg.sqlite_path);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_cfg: &StorageSection) -> Result<Arc<dyn CampaignStore>, StorageError> {
    Err(StorageError::Backend(
        "sqlite backend requested but the sqlite feature is not enabled".to_string(),
    ))
}
