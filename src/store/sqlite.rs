//! SQLite Campaign 存储（sqlx，异步）
//!
//! 需要启用 `sqlite` feature。tasks / artifacts 带自增 seq 列，读取时按 seq 排序即创建顺序。

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use super::CampaignStore;
use crate::campaign::{Artifact, Campaign, CampaignId, CampaignState, CampaignStatus, Task, TaskId, TaskStatus};
use crate::core::StorageError;

pub struct SqliteCampaignStore {
    pool: SqlitePool,
}

impl SqliteCampaignStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tasks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                campaign_id TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY (campaign_id) REFERENCES campaigns(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS artifacts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id TEXT NOT NULL,
                type TEXT NOT NULL,
                key TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (campaign_id) REFERENCES campaigns(id)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_campaign ON tasks(campaign_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_campaign ON artifacts(campaign_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ensure_campaign(&self, campaign_id: CampaignId) -> Result<(), StorageError> {
        let exists = sqlx::query("SELECT 1 FROM campaigns WHERE id = ?")
            .bind(campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StorageError::NotFound(format!("campaign {}", campaign_id)));
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|e| StorageError::Corrupt(format!("{}: {}", s, e)))
}

#[async_trait]
impl CampaignStore for SqliteCampaignStore {
    async fn create_campaign(&self, campaign: &Campaign) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO campaigns (id, name, status, created_at) VALUES (?, ?, ?, ?)")
            .bind(campaign.id.to_string())
            .bind(&campaign.name)
            .bind(campaign.status.as_str())
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_task(&self, campaign_id: CampaignId, task: &Task) -> Result<(), StorageError> {
        self.ensure_campaign(campaign_id).await?;
        sqlx::query("INSERT INTO tasks (id, campaign_id, description, status) VALUES (?, ?, ?, ?)")
            .bind(task.id.to_string())
            .bind(campaign_id.to_string())
            .bind(&task.description)
            .bind(task.status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_artifact(
        &self,
        campaign_id: CampaignId,
        artifact: &Artifact,
    ) -> Result<(), StorageError> {
        self.ensure_campaign(campaign_id).await?;
        sqlx::query(
            "INSERT INTO artifacts (campaign_id, type, key, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(campaign_id.to_string())
        .bind(artifact.kind.as_str())
        .bind(&artifact.key)
        .bind(&artifact.content)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_state(&self, campaign_id: CampaignId) -> Result<CampaignState, StorageError> {
        let id = campaign_id.to_string();
        let row = sqlx::query("SELECT name, status FROM campaigns WHERE id = ?")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("campaign {}", campaign_id)))?;
        let name: String = row.get("name");
        let status: String = row.get("status");
        let campaign = Campaign {
            id: campaign_id,
            name,
            status: CampaignStatus::parse(&status)
                .ok_or_else(|| StorageError::Corrupt(format!("campaign status {}", status)))?,
        };

        let rows = sqlx::query(
            "SELECT id, description, status FROM tasks WHERE campaign_id = ? ORDER BY seq ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let task_id: String = row.get("id");
            let description: String = row.get("description");
            let status: String = row.get("status");
            tasks.push(Task {
                id: TaskId(parse_uuid(&task_id)?),
                description,
                status: TaskStatus::parse(&status)
                    .ok_or_else(|| StorageError::Corrupt(format!("task status {}", status)))?,
            });
        }

        let rows = sqlx::query(
            "SELECT type, key, content FROM artifacts WHERE campaign_id = ? ORDER BY seq ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;
        let artifacts = rows
            .into_iter()
            .map(|row| {
                let kind: String = row.get("type");
                Artifact {
                    kind: kind.into(),
                    key: row.get("key"),
                    content: row.get("content"),
                }
            })
            .collect();

        Ok(CampaignState {
            campaign,
            tasks,
            artifacts,
        })
    }

    async fn set_task_status(&self, task_id: TaskId, status: TaskStatus) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("task {}", task_id)));
        }
        Ok(())
    }

    async fn set_campaign_status(
        &self,
        campaign_id: CampaignId,
        status: CampaignStatus,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE campaigns SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(campaign_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("campaign {}", campaign_id)));
        }
        Ok(())
    }
}
