//! Runtime 构建：统一的组件初始化逻辑（存储、LLM 决策器、抓取器、Runtime 参数）

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::runtime::{CampaignRunner, RuntimeOptions};
use crate::core::StorageError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::llm::create_llm_from_config;
use crate::oracle::{LlmOracle, Oracle};
use crate::store::{create_store, CampaignStore};

/// 预构建的 Runtime 组件；测试或嵌入方可以替换其中任意一个端口再组装
pub struct RuntimeComponents {
    pub store: Arc<dyn CampaignStore>,
    pub oracle: Arc<dyn Oracle>,
    pub fetcher: Arc<dyn Fetcher>,
    pub options: RuntimeOptions,
}

impl RuntimeComponents {
    /// 按配置构建全部端口
    pub async fn from_config(config: &AppConfig) -> Result<Self, StorageError> {
        let store = create_store(&config.storage).await?;
        let llm = create_llm_from_config(config);
        let oracle: Arc<dyn Oracle> = Arc::new(LlmOracle::new(llm, config.llm.timeouts.request));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.fetch));

        Ok(Self {
            store,
            oracle,
            fetcher,
            options: RuntimeOptions::from(&config.runtime),
        })
    }

    pub fn into_runner(self) -> CampaignRunner {
        CampaignRunner::new(self.store, self.oracle, self.fetcher, self.options)
    }
}

/// 按配置创建未启动的 CampaignRunner
pub async fn create_runner(config: &AppConfig) -> Result<CampaignRunner, StorageError> {
    Ok(RuntimeComponents::from_config(config).await?.into_runner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_components_follow_config() {
        let mut config = AppConfig::default();
        config.runtime.step_yield_ms = 7;
        config.runtime.notification_capacity = 16;

        let components = RuntimeComponents::from_config(&config).await.unwrap();
        assert_eq!(components.options.step_yield.as_millis(), 7);
        assert_eq!(components.options.notification_capacity, 16);

        let runner = components.into_runner();
        assert!(runner.state().borrow().campaign_id().is_none());
    }

    #[tokio::test]
    async fn test_unknown_storage_backend_fails_bootstrap() {
        let mut config = AppConfig::default();
        config.storage.backend = "nowhere".to_string();
        assert!(matches!(
            create_runner(&config).await.err(),
            Some(StorageError::Backend(_))
        ));
    }
}
