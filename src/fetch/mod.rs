//! Fetch Port：按资源标识（URL）获取外部内容
//!
//! - HttpFetcher：reqwest GET + HTML 转文本
//! - StaticFetcher：预置 URL → 内容映射（测试与离线运行）

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::FetchError;

pub use http::HttpFetcher;

/// 抓取接口：成功返回内容，失败即 FetchError（不重试）
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// 静态抓取：只认预置的 URL，其余返回 NotAvailable
#[derive(Debug, Default, Clone)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.insert(url.into(), content.into());
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotAvailable(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with_page("https://example.com/a", "BODY");
        assert_eq!(fetcher.fetch("https://example.com/a").await.unwrap(), "BODY");
        assert_eq!(
            fetcher.fetch("https://example.com/b").await.unwrap_err(),
            FetchError::NotAvailable("https://example.com/b".into())
        );
    }
}
