//! 错误类型：存储、Oracle、抓取三类失败与运行时错误
//!
//! 三类失败对当前步都是致命的：StepExecutor 不捕获也不重试，交由 Runtime Loop 叙述后回到等待命令。

use thiserror::Error;

/// Storage Port 失败（连接不可用、写入被拒绝、记录不存在）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound("row".to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Oracle 调用失败或返回无法解析的内容
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed proposal: {0}")]
    Malformed(String),
}

/// 外部内容抓取失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid or missing URL: {0}")]
    InvalidUrl(String),

    #[error("Domain not in allowlist: {0}")]
    DomainNotAllowed(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("Read body: {0}")]
    Body(String),

    #[error("No content for {0}")]
    NotAvailable(String),
}

/// 单步执行失败，包装三类端口错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
}

/// Runtime 调用方可见的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime loop has terminated")]
    Closed,
}
