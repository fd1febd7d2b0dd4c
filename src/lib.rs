//! Campaigner - 长时运行、可中断的 Campaign 执行运行时
//!
//! 模块划分：
//! - **campaign**: 领域类型（Campaign / Task / Artifact / Command）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 主控循环、控制器、单步执行器、错误与状态机
//! - **fetch**: URL 抓取端口（HTTP 实现与静态测试实现）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **notify**: 叙述消息广播
//! - **oracle**: 决策端口：由 LLM 为当前任务提出下一步动作
//! - **store**: Campaign 持久化（内存 / SQLite）

pub mod campaign;
pub mod config;
pub mod core;
pub mod fetch;
pub mod llm;
pub mod notify;
pub mod observability;
pub mod oracle;
pub mod store;

pub use crate::core::{CampaignRunner, RuntimeOptions, RuntimeState};
