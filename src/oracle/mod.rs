//! Oracle Port：给定任务描述与累积 artifact，返回结构化决策
//!
//! LlmOracle 通过 LlmClient 调用语言模型，回复经 decode_reply 校验；无法解析即 OracleError。

pub mod llm_oracle;
pub mod proposal;

use async_trait::async_trait;

use crate::campaign::Artifact;
use crate::core::OracleError;

pub use llm_oracle::LlmOracle;
pub use proposal::{decode_reply, reply_schema_json, OracleReply, Proposal, ProposalKind};

/// 决策接口
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn propose(
        &self,
        task_description: &str,
        artifacts: &[Artifact],
    ) -> Result<OracleReply, OracleError>;
}
