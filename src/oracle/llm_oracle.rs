//! 基于 LLM 的 Oracle：拼 system prompt + {task, artifacts} 载荷，调用 LLM 并解码回复

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{decode_reply, reply_schema_json, Oracle, OracleReply};
use crate::campaign::Artifact;
use crate::core::OracleError;
use crate::llm::{LlmClient, Message};

const BASE_PROMPT: &str = "You drive a research campaign one task at a time. \
Return JSON only. Allowed actions: fetch, request_user_input, no_op. \
Use fetch with a URL argument to retrieve content, request_user_input with a question \
argument when the task cannot proceed without the user, no_op when nothing needs doing.";

#[derive(Serialize)]
struct ProposePayload<'a> {
    task: &'a str,
    artifacts: &'a [Artifact],
}

pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    timeout_secs: u64,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            llm,
            system_prompt: default_system_prompt(),
            timeout_secs,
        }
    }
}

/// 默认 system prompt：指令 + 回复 JSON Schema
pub fn default_system_prompt() -> String {
    format!(
        "{}\n\nReply with a single JSON object matching this schema:\n{}",
        BASE_PROMPT,
        reply_schema_json()
    )
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn propose(
        &self,
        task_description: &str,
        artifacts: &[Artifact],
    ) -> Result<OracleReply, OracleError> {
        let payload = serde_json::to_string(&ProposePayload {
            task: task_description,
            artifacts,
        })
        .map_err(|e| OracleError::Llm(format!("encode request: {}", e)))?;

        let messages = [
            Message::system(self.system_prompt.clone()),
            Message::user(payload),
        ];

        tracing::debug!(task = %task_description, artifacts = artifacts.len(), "oracle propose");
        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs.max(1)),
            self.llm.complete(&messages),
        )
        .await
        .map_err(|_| OracleError::Timeout(self.timeout_secs))?
        .map_err(OracleError::Llm)?;

        decode_reply(&output)
    }
}
