//! Proposal：Oracle 的决策及其解码
//!
//! LLM 回复为扁平 JSON：`{"action": "...", "argument": "...", "reason": "...", "explanation": "..."}`。
//! 解码按已知结构校验，缺少必需字段时报错，不会静默降级为 no_op。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::core::OracleError;

/// 决策类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalKind {
    /// 抓取 URL 内容，结果存为 research artifact
    Fetch { url: String },
    /// 暂停当前任务，向用户提问
    RequestUserInput { prompt: String },
    /// 保留：不执行动作
    NoOp,
    /// 未知动作，按 no_op 执行
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub kind: ProposalKind,
    /// 内部理由（不展示）
    pub reason: Option<String>,
}

/// 一次 propose 的结果：决策 + 可选的人类可读解释
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleReply {
    pub proposal: Proposal,
    pub explanation: Option<String>,
}

impl OracleReply {
    pub fn new(kind: ProposalKind) -> Self {
        Self {
            proposal: Proposal { kind, reason: None },
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }
}

/// LLM 回复格式；同时用于生成注入 system prompt 的 JSON Schema
#[derive(Debug, Deserialize, JsonSchema)]
struct ReplyFormat {
    /// 动作：fetch | request_user_input | no_op
    #[serde(alias = "type")]
    action: String,
    /// fetch 时为 URL；request_user_input 时为向用户提出的问题
    #[serde(default)]
    argument: Option<String>,
    /// 选择该动作的内部理由
    #[serde(default)]
    reason: Option<String>,
    /// 给用户看的简短说明
    #[serde(default)]
    explanation: Option<String>,
}

/// 返回回复格式的 JSON Schema 字符串，可拼入 system prompt
pub fn reply_schema_json() -> String {
    let schema = schema_for!(ReplyFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 从 LLM 文本中取出 JSON 对象（```json ... ``` 或首个 `{` 至末个 `}`）
fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// 将 LLM 输出解码为 OracleReply
pub fn decode_reply(output: &str) -> Result<OracleReply, OracleError> {
    let json = extract_json(output)
        .ok_or_else(|| OracleError::Malformed(format!("no JSON object in reply: {}", output.trim())))?;

    let raw: ReplyFormat = serde_json::from_str(json)
        .map_err(|e| OracleError::Malformed(format!("{}: {}", e, json)))?;

    let action = raw.action.trim().to_lowercase();
    let argument = non_empty(raw.argument);
    let kind = match action.as_str() {
        "fetch" => ProposalKind::Fetch {
            url: argument.ok_or_else(|| {
                OracleError::Malformed("fetch requires a URL argument".to_string())
            })?,
        },
        "request_user_input" => ProposalKind::RequestUserInput {
            prompt: argument.ok_or_else(|| {
                OracleError::Malformed("request_user_input requires a prompt argument".to_string())
            })?,
        },
        "no_op" => ProposalKind::NoOp,
        "" => return Err(OracleError::Malformed("empty action".to_string())),
        _ => ProposalKind::Other(action),
    };

    Ok(OracleReply {
        proposal: Proposal {
            kind,
            reason: non_empty(raw.reason),
        },
        explanation: non_empty(raw.explanation),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fetch() {
        let reply = decode_reply(
            r#"{"action":"fetch","argument":"https://example.com/a","reason":"need data","explanation":"Looking it up."}"#,
        )
        .unwrap();
        assert_eq!(
            reply.proposal.kind,
            ProposalKind::Fetch {
                url: "https://example.com/a".into()
            }
        );
        assert_eq!(reply.proposal.reason.as_deref(), Some("need data"));
        assert_eq!(reply.explanation.as_deref(), Some("Looking it up."));
    }

    #[test]
    fn test_decode_request_user_input_from_fenced_block() {
        let text = "Sure.\n```json\n{\"action\": \"request_user_input\", \"argument\": \"Which X?\"}\n```";
        let reply = decode_reply(text).unwrap();
        assert_eq!(
            reply.proposal.kind,
            ProposalKind::RequestUserInput {
                prompt: "Which X?".into()
            }
        );
        assert!(reply.explanation.is_none());
    }

    #[test]
    fn test_decode_accepts_type_alias() {
        let reply = decode_reply(r#"{"type":"no_op"}"#).unwrap();
        assert_eq!(reply.proposal.kind, ProposalKind::NoOp);
    }

    #[test]
    fn test_decode_unknown_action_is_other() {
        let reply = decode_reply(r#"{"action":"Summarize","argument":null}"#).unwrap();
        assert_eq!(reply.proposal.kind, ProposalKind::Other("summarize".into()));
    }

    #[test]
    fn test_decode_missing_action_is_malformed() {
        let err = decode_reply(r#"{"argument":"https://example.com"}"#).unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_decode_fetch_without_argument_is_malformed() {
        assert!(matches!(
            decode_reply(r#"{"action":"fetch"}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            decode_reply(r#"{"action":"request_user_input","argument":"  "}"#),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_plain_text_is_malformed() {
        assert!(matches!(
            decode_reply("I think we should fetch the page."),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_reply_schema_lists_fields() {
        let schema = reply_schema_json();
        assert!(schema.contains("action"));
        assert!(schema.contains("argument"));
        assert!(schema.contains("explanation"));
    }
}
