//! Step Executor：把一个 Campaign 推进恰好一个单位
//!
//! 每一步都从存储重新读取 Campaign / Task / Artifact，不跨步缓存；任意两步之间崩溃，
//! 存储中的状态都可以继续执行。端口错误原样向上传播，不捕获、不重试。

use std::sync::Arc;

use crate::campaign::{Artifact, CampaignId, CampaignStatus, TaskStatus};
use crate::core::StepError;
use crate::fetch::Fetcher;
use crate::notify::{ChatRole, Notifier};
use crate::oracle::{Oracle, ProposalKind};
use crate::store::CampaignStore;

/// 单步结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// 一个任务完成
    Advanced,
    /// Oracle 请求用户输入：Campaign 已置为 Paused，任务保持 InProgress
    AwaitingInput,
    /// 没有待处理任务：Campaign 已置为 Completed
    Completed,
}

pub struct StepExecutor {
    store: Arc<dyn CampaignStore>,
    oracle: Arc<dyn Oracle>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
}

impl StepExecutor {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        oracle: Arc<dyn Oracle>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            oracle,
            fetcher,
            notifier,
        }
    }

    pub async fn execute_one_step(&self, campaign_id: CampaignId) -> Result<StepOutcome, StepError> {
        let state = self.store.load_state(campaign_id).await?;

        let Some(task) = state.next_task().cloned() else {
            self.store
                .set_campaign_status(campaign_id, CampaignStatus::Completed)
                .await?;
            tracing::info!(campaign = %campaign_id, "campaign completed");
            self.notifier.notify(ChatRole::System, "Campaign completed.");
            return Ok(StepOutcome::Completed);
        };

        if task.status == TaskStatus::Pending {
            self.store
                .set_task_status(task.id, TaskStatus::InProgress)
                .await?;
        }
        tracing::debug!(campaign = %campaign_id, task = %task.id, "executing task");
        self.notifier
            .notify(ChatRole::System, &format!("Executing: {}", task.description));

        let reply = self.oracle.propose(&task.description, &state.artifacts).await?;

        if let Some(explanation) = &reply.explanation {
            self.notifier.notify(ChatRole::Agent, explanation);
        }

        match &reply.proposal.kind {
            ProposalKind::RequestUserInput { prompt } => {
                self.store
                    .set_campaign_status(campaign_id, CampaignStatus::Paused)
                    .await?;
                tracing::info!(campaign = %campaign_id, task = %task.id, "waiting for user input");
                self.notifier.notify(ChatRole::Agent, prompt);
                self.notifier.notify(ChatRole::System, "Waiting for user input.");
                return Ok(StepOutcome::AwaitingInput);
            }
            ProposalKind::Fetch { url } => {
                let content = self.fetcher.fetch(url).await?;
                self.store
                    .append_artifact(campaign_id, &Artifact::research(url.clone(), content))
                    .await?;
            }
            ProposalKind::NoOp => {}
            ProposalKind::Other(action) => {
                tracing::debug!(action = %action, "unknown proposal treated as no_op");
            }
        }

        self.store.set_task_status(task.id, TaskStatus::Done).await?;
        self.notifier.notify(ChatRole::System, "Task completed.");
        Ok(StepOutcome::Advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{Campaign, Task};
    use crate::core::{FetchError, OracleError, StorageError};
    use crate::fetch::StaticFetcher;
    use crate::llm::ScriptedLlmClient;
    use crate::notify::RecordingNotifier;
    use crate::oracle::LlmOracle;
    use crate::store::InMemoryCampaignStore;

    struct Harness {
        store: Arc<InMemoryCampaignStore>,
        notifier: Arc<RecordingNotifier>,
        executor: StepExecutor,
        campaign: Campaign,
    }

    async fn harness(replies: Vec<Result<String, String>>, fetcher: StaticFetcher, tasks: &[&str]) -> (Harness, Vec<Task>) {
        let store = Arc::new(InMemoryCampaignStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle = Arc::new(LlmOracle::new(Arc::new(ScriptedLlmClient::new(replies)), 5));
        let executor = StepExecutor::new(store.clone(), oracle, Arc::new(fetcher), notifier.clone());

        let campaign = Campaign::new_active();
        store.create_campaign(&campaign).await.unwrap();
        let mut created = Vec::new();
        for d in tasks {
            let t = Task::pending(*d);
            store.create_task(campaign.id, &t).await.unwrap();
            created.push(t);
        }
        (
            Harness {
                store,
                notifier,
                executor,
                campaign,
            },
            created,
        )
    }

    fn ok(s: &str) -> Result<String, String> {
        Ok(s.to_string())
    }

    #[tokio::test]
    async fn test_request_user_input_pauses_and_keeps_task_in_progress() {
        let (h, tasks) = harness(
            vec![ok(r#"{"action":"request_user_input","argument":"Which X?"}"#)],
            StaticFetcher::new(),
            &["Process: find X"],
        )
        .await;

        let outcome = h.executor.execute_one_step(h.campaign.id).await.unwrap();
        assert_eq!(outcome, StepOutcome::AwaitingInput);

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.campaign.status, CampaignStatus::Paused);
        assert_eq!(state.tasks[0].id, tasks[0].id);
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);

        assert_eq!(
            h.notifier.transcript(),
            vec![
                (ChatRole::System, "Executing: Process: find X".to_string()),
                (ChatRole::Agent, "Which X?".to_string()),
                (ChatRole::System, "Waiting for user input.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_appends_research_artifact() {
        let (h, _) = harness(
            vec![ok(r#"{"action":"fetch","argument":"https://example.com/a","explanation":"Reading the page."}"#)],
            StaticFetcher::new().with_page("https://example.com/a", "BODY"),
            &["Process: read a"],
        )
        .await;

        let outcome = h.executor.execute_one_step(h.campaign.id).await.unwrap();
        assert_eq!(outcome, StepOutcome::Advanced);

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::Done);
        assert_eq!(
            state.artifacts,
            vec![Artifact::research("https://example.com/a", "BODY")]
        );
        assert_eq!(
            h.notifier.transcript(),
            vec![
                (ChatRole::System, "Executing: Process: read a".to_string()),
                (ChatRole::Agent, "Reading the page.".to_string()),
                (ChatRole::System, "Task completed.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_n_tasks_complete_after_n_steps() {
        let (h, _) = harness(
            vec![
                ok(r#"{"action":"no_op"}"#),
                ok(r#"{"action":"fetch","argument":"https://example.com/a"}"#),
                ok(r#"{"action":"something_new"}"#),
            ],
            StaticFetcher::new().with_page("https://example.com/a", "BODY"),
            &["one", "two", "three"],
        )
        .await;

        for _ in 0..3 {
            assert_eq!(
                h.executor.execute_one_step(h.campaign.id).await.unwrap(),
                StepOutcome::Advanced
            );
            let state = h.store.load_state(h.campaign.id).await.unwrap();
            let in_progress = state
                .tasks
                .iter()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count();
            assert_eq!(in_progress, 0);
        }
        assert_eq!(
            h.executor.execute_one_step(h.campaign.id).await.unwrap(),
            StepOutcome::Completed
        );

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.campaign.status, CampaignStatus::Completed);
        assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Done));

        let transcript = h.notifier.transcript();
        assert_eq!(
            transcript
                .iter()
                .filter(|(_, c)| c == "Task completed.")
                .count(),
            3
        );
        assert_eq!(
            transcript
                .iter()
                .filter(|(_, c)| c == "Campaign completed.")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_tasks_run_in_creation_order() {
        let (h, _) = harness(
            vec![ok(r#"{"action":"no_op"}"#), ok(r#"{"action":"no_op"}"#)],
            StaticFetcher::new(),
            &["first", "second"],
        )
        .await;
        h.executor.execute_one_step(h.campaign.id).await.unwrap();
        h.executor.execute_one_step(h.campaign.id).await.unwrap();

        let executing: Vec<String> = h
            .notifier
            .transcript()
            .into_iter()
            .filter_map(|(_, c)| c.strip_prefix("Executing: ").map(String::from))
            .collect();
        assert_eq!(executing, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_oracle_failure_leaves_task_in_progress() {
        let (h, _) = harness(vec![Err("boom".to_string())], StaticFetcher::new(), &["t"]).await;

        let err = h.executor.execute_one_step(h.campaign.id).await.unwrap_err();
        assert_eq!(err, StepError::Oracle(OracleError::Llm("boom".into())));

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(state.campaign.status, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn test_malformed_proposal_is_not_a_no_op() {
        let (h, _) = harness(vec![ok(r#"{"argument":"x"}"#)], StaticFetcher::new(), &["t"]).await;
        let err = h.executor.execute_one_step(h.campaign.id).await.unwrap_err();
        assert!(matches!(err, StepError::Oracle(OracleError::Malformed(_))));

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let (h, _) = harness(
            vec![ok(r#"{"action":"fetch","argument":"https://example.com/missing"}"#)],
            StaticFetcher::new(),
            &["t"],
        )
        .await;
        let err = h.executor.execute_one_step(h.campaign.id).await.unwrap_err();
        assert!(matches!(err, StepError::Fetch(FetchError::NotAvailable(_))));

        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.tasks[0].status, TaskStatus::InProgress);
        assert!(state.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_resumed_task_is_retried_before_next_pending() {
        let (h, tasks) = harness(
            vec![
                ok(r#"{"action":"request_user_input","argument":"Which X?"}"#),
                ok(r#"{"action":"no_op"}"#),
            ],
            StaticFetcher::new(),
            &["Process: find X"],
        )
        .await;
        h.executor.execute_one_step(h.campaign.id).await.unwrap();

        let follow_up = Task::pending("Process: X = 42");
        h.store.create_task(h.campaign.id, &follow_up).await.unwrap();
        h.notifier.clear();

        assert_eq!(
            h.executor.execute_one_step(h.campaign.id).await.unwrap(),
            StepOutcome::Advanced
        );
        let state = h.store.load_state(h.campaign.id).await.unwrap();
        assert_eq!(state.tasks[0].id, tasks[0].id);
        assert_eq!(state.tasks[0].status, TaskStatus::Done);
        assert_eq!(state.tasks[1].status, TaskStatus::Pending);
        assert_eq!(
            h.notifier.transcript()[0],
            (ChatRole::System, "Executing: Process: find X".to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_campaign_is_storage_error() {
        let (h, _) = harness(vec![], StaticFetcher::new(), &[]).await;
        let err = h.executor.execute_one_step(CampaignId::new()).await.unwrap_err();
        assert!(matches!(err, StepError::Storage(StorageError::NotFound(_))));
        assert!(h.notifier.messages().is_empty());
    }
}
