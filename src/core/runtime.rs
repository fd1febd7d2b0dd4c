//! Campaign Runtime：命令队列 + 单消费者主控循环
//!
//! 调用方通过 submit 提交 UserMessage / Stop / Resume（无界 MPSC，保持提交顺序）；
//! 后台循环逐条取出命令交给 Controller，随后在未暂停且无新命令时逐步推进任务，
//! 每一步之间非阻塞地检查是否有新命令，并短暂让出以避免空转。
//! 一步执行中不观察命令与取消：单步相对命令是原子的。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::campaign::{CampaignId, Command};
use crate::config::RuntimeSection;
use crate::core::controller::CampaignController;
use crate::core::executor::{StepExecutor, StepOutcome};
use crate::core::{RuntimeError, RuntimeState, StepError};
use crate::fetch::Fetcher;
use crate::notify::{BroadcastNotifier, ChatMessage, ChatRole, Notifier};
use crate::oracle::Oracle;
use crate::store::CampaignStore;

/// Runtime 参数
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// 两步之间的让出时长（不是限流，只是让调度器有机会处理新命令）
    pub step_yield: Duration,
    /// 通知广播容量；订阅者落后超过该值会丢消息
    pub notification_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            step_yield: Duration::from_millis(50),
            notification_capacity: 256,
        }
    }
}

impl From<&RuntimeSection> for RuntimeOptions {
    fn from(cfg: &RuntimeSection) -> Self {
        Self {
            step_yield: Duration::from_millis(cfg.step_yield_ms),
            notification_capacity: cfg.notification_capacity,
        }
    }
}

/// 命令收件箱：在 mpsc 接收端上加一个暂存位，实现「查看是否有新命令」而不丢失命令
struct CommandInbox {
    rx: mpsc::UnboundedReceiver<Command>,
    stash: Option<Command>,
}

impl CommandInbox {
    fn new(rx: mpsc::UnboundedReceiver<Command>) -> Self {
        Self { rx, stash: None }
    }

    async fn next(&mut self) -> Option<Command> {
        if let Some(cmd) = self.stash.take() {
            return Some(cmd);
        }
        self.rx.recv().await
    }

    fn has_pending(&mut self) -> bool {
        if self.stash.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(cmd) => {
                self.stash = Some(cmd);
                true
            }
            Err(_) => false,
        }
    }
}

/// start() 时交给后台循环的部件
struct LoopParts {
    rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<RuntimeState>,
}

/// 调用方入口：start / submit / subscribe / shutdown
pub struct CampaignRunner {
    commands: mpsc::UnboundedSender<Command>,
    parts: Mutex<Option<LoopParts>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state_rx: watch::Receiver<RuntimeState>,
    controller: Arc<CampaignController>,
    notifier: Arc<BroadcastNotifier>,
    cancel: CancellationToken,
    step_yield: Duration,
}

impl CampaignRunner {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        oracle: Arc<dyn Oracle>,
        fetcher: Arc<dyn Fetcher>,
        options: RuntimeOptions,
    ) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new(options.notification_capacity));
        let executor = StepExecutor::new(store.clone(), oracle, fetcher, notifier.clone());
        let controller = Arc::new(CampaignController::new(store, notifier.clone(), executor));

        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RuntimeState::NoCampaign);

        Self {
            commands,
            parts: Mutex::new(Some(LoopParts { rx, state_tx })),
            handle: Mutex::new(None),
            state_rx,
            controller,
            notifier,
            cancel: CancellationToken::new(),
            step_yield: options.step_yield,
        }
    }

    /// 使用外部取消令牌（如 ShutdownManager 的子 token）
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 启动后台循环；已启动时什么也不做并返回 false
    pub fn start(&self) -> bool {
        let parts = match self.parts.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(LoopParts { rx, state_tx }) = parts else {
            return false;
        };

        let runtime_loop = RuntimeLoop {
            inbox: CommandInbox::new(rx),
            controller: self.controller.clone(),
            notifier: self.notifier.clone(),
            state_tx,
            cancel: self.cancel.clone(),
            step_yield: self.step_yield,
            state: RuntimeState::NoCampaign,
            idle: false,
        };
        let handle = tokio::spawn(runtime_loop.run());
        match self.handle.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
        true
    }

    /// 入队命令，不阻塞；循环已结束时返回 Closed
    pub fn submit(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands.send(command).map_err(|_| RuntimeError::Closed)
    }

    pub fn send_user_message(&self, text: impl Into<String>) -> Result<(), RuntimeError> {
        self.submit(Command::UserMessage(text.into()))
    }

    pub fn stop(&self) -> Result<(), RuntimeError> {
        self.submit(Command::Stop)
    }

    pub fn resume(&self) -> Result<(), RuntimeError> {
        self.submit(Command::Resume)
    }

    /// 订阅叙述消息（只收到订阅之后发出的消息）
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.notifier.subscribe()
    }

    /// 观察状态机的值
    pub fn state(&self) -> watch::Receiver<RuntimeState> {
        self.state_rx.clone()
    }

    /// 取消循环：下一个挂起点退出，不再处理后续命令；进行中的一步会先执行完
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// 等待后台循环结束
    pub async fn join(&self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Runtime loop task failed: {}", e);
            }
        }
    }
}

/// 后台循环：状态只在这里被修改
struct RuntimeLoop {
    inbox: CommandInbox,
    controller: Arc<CampaignController>,
    notifier: Arc<dyn Notifier>,
    state_tx: watch::Sender<RuntimeState>,
    cancel: CancellationToken,
    step_yield: Duration,
    state: RuntimeState,
    /// 当前 Campaign 已完成，等待新的指令；Stop / Resume 不改变该标记
    idle: bool,
}

impl RuntimeLoop {
    async fn run(mut self) {
        tracing::info!("Campaign runtime started");
        self.notifier.notify(ChatRole::System, "Agent runtime started.");

        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                cmd = self.inbox.next() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            self.dispatch(command).await;
            self.drain().await;
        }

        tracing::info!(state = ?self.state, "Campaign runtime stopped");
    }

    fn set_state(&mut self, state: RuntimeState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "runtime state");
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::UserMessage(text) => {
                self.notifier.notify(ChatRole::User, &text);
                match self
                    .controller
                    .handle_user_message(self.state.campaign_id(), &text)
                    .await
                {
                    Ok(id) => {
                        self.idle = false;
                        self.set_state(self.state.on_instruction(id));
                    }
                    Err(e) => {
                        tracing::warn!("Failed to record instruction: {}", e);
                        self.notifier
                            .notify(ChatRole::System, &format!("Failed to record instruction: {}", e));
                    }
                }
            }
            Command::Stop => match self.state {
                RuntimeState::NoCampaign => {
                    tracing::debug!("stop ignored: no campaign");
                }
                RuntimeState::Paused(_) => {
                    self.notifier.notify(ChatRole::System, "Campaign paused.");
                }
                RuntimeState::Running(id) => {
                    // 已完成的 Campaign 保留 Completed
                    if !self.idle {
                        if let Err(e) = self.controller.pause(id).await {
                            tracing::warn!(campaign = %id, "Failed to persist pause: {}", e);
                        }
                    }
                    self.set_state(self.state.on_stop());
                    self.notifier.notify(ChatRole::System, "Campaign paused.");
                }
            },
            Command::Resume => match self.state {
                RuntimeState::Paused(id) => {
                    if !self.idle {
                        if let Err(e) = self.controller.resume(id).await {
                            tracing::warn!(campaign = %id, "Failed to persist resume: {}", e);
                        }
                    }
                    self.set_state(self.state.on_resume());
                    self.notifier.notify(ChatRole::System, "Campaign resumed.");
                }
                _ => {
                    tracing::debug!(state = ?self.state, "resume ignored: not paused");
                }
            },
        }
    }

    /// 未暂停且无新命令时逐步推进；每步之后检查新命令，然后短暂让出
    async fn drain(&mut self) {
        while let RuntimeState::Running(id) = self.state {
            if self.idle || self.cancel.is_cancelled() {
                break;
            }

            match self.controller.execute_one_step(id).await {
                Ok(StepOutcome::Advanced) => {}
                Ok(StepOutcome::AwaitingInput) => {
                    self.set_state(RuntimeState::Paused(id));
                    break;
                }
                Ok(StepOutcome::Completed) => {
                    self.idle = true;
                    break;
                }
                Err(e) => {
                    self.fail_step(id, e).await;
                    break;
                }
            }

            if self.inbox.has_pending() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.step_yield) => {}
            }
        }
    }

    /// 步失败：叙述一次，停止推进该 Campaign，等同于隐式暂停
    async fn fail_step(&mut self, id: CampaignId, error: StepError) {
        tracing::error!(campaign = %id, "Step failed: {}", error);
        self.notifier
            .notify(ChatRole::System, &format!("Step failed: {}", error));
        if let Err(e) = self.controller.pause(id).await {
            tracing::warn!(campaign = %id, "Failed to persist pause after step failure: {}", e);
        }
        self.set_state(RuntimeState::Paused(id));
    }
}
