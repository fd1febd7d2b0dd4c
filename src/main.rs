//! Campaigner - 命令行入口
//!
//! 用法：`campaigner [config.toml]`。从标准输入逐行读取指令：
//! `/stop` 暂停，`/resume` 恢复，`/quit` 退出，其余内容作为用户指令提交。

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use campaigner::config::load_config;
use campaigner::core::{
    create_runner, run_with_graceful_shutdown, CampaignRunner, ShutdownManager, ShutdownReason,
};
use campaigner::notify::ChatMessage;
use campaigner::observability;
use tokio::sync::{broadcast, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let shutdown = Arc::new(ShutdownManager::new());
    let runner = Arc::new(
        create_runner(&config)
            .await
            .context("Failed to open campaign store")?
            .with_cancel_token(shutdown.token()),
    );

    let printer = tokio::spawn(print_messages(runner.subscribe()));
    runner.start();

    let repl = {
        let runner = runner.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = read_commands(&runner, &shutdown).await {
                tracing::error!("Input loop failed: {:#}", e);
            }
        }
    };

    let cleanup_runner = runner.clone();
    run_with_graceful_shutdown(shutdown, repl, || async move {
        cleanup_runner.shutdown();
        cleanup_runner.join().await;
    })
    .await;

    drop(runner);
    if tokio::time::timeout(std::time::Duration::from_secs(1), printer)
        .await
        .is_err()
    {
        tracing::debug!("Printer did not drain in time");
    }
    Ok(())
}

/// 标准输入在独立线程上阻塞读取，避免退出时被挂起的读操作卡住
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn read_commands(runner: &CampaignRunner, shutdown: &ShutdownManager) -> anyhow::Result<()> {
    let mut lines = spawn_stdin_reader();

    while let Some(line) = lines.recv().await {
        let line = line.context("Failed to read stdin")?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => {
                shutdown.shutdown(ShutdownReason::UserInitiated);
                return Ok(());
            }
            "/stop" => runner.stop()?,
            "/resume" => runner.resume()?,
            text => runner.send_user_message(text)?,
        }
    }

    shutdown.shutdown(ShutdownReason::InputClosed);
    Ok(())
}

async fn print_messages(mut rx: broadcast::Receiver<ChatMessage>) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let local = msg.timestamp.with_timezone(&chrono::Local);
                println!("[{}] {}: {}", local.format("%H:%M:%S"), msg.role, msg.content);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Printer lagged, {} messages dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
