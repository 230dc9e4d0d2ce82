mod bootstrap;
mod cli_args;
mod cli_types;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use parley_session::{spawn_session, SpawnedSession};
use tracing::info;

use crate::bootstrap::init_tracing;
use crate::cli_args::Cli;
use crate::console::{run_console, CONSOLE_USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = cli.client_config();
    let SpawnedSession {
        handle,
        notices,
        task,
    } = spawn_session(&config).with_context(|| {
        format!("failed to start chat session against {}", config.server_base_url)
    })?;
    info!(
        server = %config.server_base_url,
        user_id = config.self_user_id,
        "chat session started"
    );

    if let Some(target_id) = cli.chat_with {
        handle
            .select_user(target_id)
            .context("failed to request initial conversation")?;
    }
    if let Some(conversation) = cli.group {
        handle
            .select_group(conversation)
            .context("failed to open initial group conversation")?;
    }
    println!("{CONSOLE_USAGE}");

    let console_result = run_console(&handle, notices).await;
    // runtime may already be gone if it stopped first
    let _ = handle.shutdown();
    task.await.context("session runtime task failed")?;
    console_result
}
