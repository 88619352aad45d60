use std::sync::Arc;

use anyhow::Context;

use mcp_polling_server::config::{ServerConfig, ServerMode};
use mcp_polling_server::dispatch::{Dispatcher, PromptPool, spawn_liveness_monitor};
use mcp_polling_server::mcp::McpServer;
use mcp_polling_server::tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol; logs go to stderr
    let (log_writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_writer)
        .init();

    let config = ServerConfig::from_env_and_args().context("invalid configuration")?;
    let prompts = config.load_prompts()?;

    let dispatcher = Dispatcher::new(config.clone(), PromptPool::new(prompts));
    let tools = Arc::new(ToolRegistry::new());

    let monitor = match config.mode {
        ServerMode::Tasks => {
            tools.register_worker_tools(Arc::clone(&dispatcher));
            Some(spawn_liveness_monitor(
                Arc::clone(&dispatcher),
                config.monitor_interval,
            ))
        }
        ServerMode::Jobs => {
            tools.register_job_tools(Arc::clone(&dispatcher));
            None
        }
    };

    eprintln!(
        "MCP Polling Server running on stdio with {}s timeout",
        config.timeout.as_secs()
    );
    tracing::info!(
        mode = %config.mode,
        tools = tools.count(),
        poll_interval_ms = config.effective_poll_interval().as_millis() as u64,
        "Server ready"
    );

    let server = McpServer::new(tools);
    let result = server.run_stdio().await;

    if let Some(handle) = monitor {
        handle.abort();
    }

    result.context("stdio transport failed")?;
    Ok(())
}
