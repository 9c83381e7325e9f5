//! Threadmind MCP server binary
//!
//! ## Usage
//!
//! ```bash
//! # Uses threadmind.toml (or THREADMIND_* env vars) for Slack and Google credentials
//! threadmind-mcp
//!
//! # Explicit config file
//! threadmind-mcp config/threadmind.toml
//! ```
//!
//! stdout carries the protocol, so logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use threadmind_agent::ToolRegistry;
use threadmind_core::config::{AppConfig, LoadOptions};
use threadmind_mcp::{McpSetupError, ThreadmindMcpServer};
use threadmind_slack::{ConversationReader, RateLimitRetry, SlackWebClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        ..LoadOptions::default()
    })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting threadmind MCP server");
    let registry = build_registry(&config)?;
    let server = ThreadmindMcpServer::new(Arc::new(registry));

    let service = server.serve(rmcp::transport::stdio()).await?;
    let reason = service.waiting().await?;
    info!(?reason, "MCP server shutdown complete");
    Ok(())
}

fn build_registry(config: &AppConfig) -> Result<ToolRegistry, McpSetupError> {
    let api = Arc::new(SlackWebClient::from_config(&config.slack)?);
    let retry = RateLimitRetry::with_max_elapsed_secs(config.slack.rate_limit_max_elapsed_secs);
    let reader = ConversationReader::new(api, retry, config.slack.replies_page_size);
    Ok(ToolRegistry::from_config(&config.agent, reader)?)
}
