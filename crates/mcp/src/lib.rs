//! Threadmind MCP (Model Context Protocol) server
//!
//! Exposes the agent's tools (web search, page crawling, Slack conversation
//! reads) to any MCP client over stdio, so the same tool implementations
//! the Slack bot uses can be driven by an external agent.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rmcp::ServiceExt;
//! use threadmind_agent::ToolRegistry;
//! use threadmind_mcp::ThreadmindMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = ThreadmindMcpServer::new(Arc::new(ToolRegistry::default()));
//!     server.serve(rmcp::transport::stdio()).await?.waiting().await?;
//!     Ok(())
//! }
//! ```

mod server;

pub use server::{ThreadmindMcpServer, SERVER_NAME};

use thiserror::Error;

/// Errors raised while starting the MCP server.
#[derive(Debug, Error)]
pub enum McpSetupError {
    #[error(transparent)]
    Config(#[from] threadmind_core::config::ConfigError),

    #[error("slack client setup failed: {0}")]
    Slack(#[from] threadmind_slack::SlackApiError),

    #[error("tool setup failed: {0}")]
    Tool(#[from] threadmind_agent::ToolError),
}
