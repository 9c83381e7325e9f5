//! The agent boundary of threadmind.
//!
//! The language model lives behind an HTTP service; this crate sends it a
//! Slack message plus run context and turns the transcript it returns into
//! reply text and references. It also hosts the tools the agent (and the MCP
//! server) can call:
//!
//! - `google_search`: web search snippets, one artifact per result
//! - `page_crawler`: a page as markdown
//! - `get_slack_conversation_replies` / `get_slack_conversation_history`:
//!   Slack threads and channels rendered as text

pub mod runner;
pub mod runtime;
pub mod tools;

pub use runner::{AgentError, AgentRunner, EchoAgentRunner, HttpAgentRunner};
pub use runtime::{AgentReply, AgentRuntime};
pub use tools::{Tool, ToolError, ToolOutput, ToolRegistry};
