//! Tools the agent calls. Each returns text for the model plus artifacts,
//! the `{title, link}` citations that end up as references under a reply.

pub mod google_search;
pub mod page_crawler;
pub mod slack_conversation;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use threadmind_core::config::AgentConfig;
use threadmind_core::{ReferenceArtifact, TranscriptMessage};
use threadmind_slack::urls::SlackUrlError;
use threadmind_slack::{ConversationReader, SlackApiError};
use tracing::{info, warn};

pub use google_search::GoogleSearchTool;
pub use page_crawler::PageCrawlerTool;
pub use slack_conversation::{SlackConversationHistoryTool, SlackConversationRepliesTool};

const TITLE_NOISE: &[char] = &['|', '&', '/', '<', '>', '"', '\'', '\\', '\n'];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("tool `{0}` is not configured")]
    NotConfigured(&'static str),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("http request failed: {0}")]
    Http(String),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    SlackUrl(#[from] SlackUrlError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub artifacts: Vec<ReferenceArtifact>,
}

impl ToolOutput {
    /// The tool message an agent transcript records for this output.
    pub fn into_message(self, tool_name: &str) -> TranscriptMessage {
        let artifacts = self
            .artifacts
            .iter()
            .filter_map(|artifact| serde_json::to_value(artifact).ok())
            .collect();
        TranscriptMessage::tool(tool_name, self.content, artifacts)
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the `execute` input.
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|error| ToolError::InvalidInput(error.to_string()))
}

/// Strips characters that break Slack link markup out of a title.
pub fn clean_title(title: &str) -> String {
    title.chars().filter(|ch| !TITLE_NOISE.contains(ch)).collect()
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Every tool the configuration allows. Google search is left out when
    /// its credentials are missing.
    pub fn from_config(config: &AgentConfig, reader: ConversationReader) -> Result<Self, ToolError> {
        let mut registry = Self::default();
        match GoogleSearchTool::from_config(config)? {
            Some(search) => registry.register(search),
            None => warn!("google search credentials missing; google_search tool disabled"),
        }
        registry.register(PageCrawlerTool::new(config.crawler_max_chars)?);
        registry.register(SlackConversationRepliesTool::new(reader.clone()));
        registry.register(SlackConversationHistoryTool::new(reader));
        info!(tools = ?registry.names(), "tool registry ready");
        Ok(registry)
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;
        tool.execute(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
