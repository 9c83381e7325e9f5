use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use threadmind_core::config::AgentConfig;
use threadmind_core::ReferenceArtifact;
use tracing::debug;

use super::{clean_title, parse_input, Tool, ToolError, ToolOutput};

pub const GOOGLE_SEARCH_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default)]
    num_results: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Web search through the Google Custom Search JSON API.
pub struct GoogleSearchTool {
    http: Client,
    base_url: String,
    api_key: SecretString,
    cse_id: String,
    num_results: u32,
}

impl GoogleSearchTool {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        cse_id: impl Into<String>,
        num_results: u32,
    ) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|error| ToolError::Http(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
            cse_id: cse_id.into(),
            // the API caps `num` at 10
            num_results: num_results.clamp(1, 10),
        })
    }

    /// `None` when the API key or engine id is missing.
    pub fn from_config(config: &AgentConfig) -> Result<Option<Self>, ToolError> {
        let (Some(api_key), Some(cse_id)) = (&config.google_api_key, &config.google_cse_id) else {
            return Ok(None);
        };
        Self::new(GOOGLE_SEARCH_BASE_URL, api_key.clone(), cse_id, config.google_search_num_results)
            .map(Some)
    }
}

#[async_trait]
impl Tool for GoogleSearchTool {
    fn name(&self) -> &'static str {
        "google_search"
    }

    fn description(&self) -> &'static str {
        "Search the web with Google and return result snippets with their links."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"},
                "num_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10,
                    "description": "How many results to return"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let SearchInput { query, num_results } = parse_input(input)?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".to_owned()));
        }

        let num = num_results.map_or(self.num_results, |n| n.clamp(1, 10)).to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("cx", self.cse_id.as_str()),
                ("q", query.trim()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|error| ToolError::Http(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!("google search returned status {status}")));
        }
        let body: SearchResponse =
            response.json().await.map_err(|error| ToolError::Http(error.to_string()))?;

        debug!(results = body.items.len(), "google search completed");
        let content =
            body.items.iter().map(|item| item.snippet.as_str()).collect::<Vec<_>>().join("\n");
        let artifacts = body
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .map(|item| ReferenceArtifact { title: clean_title(&item.title), link: item.link })
            .collect();

        Ok(ToolOutput { content, artifacts })
    }
}
