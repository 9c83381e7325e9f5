//! MCP server implementation
//!
//! Tools are listed straight from the [`ToolRegistry`], so whatever the
//! configuration enables for the bot is what MCP clients see.

use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer};
use serde_json::Value;
use threadmind_agent::{ToolError, ToolRegistry};
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "threadmind-mcp";

const INSTRUCTIONS: &str = "Threadmind tools for answering questions in Slack. \
    Use google_search and page_crawler for the web, get_slack_conversation_replies to read a \
    thread from its permalink and get_slack_conversation_history for recent channel messages. \
    Every result carries a JSON list of {title, link} artifacts to cite.";

#[derive(Clone)]
pub struct ThreadmindMcpServer {
    registry: Arc<ToolRegistry>,
}

impl ThreadmindMcpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        info!(tools = registry.len(), "initializing threadmind MCP server");
        Self { registry }
    }

    /// MCP descriptors for every registered tool, in name order.
    pub fn tools(&self) -> Vec<Tool> {
        self.registry
            .names()
            .into_iter()
            .filter_map(|name| self.registry.get(name))
            .map(|tool| {
                let schema = match tool.input_schema() {
                    Value::Object(schema) => schema,
                    _ => JsonObject::new(),
                };
                Tool::new(tool.name(), tool.description(), Arc::new(schema))
            })
            .collect()
    }

    /// Runs one tool. Failures inside the tool come back as an error result
    /// the client can show; only an unknown tool name is a protocol error.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let input = Value::Object(arguments.unwrap_or_default());
        debug!(tool = name, "mcp tool call");

        match self.registry.execute(name, input).await {
            Ok(output) => Ok(CallToolResult::success(vec![
                Content::text(output.content),
                Content::json(&output.artifacts)?,
            ])),
            Err(ToolError::UnknownTool(name)) => {
                Err(McpError::invalid_params(format!("unknown tool `{name}`"), None))
            }
            Err(error) => {
                warn!(tool = name, error = %error, "mcp tool call failed");
                Ok(CallToolResult::error(vec![Content::text(error.to_string())]))
            }
        }
    }
}

impl ServerHandler for ThreadmindMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_owned()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call(&request.name, request.arguments).await
    }
}
