use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ordered, role-tagged messages produced by one agent invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub messages: Vec<TranscriptMessage>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptMessage {
    #[serde(alias = "user")]
    Human { content: MessageContent },
    #[serde(alias = "ai")]
    Assistant {
        content: MessageContent,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        name: String,
        content: MessageContent,
        /// Raw artifact entries. Kept loose so one malformed entry cannot
        /// reject the whole transcript.
        #[serde(
            default,
            alias = "artifact",
            deserialize_with = "lenient_artifacts",
            skip_serializing_if = "Vec::is_empty"
        )]
        artifacts: Vec<Value>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Items(Vec<ContentItem>),
}

/// Some model providers emit structured content lists; only plain strings are
/// rendered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentItem {
    Text(String),
    Unrecognized(Value),
}

impl Transcript {
    pub fn new(messages: Vec<TranscriptMessage>) -> Self {
        Self { messages }
    }

    pub fn last(&self) -> Option<&TranscriptMessage> {
        self.messages.last()
    }
}

impl TranscriptMessage {
    pub fn human(text: impl Into<String>) -> Self {
        Self::Human { content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { content: MessageContent::Text(text.into()), tool_calls: Vec::new() }
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>, artifacts: Vec<Value>) -> Self {
        Self::Tool { name: name.into(), content: MessageContent::Text(content.into()), artifacts }
    }

    pub fn content(&self) -> &MessageContent {
        match self {
            Self::Human { content } | Self::Assistant { content, .. } | Self::Tool { content, .. } => {
                content
            }
        }
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

fn lenient_artifacts<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}
