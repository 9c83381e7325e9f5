use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use threadmind_core::ReferenceArtifact;
use threadmind_slack::urls::{parse_channel_url, parse_thread_url};
use threadmind_slack::{message_to_text, ConversationReader, SlackMessage};
use tracing::debug;

use super::{clean_title, parse_input, Tool, ToolError, ToolOutput};

const MESSAGE_SEPARATOR: &str = "\n\n---\n\n";
const FALLBACK_TITLE: &str = "Slack conversation";
const MAX_TITLE_CHARS: usize = 80;
const DEFAULT_HISTORY_LIMIT: u32 = 30;
const MAX_HISTORY_LIMIT: u32 = 200;

#[derive(Deserialize)]
struct RepliesInput {
    url: String,
    #[serde(default)]
    single_message: Option<bool>,
}

#[derive(Deserialize)]
struct HistoryInput {
    url: String,
    #[serde(default)]
    limit: Option<u32>,
}

/// Reads a thread (or a single message) from a Slack permalink.
pub struct SlackConversationRepliesTool {
    reader: ConversationReader,
}

impl SlackConversationRepliesTool {
    pub fn new(reader: ConversationReader) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Tool for SlackConversationRepliesTool {
    fn name(&self) -> &'static str {
        "get_slack_conversation_replies"
    }

    fn description(&self) -> &'static str {
        "Read the messages of a Slack thread from its permalink. Set single_message to read only the linked message."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Slack message or thread permalink"},
                "single_message": {
                    "type": "boolean",
                    "description": "Read only the linked message instead of the whole thread"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let RepliesInput { url, single_message } = parse_input(input)?;
        let location = parse_thread_url(url.trim())?;
        let ts = location.target_ts(!single_message.unwrap_or(false));

        let replies = self.reader.replies(&location.channel_id, ts, None).await?;
        let messages: Vec<&SlackMessage> = replies.iter().filter(|reply| is_message(reply)).collect();
        debug!(channel_id = %location.channel_id, ts, messages = messages.len(), "read slack thread");

        let title = messages
            .first()
            .and_then(|message| summary_title(&message.text))
            .unwrap_or_else(|| FALLBACK_TITLE.to_owned());
        Ok(ToolOutput {
            content: render(messages),
            artifacts: vec![ReferenceArtifact { title, link: url.trim().to_owned() }],
        })
    }
}

/// Reads the recent messages of a channel, oldest first.
pub struct SlackConversationHistoryTool {
    reader: ConversationReader,
}

impl SlackConversationHistoryTool {
    pub fn new(reader: ConversationReader) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Tool for SlackConversationHistoryTool {
    fn name(&self) -> &'static str {
        "get_slack_conversation_history"
    }

    fn description(&self) -> &'static str {
        "Read the most recent messages of a Slack channel from its URL."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Slack channel URL"},
                "limit": {"type": "integer", "minimum": 1, "maximum": 200}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let HistoryInput { url, limit } = parse_input(input)?;
        let channel_id = parse_channel_url(url.trim())?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);

        let pages = self.reader.history(&channel_id, Some(1), limit).await?;
        let mut messages: Vec<&SlackMessage> = pages
            .iter()
            .flat_map(|page| page.messages.iter())
            .filter(|message| is_message(message))
            .collect();
        // history arrives newest first
        messages.reverse();
        debug!(channel_id = %channel_id, messages = messages.len(), "read slack channel history");

        Ok(ToolOutput {
            content: render(messages),
            artifacts: vec![ReferenceArtifact {
                title: format!("Recent messages in {channel_id}"),
                link: url.trim().to_owned(),
            }],
        })
    }
}

fn is_message(message: &SlackMessage) -> bool {
    message.message_type.is_empty() || message.message_type == "message"
}

fn render(messages: Vec<&SlackMessage>) -> String {
    messages.into_iter().map(message_to_text).collect::<Vec<_>>().join(MESSAGE_SEPARATOR)
}

fn summary_title(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty())?;
    let title: String = clean_title(line).chars().take(MAX_TITLE_CHARS).collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use threadmind_slack::testing::{bot_reply, user_message, RecordedCall, ScriptedSlackApi};
    use threadmind_slack::{ConversationReader, RateLimitRetry, SlackMessage};

    use super::{summary_title, SlackConversationHistoryTool, SlackConversationRepliesTool};
    use crate::tools::{Tool, ToolError};

    const THREAD_URL: &str =
        "https://acme.slack.com/archives/C1/p1700000002000000?thread_ts=1700000001.000000&cid=C1";

    fn reader(api: Arc<ScriptedSlackApi>) -> ConversationReader {
        let retry =
            RateLimitRetry { base_delay_ms: 0, max_delay_ms: 0, max_elapsed: Duration::from_secs(1) };
        ConversationReader::new(api, retry, 100)
    }

    #[tokio::test]
    async fn replies_render_the_whole_thread_by_default() {
        let join = SlackMessage {
            message_type: "channel_join".to_owned(),
            ts: "1700000001.500000".to_owned(),
            text: "joined".to_owned(),
            ..SlackMessage::default()
        };
        let api = Arc::new(ScriptedSlackApi::default().with_replies(
            "C1",
            "1700000001.000000",
            vec![
                user_message("U1", "1700000001.000000", "Deploy is failing\nlogs attached", "m-1"),
                join,
                bot_reply("1700000002.000000", "Try a rollback", "m-1", "m-1"),
            ],
        ));

        let tool = SlackConversationRepliesTool::new(reader(api.clone()));
        let output = tool.execute(json!({"url": THREAD_URL})).await.expect("replies");

        let parts: Vec<&str> = output.content.split("\n\n---\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].starts_with("User:\n<@U1>"));
        assert!(parts[1].contains("Try a rollback"));
        assert_eq!(output.artifacts[0].title, "Deploy is failing");
        assert_eq!(output.artifacts[0].link, THREAD_URL);
        assert!(matches!(
            &api.calls()[0],
            RecordedCall::Replies { channel, ts, .. } if channel == "C1" && ts == "1700000001.000000"
        ));
    }

    #[tokio::test]
    async fn single_message_reads_only_the_linked_message() {
        let api = Arc::new(ScriptedSlackApi::default().with_replies(
            "C1",
            "1700000002.000000",
            vec![user_message("U2", "1700000002.000000", "", "m-2")],
        ));

        let tool = SlackConversationRepliesTool::new(reader(api));
        let output = tool
            .execute(json!({"url": THREAD_URL, "single_message": true}))
            .await
            .expect("replies");

        assert!(output.content.starts_with("User:\n<@U2>"));
        assert_eq!(output.artifacts[0].title, "Slack conversation");
    }

    #[tokio::test]
    async fn invalid_urls_are_rejected() {
        let tool = SlackConversationRepliesTool::new(reader(Arc::new(ScriptedSlackApi::default())));
        let error = tool.execute(json!({"url": "https://example.com/x"})).await.expect_err("bad url");
        assert!(matches!(error, ToolError::SlackUrl(_)));
    }

    #[tokio::test]
    async fn history_is_rendered_oldest_first() {
        let api = Arc::new(ScriptedSlackApi::default().with_history(
            "C9",
            vec![
                user_message("U2", "1700000020.000000", "second", "m-2"),
                user_message("U1", "1700000010.000000", "first", "m-1"),
            ],
        ));

        let tool = SlackConversationHistoryTool::new(reader(api.clone()));
        let output = tool
            .execute(json!({"url": "https://acme.slack.com/archives/C9", "limit": 5}))
            .await
            .expect("history");

        let first = output.content.find("first").expect("first message");
        let second = output.content.find("second").expect("second message");
        assert!(first < second);
        assert_eq!(output.artifacts[0].title, "Recent messages in C9");
        assert_eq!(
            api.calls(),
            vec![RecordedCall::History { channel: "C9".to_owned(), cursor: None, limit: 5 }]
        );
    }

    #[test]
    fn summary_titles_use_the_first_non_blank_line() {
        assert_eq!(summary_title("\n  <b>Q&A</b> time \nmore").as_deref(), Some("bQAb time"));
        assert_eq!(summary_title("   "), None);
        assert_eq!(summary_title(&"x".repeat(200)).map(|title| title.len()), Some(80));
    }
}
