use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::client::{HistoryPage, SlackApi, SlackApiError, SlackMessage};
use crate::retry::RateLimitRetry;

const ATTACHMENT_KEYS: [&str; 4] = ["service_name", "title", "title_link", "text"];

/// Paginated, rate-limit aware reads of channel history and thread replies.
#[derive(Clone)]
pub struct ConversationReader {
    api: Arc<dyn SlackApi>,
    retry: RateLimitRetry,
    replies_page_size: u32,
}

impl ConversationReader {
    pub fn new(api: Arc<dyn SlackApi>, retry: RateLimitRetry, replies_page_size: u32) -> Self {
        Self { api, retry, replies_page_size: replies_page_size.max(1) }
    }

    pub fn api(&self) -> &Arc<dyn SlackApi> {
        &self.api
    }

    /// Fetches up to `page_limit` pages of `page_size` messages, newest
    /// first. `None` fetches a single page.
    pub async fn history(
        &self,
        channel: &str,
        page_limit: Option<u32>,
        page_size: u32,
    ) -> Result<Vec<HistoryPage>, SlackApiError> {
        let page_limit = page_limit.unwrap_or(1).max(1);
        let mut pages: Vec<HistoryPage> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("conversations.history", || {
                    self.api.conversations_history(channel, cursor.as_deref(), page_size)
                })
                .await?;
            info!(
                channel_id = channel,
                page = pages.len() + 1,
                messages = page.messages.len(),
                has_more = page.has_more,
                "fetched conversations history page"
            );

            cursor = page.next_cursor().map(str::to_owned);
            let has_more = page.has_more;
            pages.push(page);

            if !has_more || cursor.is_none() || pages.len() as u32 >= page_limit {
                break;
            }
        }

        Ok(pages)
    }

    /// Fetches every reply in a thread, optionally truncated to `limit`.
    pub async fn replies(
        &self,
        channel: &str,
        ts: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        info!(channel_id = channel, ts, "fetching conversations replies");
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("conversations.replies", || {
                    self.api.conversations_replies(
                        channel,
                        ts,
                        cursor.as_deref(),
                        self.replies_page_size,
                    )
                })
                .await?;

            cursor = page.next_cursor().map(str::to_owned);
            let has_more = page.has_more;
            messages.extend(page.messages);

            if !has_more || cursor.is_none() {
                break;
            }
        }

        debug!(channel_id = channel, ts, replies = messages.len(), "fetched conversations replies");
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }
}

/// Renders a Slack message as plain text for agent context.
pub fn message_to_text(message: &SlackMessage) -> String {
    let is_bot_post = message.subtype.as_deref() == Some("bot_message");
    let mut content = if is_bot_post {
        format!(
            "Post Author:\n{}\n\nPost:\n{}",
            message.username.as_deref().unwrap_or("unknown"),
            message.text
        )
    } else {
        format!(
            "User:\n<@{}>\n\nMessage:\n{}",
            message.user.as_deref().unwrap_or("unknown"),
            message.text
        )
    };

    let prefix = if is_bot_post { "> " } else { "" };
    let attachments: Vec<String> = message
        .attachments
        .iter()
        .map(|attachment| render_attachment(attachment, prefix))
        .filter(|rendered| !rendered.is_empty())
        .collect();
    if !attachments.is_empty() {
        content.push_str("\n\nAttachments:\n");
        content.push_str(&attachments.join("\n\n"));
    }

    content
}

fn render_attachment(attachment: &Value, prefix: &str) -> String {
    ATTACHMENT_KEYS
        .iter()
        .filter_map(|key| {
            let value = attachment.get(*key)?;
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some(format!("{prefix}{key}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
