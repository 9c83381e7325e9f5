//! User-facing strings and emoji names.
//!
//! Every string the bot posts is looked up by name so deployments can
//! localise or rephrase them from the `[messages]` and `[emojis]` config
//! tables without touching code.

use std::collections::BTreeMap;

pub const AI_REPLY_TOO_LONG_WARNING: &str = "ai_reply_too_long_warning_message";
pub const CONTENT_DISCLAIMER: &str = "content_disclaimer_message";
pub const TOOL_ARTIFACT_TITLE: &str = "tool_artifact_title";
pub const NEW_CONVERSATION_TITLE: &str = "new_conversation_title";
pub const NEW_CONVERSATION_MESSAGE: &str = "new_conversation_message";
pub const ASSISTANT_GREETING: &str = "assistant_greeting";
pub const ASSISTANT_THINKING: &str = "assistant_thinking";
pub const ASSISTANT_GREETING_PROMPT: &str = "assistant_greeting_prompt";

pub const AI_THINKING_EMOJI: &str = "ai_thinking";
const FALLBACK_TOOL_ICON: &str = "tool_artifact_icon";

const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (
        AI_REPLY_TOO_LONG_WARNING,
        "The reply was too long for Slack and has been truncated.",
    ),
    (
        CONTENT_DISCLAIMER,
        "Answers are AI-generated and may be inaccurate. Please verify important information.",
    ),
    (TOOL_ARTIFACT_TITLE, "References"),
    (NEW_CONVERSATION_TITLE, "Starting a new conversation"),
    (
        NEW_CONVERSATION_MESSAGE,
        "Earlier messages in this channel will not be used as context from here on.",
    ),
    (ASSISTANT_GREETING, "Hi! What can I help you with today?"),
    (ASSISTANT_THINKING, "is thinking..."),
    ("assistant_greeting_prompt_1_title", "Summarize a thread"),
    (
        "assistant_greeting_prompt_1_message",
        "Summarize this Slack thread for me: <paste thread link>",
    ),
    ("assistant_greeting_prompt_2_title", "Search the web"),
    ("assistant_greeting_prompt_2_message", "What are the latest updates on <topic>?"),
    ("assistant_greeting_prompt_3_title", "Read a page"),
    ("assistant_greeting_prompt_3_message", "Give me the key points of <paste page link>"),
    ("assistant_greeting_prompt_4_title", "Catch up on a channel"),
    (
        "assistant_greeting_prompt_4_message",
        "What has been discussed recently in <paste channel link>?",
    ),
    ("assistant_greeting_prompt_5_title", "Explain a concept"),
    ("assistant_greeting_prompt_5_message", "Explain <concept> with a short example."),
];

const DEFAULT_EMOJIS: &[(&str, &str)] = &[
    (AI_THINKING_EMOJI, ":thinking_face:"),
    (FALLBACK_TOOL_ICON, ":link:"),
    ("google_search_tool_artifact_icon", ":mag:"),
    ("page_crawler_tool_artifact_icon", ":spider_web:"),
    ("get_slack_conversation_replies_tool_artifact_icon", ":speech_balloon:"),
    ("get_slack_conversation_history_tool_artifact_icon", ":scroll:"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageCatalog {
    messages: BTreeMap<String, String>,
    emojis: BTreeMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        let collect = |pairs: &[(&str, &str)]| {
            pairs.iter().map(|(name, text)| (name.to_string(), text.to_string())).collect()
        };
        Self { messages: collect(DEFAULT_MESSAGES), emojis: collect(DEFAULT_EMOJIS) }
    }
}

impl MessageCatalog {
    pub fn with_overrides(
        mut self,
        messages: &BTreeMap<String, String>,
        emojis: &BTreeMap<String, String>,
    ) -> Self {
        self.messages.extend(messages.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.emojis.extend(emojis.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Looks up a message by name. Unknown names render as the name itself so
    /// a missing entry is visible in Slack instead of failing the reply.
    pub fn message<'a>(&'a self, name: &'a str) -> &'a str {
        self.messages.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn emoji<'a>(&'a self, name: &'a str) -> &'a str {
        self.emojis.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn tool_icon(&self, tool_name: &str) -> &str {
        self.emojis
            .get(&format!("{tool_name}_tool_artifact_icon"))
            .or_else(|| self.emojis.get(FALLBACK_TOOL_ICON))
            .map(String::as_str)
            .unwrap_or(":link:")
    }

    /// Groups `{prefix}_{n}_{field}` entries by `n`, ordered numerically.
    pub fn message_groups(&self, prefix: &str) -> Vec<BTreeMap<String, String>> {
        let mut groups: BTreeMap<u32, BTreeMap<String, String>> = BTreeMap::new();
        let head = format!("{prefix}_");

        for (name, text) in &self.messages {
            let Some(rest) = name.strip_prefix(&head) else {
                continue;
            };
            let Some((index, field)) = rest.split_once('_') else {
                continue;
            };
            let Ok(index) = index.parse::<u32>() else {
                continue;
            };
            if field.is_empty() {
                continue;
            }
            groups.entry(index).or_default().insert(field.to_string(), text.clone());
        }

        groups.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{MessageCatalog, ASSISTANT_GREETING_PROMPT, TOOL_ARTIFACT_TITLE};

    #[test]
    fn overrides_replace_defaults_and_keep_the_rest() {
        let messages = BTreeMap::from([(TOOL_ARTIFACT_TITLE.to_string(), "Sources".to_string())]);
        let emojis =
            BTreeMap::from([("ai_thinking".to_string(), ":hourglass_flowing_sand:".to_string())]);
        let catalog = MessageCatalog::default().with_overrides(&messages, &emojis);

        assert_eq!(catalog.message(TOOL_ARTIFACT_TITLE), "Sources");
        assert_eq!(catalog.emoji("ai_thinking"), ":hourglass_flowing_sand:");
        assert_eq!(catalog.message("new_conversation_title"), "Starting a new conversation");
    }

    #[test]
    fn unknown_message_renders_its_name() {
        let catalog = MessageCatalog::default();
        assert_eq!(catalog.message("no_such_message"), "no_such_message");
    }

    #[test]
    fn tool_icon_falls_back_to_generic_link() {
        let catalog = MessageCatalog::default();
        assert_eq!(catalog.tool_icon("google_search"), ":mag:");
        assert_eq!(catalog.tool_icon("calculator"), ":link:");
    }

    #[test]
    fn message_groups_are_ordered_by_numeric_index() {
        let messages = BTreeMap::from([
            ("assistant_greeting_prompt_10_title".to_string(), "Tenth".to_string()),
            ("assistant_greeting_prompt_10_message".to_string(), "tenth message".to_string()),
            ("assistant_greeting_prompt_x_title".to_string(), "ignored".to_string()),
        ]);
        let catalog = MessageCatalog::default().with_overrides(&messages, &BTreeMap::new());

        let groups = catalog.message_groups(ASSISTANT_GREETING_PROMPT);
        assert_eq!(groups.len(), 6);
        assert_eq!(groups[0]["title"], "Summarize a thread");
        assert_eq!(groups[5]["title"], "Tenth");
        assert_eq!(groups[5]["message"], "tenth message");
    }
}
