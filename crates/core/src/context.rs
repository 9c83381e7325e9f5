use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Per-invocation configuration handed to the agent service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub context: String,
    pub slack_conversation_agent_context: String,
    pub metadata: RunMetadata,
    /// Agent memory thread; equal to the resolved session id.
    pub thread_id: Option<String>,
    pub tags: Vec<String>,
    pub run_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub user_id: String,
    pub message_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ContextParams {
    pub bot_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub channel_url: String,
    pub conversation_url: String,
    pub event_type: String,
    pub message_id: Option<String>,
    pub session_id: Option<String>,
    pub now: DateTime<Utc>,
    /// Rendered thread messages, included when the caller fetched them.
    pub conversation: Option<Vec<String>>,
}

impl RunContext {
    pub fn build(params: ContextParams) -> Self {
        let now = params.now.to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut context = format!(
            "- Your name is <@{bot}> .\n\
             - User <@{user}> is asking you question.\n\
             - Current slack channel id is <#{channel}|> .\n\
             - Current slack channel url is {channel_url} .\n\
             - Current slack conversation url is {conversation_url} .\n\
             - Current time is {now} .",
            bot = params.bot_id,
            user = params.user_id,
            channel = params.channel_id,
            channel_url = params.channel_url,
            conversation_url = params.conversation_url,
        );

        if let Some(conversation) = &params.conversation {
            context.push_str("\n- Current slack conversations are as follows:");
            for message in conversation {
                context.push_str("\n<slack_conversation>\n");
                context.push_str(message);
                context.push_str("\n</slack_conversation>");
            }
        }

        let slack_conversation_agent_context = format!(
            "- Current slack channel id is <#{channel}|> .\n\
             - Current slack channel url is {channel_url} .\n\
             - Current slack conversation url is {conversation_url} .",
            channel = params.channel_id,
            channel_url = params.channel_url,
            conversation_url = params.conversation_url,
        );

        Self {
            context,
            slack_conversation_agent_context,
            metadata: RunMetadata {
                user_id: params.user_id,
                message_id: params.message_id.clone(),
                session_id: params.session_id.clone(),
            },
            thread_id: params.session_id,
            tags: vec!["slack".to_string(), params.event_type],
            run_id: params.message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{ContextParams, RunContext};

    fn params() -> ContextParams {
        ContextParams {
            bot_id: "UBOT".to_string(),
            user_id: "U123".to_string(),
            channel_id: "C123".to_string(),
            channel_url: "https://acme.slack.com/archives/C123".to_string(),
            conversation_url: "https://acme.slack.com/archives/C123/p1700000000000100".to_string(),
            event_type: "message".to_string(),
            message_id: Some("msg-1".to_string()),
            session_id: Some("session-1".to_string()),
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single().expect("valid timestamp"),
            conversation: None,
        }
    }

    #[test]
    fn context_carries_identity_and_memory_thread() {
        let context = RunContext::build(params());

        assert!(context.context.contains("Your name is <@UBOT> ."));
        assert!(context.context.contains("User <@U123> is asking"));
        assert!(context.context.contains("Current time is 2024-05-01T12:30:00.000000Z ."));
        assert!(!context.context.contains("<slack_conversation>"));
        assert_eq!(context.thread_id.as_deref(), Some("session-1"));
        assert_eq!(context.run_id.as_deref(), Some("msg-1"));
        assert_eq!(context.tags, vec!["slack".to_string(), "message".to_string()]);
        assert_eq!(context.metadata.user_id, "U123");
        assert!(context
            .slack_conversation_agent_context
            .contains("https://acme.slack.com/archives/C123/p1700000000000100"));
    }

    #[test]
    fn fetched_conversation_is_appended() {
        let mut params = params();
        params.conversation = Some(vec!["User:\n<@U1>\n\nMessage:\nhello".to_string()]);

        let context = RunContext::build(params);
        assert!(context.context.contains("Current slack conversations are as follows:"));
        assert!(context.context.contains("<slack_conversation>\nUser:\n<@U1>"));
    }
}
