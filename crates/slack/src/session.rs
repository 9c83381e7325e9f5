use tracing::debug;

use crate::client::{SlackApiError, SlackMessage};
use crate::conversations::ConversationReader;
use crate::events::MessageEvent;

/// Maps Slack conversations onto agent memory threads.
///
/// The session id is never stored by the bot itself: every reply carries it
/// in `metadata.event_payload.reply_session_id`, and it is read back from
/// Slack history on the next event.
#[derive(Clone)]
pub struct SessionResolver {
    reader: ConversationReader,
    history_page_size: u32,
}

impl SessionResolver {
    pub fn new(reader: ConversationReader, history_page_size: u32) -> Self {
        Self { reader, history_page_size: history_page_size.max(1) }
    }

    pub fn reader(&self) -> &ConversationReader {
        &self.reader
    }

    /// Thread events take the first client message id of the thread. Channel
    /// events continue the most recent session found in recent history. Both
    /// fall back to the event's own message id.
    pub async fn find_session_id(
        &self,
        event: &MessageEvent,
        in_replies: bool,
    ) -> Result<String, SlackApiError> {
        let recovered = match event.thread_ts.as_deref().filter(|_| in_replies) {
            Some(thread_ts) => {
                let replies = self.reader.replies(&event.channel_id, thread_ts, None).await?;
                first_client_message_id(&replies)
            }
            None => {
                let pages = self
                    .reader
                    .history(&event.channel_id, Some(1), self.history_page_size)
                    .await?;
                let messages = pages.first().map(|page| page.messages.as_slice()).unwrap_or_default();
                latest_session_id(messages)
            }
        };

        let session_id = match recovered {
            Some(session_id) => session_id,
            None => event.message_id().to_owned(),
        };
        debug!(
            channel_id = %event.channel_id,
            message_id = event.message_id(),
            session_id = %session_id,
            in_replies,
            "session resolved"
        );
        Ok(session_id)
    }
}

fn first_client_message_id(replies: &[SlackMessage]) -> Option<String> {
    replies.iter().find_map(|reply| reply.client_msg_id.clone())
}

/// Scans history newest first and returns the most recent session id. The
/// scan stops at the first message that belongs to a different session.
fn latest_session_id(messages: &[SlackMessage]) -> Option<String> {
    let mut found: Option<&str> = None;

    for message in messages {
        if message.subtype.is_some() || message.text.trim().is_empty() {
            continue;
        }
        let Some(current) = message.reply_session_id() else {
            continue;
        };
        match found {
            None => found = Some(current),
            Some(session_id) if session_id != current => break,
            Some(_) => {}
        }
    }

    found.map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::SessionResolver;
    use crate::client::{SlackApiError, SlackMessage};
    use crate::conversations::ConversationReader;
    use crate::events::MessageEvent;
    use crate::retry::RateLimitRetry;
    use crate::testing::{bot_reply, user_message, RecordedCall, ScriptedSlackApi};

    fn resolver(api: Arc<ScriptedSlackApi>) -> SessionResolver {
        let retry =
            RateLimitRetry { base_delay_ms: 0, max_delay_ms: 0, max_elapsed: Duration::from_secs(5) };
        SessionResolver::new(ConversationReader::new(api, retry, 2), 30)
    }

    fn event(thread_ts: Option<&str>) -> MessageEvent {
        MessageEvent {
            channel_id: "C1".to_owned(),
            user_id: Some("U1".to_owned()),
            text: "next question".to_owned(),
            ts: "1700000100.000000".to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
            client_msg_id: Some("m-new".to_owned()),
            ..MessageEvent::default()
        }
    }

    #[tokio::test]
    async fn thread_events_use_the_first_client_message_id_across_pages() {
        let api = Arc::new(ScriptedSlackApi::default().with_replies(
            "C1",
            "1700000000.000000",
            vec![
                SlackMessage { ts: "1700000000.000000".to_owned(), text: "bot post".to_owned(), ..SlackMessage::default() },
                bot_reply("1700000001.000000", "intro", "x", "x"),
                user_message("U1", "1700000002.000000", "first", "m-root"),
                user_message("U2", "1700000003.000000", "second", "m-other"),
            ],
        ));

        let session = resolver(api.clone())
            .find_session_id(&event(Some("1700000000.000000")), true)
            .await
            .expect("session");

        assert_eq!(session, "m-root");
        let replies_calls = api
            .calls()
            .into_iter()
            .filter(|call| matches!(call, RecordedCall::Replies { .. }))
            .count();
        assert_eq!(replies_calls, 2);
    }

    #[tokio::test]
    async fn channel_events_continue_the_latest_session_and_stop_at_the_boundary() {
        let mut joined = user_message("U3", "1700000060.000000", "joined", "m-join");
        joined.subtype = Some("channel_join".to_owned());
        let api = Arc::new(ScriptedSlackApi::default().with_history(
            "C1",
            vec![
                joined,
                user_message("U1", "1700000050.000000", "thanks", "m-5"),
                bot_reply("1700000040.000000", "answer two", "m-4", "s-2"),
                bot_reply("1700000030.000000", "answer one", "m-3", "s-2"),
                bot_reply("1700000020.000000", "older", "m-2", "s-1"),
                bot_reply("1700000010.000000", "oldest", "m-1", "s-2"),
            ],
        ));

        let session = resolver(api.clone()).find_session_id(&event(None), false).await.expect("session");

        assert_eq!(session, "s-2");
        assert_eq!(
            api.calls(),
            vec![RecordedCall::History { channel: "C1".to_owned(), cursor: None, limit: 30 }]
        );
    }

    #[tokio::test]
    async fn thread_without_replies_in_reply_mode_falls_back_to_history() {
        let api = Arc::new(ScriptedSlackApi::default().with_history(
            "C1",
            vec![bot_reply("1700000040.000000", "answer", "m-4", "s-9")],
        ));

        let session = resolver(api).find_session_id(&event(None), true).await.expect("session");
        assert_eq!(session, "s-9");
    }

    #[tokio::test]
    async fn nothing_recoverable_falls_back_to_the_event_message_id() {
        let api = Arc::new(ScriptedSlackApi::default());
        let resolver = resolver(api);

        assert_eq!(resolver.find_session_id(&event(None), false).await.expect("session"), "m-new");
        assert_eq!(
            resolver.find_session_id(&event(Some("1.0")), true).await.expect("session"),
            "m-new"
        );

        let mut api_post = event(None);
        api_post.client_msg_id = None;
        assert_eq!(
            resolver.find_session_id(&api_post, false).await.expect("session"),
            "1700000100.000000"
        );
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let api = Arc::new(ScriptedSlackApi::default().with_history(
            "C1",
            vec![
                bot_reply("1700000040.000000", "answer", "m-4", "s-7"),
                bot_reply("1700000030.000000", "answer", "m-3", "s-6"),
            ],
        ));
        let resolver = resolver(api);

        let first = resolver.find_session_id(&event(None), false).await.expect("session");
        let second = resolver.find_session_id(&event(None), false).await.expect("session");
        assert_eq!(first, "s-7");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn rate_limits_are_retried_and_other_errors_propagate() {
        let api = Arc::new(ScriptedSlackApi::default().with_history(
            "C1",
            vec![bot_reply("1700000040.000000", "answer", "m-4", "s-3")],
        ));
        api.fail_next(SlackApiError::RateLimited {
            method: "conversations.history".to_owned(),
            retry_after: None,
        });
        let resolver = resolver(api.clone());
        assert_eq!(resolver.find_session_id(&event(None), false).await.expect("session"), "s-3");

        api.fail_next(SlackApiError::Api {
            method: "conversations.history".to_owned(),
            error: "not_in_channel".to_owned(),
        });
        let error = resolver.find_session_id(&event(None), false).await.expect_err("api error");
        assert!(matches!(error, SlackApiError::Api { .. }));
    }
}
