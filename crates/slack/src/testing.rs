//! In-memory [`SlackApi`] for tests of code that talks to Slack.
//!
//! Channel history and thread replies are served from fixed message lists
//! with offset cursors, so repeated reads of the same state return the same
//! pages. Every call is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::json;

use crate::client::{
    AuthIdentity, HistoryPage, PostMessage, PostedMessage, ResponseMetadata, SlackApi,
    SlackApiError, SlackMessage, SuggestedPrompt,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCall {
    History { channel: String, cursor: Option<String>, limit: u32 },
    Replies { channel: String, ts: String, cursor: Option<String>, limit: u32 },
    ReactionAdd { channel: String, ts: String, name: String },
    ReactionRemove { channel: String, ts: String, name: String },
    PostMessage(PostMessage),
    SetStatus { channel: String, thread_ts: String, status: String },
    SuggestedPrompts { channel: String, thread_ts: String, prompts: Vec<SuggestedPrompt> },
    AuthTest,
    ConnectionsOpen,
}

#[derive(Default)]
pub struct ScriptedSlackApi {
    history: Mutex<HashMap<String, Vec<SlackMessage>>>,
    replies: Mutex<HashMap<(String, String), Vec<SlackMessage>>>,
    failures: Mutex<VecDeque<SlackApiError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn page(messages: &[SlackMessage], cursor: Option<&str>, limit: u32) -> HistoryPage {
    let start = cursor.and_then(|cursor| cursor.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + limit.max(1) as usize).min(messages.len());
    let has_more = end < messages.len();
    HistoryPage {
        messages: messages.get(start..end).map(<[SlackMessage]>::to_vec).unwrap_or_default(),
        has_more,
        response_metadata: has_more.then(|| ResponseMetadata { next_cursor: end.to_string() }),
    }
}

impl ScriptedSlackApi {
    /// Channel history, newest message first.
    pub fn with_history(self, channel: &str, messages: Vec<SlackMessage>) -> Self {
        lock(&self.history).insert(channel.to_owned(), messages);
        self
    }

    /// Replies of the thread rooted at `ts`, parent first.
    pub fn with_replies(self, channel: &str, ts: &str, messages: Vec<SlackMessage>) -> Self {
        lock(&self.replies).insert((channel.to_owned(), ts.to_owned()), messages);
        self
    }

    /// The next call of any method fails with `error`.
    pub fn fail_next(&self, error: SlackApiError) {
        lock(&self.failures).push_back(error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn posted(&self) -> Vec<PostMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::PostMessage(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) -> Result<(), SlackApiError> {
        lock(&self.calls).push(call);
        match lock(&self.failures).pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// A human message with a client-generated id.
pub fn user_message(user: &str, ts: &str, text: &str, client_msg_id: &str) -> SlackMessage {
    SlackMessage {
        message_type: "message".to_owned(),
        user: Some(user.to_owned()),
        ts: ts.to_owned(),
        text: text.to_owned(),
        client_msg_id: Some(client_msg_id.to_owned()),
        ..SlackMessage::default()
    }
}

/// A bot reply carrying reply metadata.
pub fn bot_reply(ts: &str, text: &str, message_id: &str, session_id: &str) -> SlackMessage {
    SlackMessage {
        message_type: "message".to_owned(),
        user: Some("UBOT".to_owned()),
        bot_id: Some("BBOT".to_owned()),
        ts: ts.to_owned(),
        text: text.to_owned(),
        metadata: Some(json!({
            "event_type": "reply_message",
            "event_payload": {"reply_message_id": message_id, "reply_session_id": session_id}
        })),
        ..SlackMessage::default()
    }
}

#[async_trait]
impl SlackApi for ScriptedSlackApi {
    async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError> {
        self.record(RecordedCall::History {
            channel: channel.to_owned(),
            cursor: cursor.map(str::to_owned),
            limit,
        })?;
        let history = lock(&self.history);
        let messages = history.get(channel).map(Vec::as_slice).unwrap_or_default();
        Ok(page(messages, cursor, limit))
    }

    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError> {
        self.record(RecordedCall::Replies {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            cursor: cursor.map(str::to_owned),
            limit,
        })?;
        let replies = lock(&self.replies);
        let messages = replies
            .get(&(channel.to_owned(), ts.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(page(messages, cursor, limit))
    }

    async fn reactions_add(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.record(RecordedCall::ReactionAdd {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            name: name.to_owned(),
        })
    }

    async fn reactions_remove(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.record(RecordedCall::ReactionRemove {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            name: name.to_owned(),
        })
    }

    async fn chat_post_message(
        &self,
        message: &PostMessage,
    ) -> Result<PostedMessage, SlackApiError> {
        self.record(RecordedCall::PostMessage(message.clone()))?;
        let count = self.posted().len();
        Ok(PostedMessage { channel: message.channel.clone(), ts: format!("9000000{count:03}.000000") })
    }

    async fn assistant_set_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), SlackApiError> {
        self.record(RecordedCall::SetStatus {
            channel: channel.to_owned(),
            thread_ts: thread_ts.to_owned(),
            status: status.to_owned(),
        })
    }

    async fn assistant_set_suggested_prompts(
        &self,
        channel: &str,
        thread_ts: &str,
        prompts: &[SuggestedPrompt],
    ) -> Result<(), SlackApiError> {
        self.record(RecordedCall::SuggestedPrompts {
            channel: channel.to_owned(),
            thread_ts: thread_ts.to_owned(),
            prompts: prompts.to_vec(),
        })
    }

    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        self.record(RecordedCall::AuthTest)?;
        Ok(AuthIdentity { user_id: "UBOT".to_owned(), team_id: Some("T1".to_owned()), url: None })
    }

    async fn apps_connections_open(&self) -> Result<String, SlackApiError> {
        self.record(RecordedCall::ConnectionsOpen)?;
        Ok("wss://wss.slack.test/link".to_owned())
    }
}
