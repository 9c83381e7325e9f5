use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use threadmind_core::config::SlackConfig;
use tracing::debug;

use crate::blocks::Block;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack `{method}` was rate limited")]
    RateLimited { method: String, retry_after: Option<Duration> },
    #[error("slack `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack `{method}` failed with http status {status}")]
    Status { method: String, status: u16 },
    #[error("slack `{method}` request failed: {message}")]
    Transport { method: String, message: String },
    #[error("slack `{method}` response could not be decoded: {message}")]
    Decode { method: String, message: String },
}

impl SlackApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SlackMessage {
    pub fn reply_session_id(&self) -> Option<&str> {
        self.metadata_payload("reply_session_id")
    }

    pub fn reply_message_id(&self) -> Option<&str> {
        self.metadata_payload("reply_message_id")
    }

    fn metadata_payload(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get("event_payload")?.get(key)?.as_str()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

impl HistoryPage {
    pub fn next_cursor(&self) -> Option<&str> {
        self.response_metadata
            .as_ref()
            .map(|metadata| metadata.next_cursor.as_str())
            .filter(|cursor| !cursor.is_empty())
    }
}

/// Metadata attached to every bot reply. It is how a later event recovers
/// the session of the conversation it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub event_type: String,
    pub event_payload: ReplyPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub reply_message_id: String,
    pub reply_session_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub unfurl_links: bool,
    pub unfurl_media: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl PostMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            blocks,
            thread_ts: None,
            unfurl_links: false,
            unfurl_media: false,
            metadata: None,
        }
    }

    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPrompt {
    pub title: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// The subset of the Slack Web API the bot talks to.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError>;

    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError>;

    async fn reactions_add(&self, channel: &str, ts: &str, name: &str)
        -> Result<(), SlackApiError>;

    async fn reactions_remove(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;

    async fn chat_post_message(&self, message: &PostMessage)
        -> Result<PostedMessage, SlackApiError>;

    async fn assistant_set_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), SlackApiError>;

    async fn assistant_set_suggested_prompts(
        &self,
        channel: &str,
        thread_ts: &str,
        prompts: &[SuggestedPrompt],
    ) -> Result<(), SlackApiError>;

    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError>;

    /// Socket Mode websocket URL, requested with the app-level token.
    async fn apps_connections_open(&self) -> Result<String, SlackApiError>;
}

pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    app_token: SecretString,
}

impl SlackWebClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: SecretString,
        app_token: SecretString,
    ) -> Result<Self, SlackApiError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().map_err(|error| {
            SlackApiError::Transport { method: "client.build".to_owned(), message: error.to_string() }
        })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token,
            app_token,
        })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, SlackApiError> {
        Self::new(&config.api_base_url, config.bot_token.clone(), config.app_token.clone())
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, SlackApiError> {
        let request = self
            .http
            .get(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query);
        self.send(method, request).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, SlackApiError> {
        let request =
            self.http.post(self.url(method)).bearer_auth(self.bot_token.expose_secret()).json(body);
        self.send(method, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, SlackApiError> {
        let response = request.send().await.map_err(|error| SlackApiError::Transport {
            method: method.to_owned(),
            message: error.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SlackApiError::RateLimited { method: method.to_owned(), retry_after });
        }
        if !status.is_success() {
            return Err(SlackApiError::Status { method: method.to_owned(), status: status.as_u16() });
        }

        let body: Value = response.json().await.map_err(|error| SlackApiError::Decode {
            method: method.to_owned(),
            message: error.to_string(),
        })?;
        debug!(slack_method = method, "slack api call completed");
        decode_body(method, body)
    }
}

fn decode_body<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
        if error == "ratelimited" {
            return Err(SlackApiError::RateLimited { method: method.to_owned(), retry_after: None });
        }
        return Err(SlackApiError::Api { method: method.to_owned(), error: error.to_owned() });
    }

    serde_json::from_value(body)
        .map_err(|error| SlackApiError::Decode { method: method.to_owned(), message: error.to_string() })
}

#[derive(Deserialize)]
struct Ack {}

#[derive(Deserialize)]
struct PostMessageResponse {
    channel: String,
    ts: String,
}

#[derive(Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

fn reaction_name(name: &str) -> &str {
    name.trim().trim_matches(':')
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn conversations_history(
        &self,
        channel: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError> {
        let mut query = vec![
            ("channel", channel.to_owned()),
            ("limit", limit.to_string()),
            ("include_all_metadata", "true".to_owned()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }
        self.get("conversations.history", &query).await
    }

    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, SlackApiError> {
        let mut query = vec![
            ("channel", channel.to_owned()),
            ("ts", ts.to_owned()),
            ("limit", limit.to_string()),
            ("include_all_metadata", "true".to_owned()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }
        self.get("conversations.replies", &query).await
    }

    async fn reactions_add(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        let body = json!({"channel": channel, "timestamp": ts, "name": reaction_name(name)});
        self.post_json::<Ack>("reactions.add", &body).await.map(|_| ())
    }

    async fn reactions_remove(
        &self,
        channel: &str,
        ts: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        let body = json!({"channel": channel, "timestamp": ts, "name": reaction_name(name)});
        self.post_json::<Ack>("reactions.remove", &body).await.map(|_| ())
    }

    async fn chat_post_message(
        &self,
        message: &PostMessage,
    ) -> Result<PostedMessage, SlackApiError> {
        let response: PostMessageResponse = self.post_json("chat.postMessage", message).await?;
        Ok(PostedMessage { channel: response.channel, ts: response.ts })
    }

    async fn assistant_set_status(
        &self,
        channel: &str,
        thread_ts: &str,
        status: &str,
    ) -> Result<(), SlackApiError> {
        let body = json!({"channel_id": channel, "thread_ts": thread_ts, "status": status});
        self.post_json::<Ack>("assistant.threads.setStatus", &body).await.map(|_| ())
    }

    async fn assistant_set_suggested_prompts(
        &self,
        channel: &str,
        thread_ts: &str,
        prompts: &[SuggestedPrompt],
    ) -> Result<(), SlackApiError> {
        let body = json!({"channel_id": channel, "thread_ts": thread_ts, "prompts": prompts});
        self.post_json::<Ack>("assistant.threads.setSuggestedPrompts", &body).await.map(|_| ())
    }

    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        self.post_json("auth.test", &json!({})).await
    }

    async fn apps_connections_open(&self) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        let request = self.http.post(self.url(method)).bearer_auth(self.app_token.expose_secret());
        let response: ConnectionsOpenResponse = self.send(method, request).await?;
        Ok(response.url)
    }
}
