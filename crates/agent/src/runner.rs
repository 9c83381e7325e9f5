use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use threadmind_core::config::AgentConfig;
use threadmind_core::{RunContext, Transcript, TranscriptMessage};
use tracing::{debug, info};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent request `{operation}` failed: {message}")]
    Transport { operation: &'static str, message: String },
    #[error("agent request `{operation}` returned http status {status}: {body}")]
    Status { operation: &'static str, status: u16, body: String },
    #[error("agent response for `{operation}` could not be decoded: {message}")]
    Decode { operation: &'static str, message: String },
    #[error("agent returned an empty transcript")]
    EmptyTranscript,
}

/// The external agent that turns a Slack message into a transcript. How the
/// transcript is produced (a supervisor graph, a single model) is the
/// runner's business.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn invoke(&self, input: &str, context: &RunContext) -> Result<Transcript, AgentError>;

    /// Whether `input` starts a new topic rather than continuing the channel
    /// conversation.
    async fn is_new_conversation(
        &self,
        _input: &str,
        _context: &RunContext,
    ) -> Result<bool, AgentError> {
        Ok(false)
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    input: &'a str,
    model: &'a str,
    #[serde(flatten)]
    context: &'a RunContext,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    new_conversation: bool,
}

/// Talks to an agent service over HTTP: `POST {endpoint}/invoke` returns a
/// transcript and `POST {endpoint}/classify` answers the new-conversation
/// question.
pub struct HttpAgentRunner {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpAgentRunner {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let http = Client::builder().timeout(timeout).build().map_err(|error| {
            AgentError::Transport { operation: "client.build", message: error.to_string() }
        })?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        Self::new(
            &config.endpoint,
            &config.model,
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        body: &InvokeRequest<'_>,
    ) -> Result<T, AgentError> {
        let mut request = self.http.post(format!("{}/{operation}", self.endpoint)).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| AgentError::Transport {
            operation,
            message: error.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status { operation, status: status.as_u16(), body });
        }

        response
            .json::<T>()
            .await
            .map_err(|error| AgentError::Decode { operation, message: error.to_string() })
    }
}

#[async_trait]
impl AgentRunner for HttpAgentRunner {
    async fn invoke(&self, input: &str, context: &RunContext) -> Result<Transcript, AgentError> {
        let request = InvokeRequest { input, model: &self.model, context };
        let transcript: Transcript = self.post("invoke", &request).await?;
        if transcript.messages.is_empty() {
            return Err(AgentError::EmptyTranscript);
        }
        info!(
            thread_id = context.thread_id.as_deref().unwrap_or("none"),
            messages = transcript.messages.len(),
            "agent invocation completed"
        );
        Ok(transcript)
    }

    async fn is_new_conversation(
        &self,
        input: &str,
        context: &RunContext,
    ) -> Result<bool, AgentError> {
        let request = InvokeRequest { input, model: &self.model, context };
        let response: ClassifyResponse = self.post("classify", &request).await?;
        debug!(new_conversation = response.new_conversation, "agent classified message");
        Ok(response.new_conversation)
    }
}

/// Answers locally without a model. Useful for wiring checks and demos.
#[derive(Clone, Debug, Default)]
pub struct EchoAgentRunner;

#[async_trait]
impl AgentRunner for EchoAgentRunner {
    async fn invoke(&self, input: &str, _context: &RunContext) -> Result<Transcript, AgentError> {
        Ok(Transcript::new(vec![
            TranscriptMessage::human(input),
            TranscriptMessage::assistant(format!("You said: {}", input.trim())),
        ]))
    }
}
