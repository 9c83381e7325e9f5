use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod feedback;
pub mod memory;

pub use feedback::SqlFeedbackRepository;
pub use memory::{InMemoryFeedbackRepository, LogFeedbackRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// A reaction a user left on one of the bot's replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiFeedback {
    pub id: String,
    /// Message id of the user message the reply answered.
    pub message_id: String,
    pub user_id: String,
    pub channel_id: String,
    /// Slack timestamp of the reply that was reacted to.
    pub message_ts: String,
    pub reply_text: String,
    pub reaction: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl EmojiFeedback {
    pub fn new(
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        message_ts: impl Into<String>,
        reply_text: impl Into<String>,
        reaction: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_id: message_id.into(),
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            message_ts: message_ts.into(),
            reply_text: reply_text.into(),
            reaction: reaction.into(),
            source: "slack".to_string(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn record(&self, feedback: EmojiFeedback) -> Result<(), RepositoryError>;

    async fn list_for_message(&self, message_id: &str)
        -> Result<Vec<EmojiFeedback>, RepositoryError>;
}
