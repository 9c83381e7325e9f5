use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{EmojiFeedback, FeedbackRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_feedback(row: &sqlx::sqlite::SqliteRow) -> Result<EmojiFeedback, RepositoryError> {
    let get = |column: &str| -> Result<String, RepositoryError> {
        row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))
    };

    let created_at_str = get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at `{created_at_str}`: {e}")))?;

    Ok(EmojiFeedback {
        id: get("id")?,
        message_id: get("message_id")?,
        user_id: get("user_id")?,
        channel_id: get("channel_id")?,
        message_ts: get("message_ts")?,
        reply_text: get("reply_text")?,
        reaction: get("reaction")?,
        source: get("source")?,
        created_at,
    })
}

#[async_trait::async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn record(&self, feedback: EmojiFeedback) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO emoji_feedback
                (id, message_id, user_id, channel_id, message_ts, reply_text, reaction, source, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&feedback.id)
        .bind(&feedback.message_id)
        .bind(&feedback.user_id)
        .bind(&feedback.channel_id)
        .bind(&feedback.message_ts)
        .bind(&feedback.reply_text)
        .bind(&feedback.reaction)
        .bind(&feedback.source)
        .bind(feedback.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_message(
        &self,
        message_id: &str,
    ) -> Result<Vec<EmojiFeedback>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, message_id, user_id, channel_id, message_ts, reply_text, reaction, source, created_at
             FROM emoji_feedback
             WHERE message_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback).collect()
    }
}
