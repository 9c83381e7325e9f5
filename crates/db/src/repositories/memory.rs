use tokio::sync::RwLock;
use tracing::info;

use super::{EmojiFeedback, FeedbackRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    records: RwLock<Vec<EmojiFeedback>>,
}

impl InMemoryFeedbackRepository {
    pub async fn all(&self) -> Vec<EmojiFeedback> {
        self.records.read().await.clone()
    }
}

#[async_trait::async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn record(&self, feedback: EmojiFeedback) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if !records.iter().any(|existing| existing.id == feedback.id) {
            records.push(feedback);
        }
        Ok(())
    }

    async fn list_for_message(
        &self,
        message_id: &str,
    ) -> Result<Vec<EmojiFeedback>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| record.message_id == message_id).cloned().collect())
    }
}

/// Writes feedback to the log only. Backs the `stdout` tracking provider.
#[derive(Default)]
pub struct LogFeedbackRepository;

#[async_trait::async_trait]
impl FeedbackRepository for LogFeedbackRepository {
    async fn record(&self, feedback: EmojiFeedback) -> Result<(), RepositoryError> {
        info!(
            message_id = %feedback.message_id,
            user_id = %feedback.user_id,
            channel_id = %feedback.channel_id,
            reaction = %feedback.reaction,
            source = %feedback.source,
            reply_text = %feedback.reply_text,
            "received user emoji feedback"
        );
        Ok(())
    }

    async fn list_for_message(
        &self,
        _message_id: &str,
    ) -> Result<Vec<EmojiFeedback>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryFeedbackRepository, LogFeedbackRepository};
    use crate::repositories::{EmojiFeedback, FeedbackRepository};

    #[tokio::test]
    async fn in_memory_repo_filters_by_message_and_ignores_duplicate_ids() {
        let repo = InMemoryFeedbackRepository::default();
        let thumbs = EmojiFeedback::new("m-1", "U1", "C1", "1.0", "answer", "+1");
        let other = EmojiFeedback::new("m-2", "U2", "C1", "2.0", "other answer", "eyes");

        repo.record(thumbs.clone()).await.expect("record");
        repo.record(thumbs.clone()).await.expect("record duplicate");
        repo.record(other).await.expect("record other");

        assert_eq!(repo.list_for_message("m-1").await.expect("list"), vec![thumbs]);
        assert_eq!(repo.all().await.len(), 2);
    }

    #[tokio::test]
    async fn log_repo_accepts_and_keeps_nothing() {
        let repo = LogFeedbackRepository;
        repo.record(EmojiFeedback::new("m-1", "U1", "C1", "1.0", "answer", "tada"))
            .await
            .expect("record");
        assert!(repo.list_for_message("m-1").await.expect("list").is_empty());
    }
}
