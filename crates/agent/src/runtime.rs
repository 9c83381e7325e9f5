use std::sync::Arc;

use threadmind_core::{parse_agent_result, MessageCatalog, Reference, RunContext};
use tracing::info;

use crate::runner::{AgentError, AgentRunner};

/// What gets posted back to Slack for one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentReply {
    pub content: String,
    pub references: Vec<Reference>,
}

#[derive(Clone)]
pub struct AgentRuntime {
    runner: Arc<dyn AgentRunner>,
    catalog: Arc<MessageCatalog>,
}

impl AgentRuntime {
    pub fn new(runner: Arc<dyn AgentRunner>, catalog: Arc<MessageCatalog>) -> Self {
        Self { runner, catalog }
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    pub async fn run(&self, input: &str, context: &RunContext) -> Result<AgentReply, AgentError> {
        let transcript = self.runner.invoke(input, context).await?;
        let (content, references) = parse_agent_result(&transcript, &self.catalog);
        info!(
            run_id = context.run_id.as_deref().unwrap_or("none"),
            references = references.len(),
            "agent reply parsed"
        );
        Ok(AgentReply { content, references })
    }

    pub async fn is_new_conversation(
        &self,
        input: &str,
        context: &RunContext,
    ) -> Result<bool, AgentError> {
        self.runner.is_new_conversation(input, context).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use threadmind_core::{
        ContextParams, MessageCatalog, RunContext, Transcript, TranscriptMessage,
    };

    use super::AgentRuntime;
    use crate::runner::{AgentError, AgentRunner, EchoAgentRunner};

    struct CitingRunner;

    #[async_trait]
    impl AgentRunner for CitingRunner {
        async fn invoke(&self, input: &str, _context: &RunContext) -> Result<Transcript, AgentError> {
            Ok(Transcript::new(vec![
                TranscriptMessage::human(input),
                TranscriptMessage::tool(
                    "google_search",
                    "snippet",
                    vec![json!({"title": "A", "link": "http://a"})],
                ),
                TranscriptMessage::tool(
                    "google_search",
                    "snippet",
                    vec![json!({"title": "A", "link": "http://a"})],
                ),
                TranscriptMessage::assistant("  final answer  "),
            ]))
        }
    }

    fn context() -> RunContext {
        RunContext::build(ContextParams {
            bot_id: "UBOT".to_owned(),
            user_id: "U1".to_owned(),
            channel_id: "C1".to_owned(),
            channel_url: "https://acme.slack.com/archives/C1".to_owned(),
            conversation_url: "https://acme.slack.com/archives/C1".to_owned(),
            event_type: "app_mention".to_owned(),
            message_id: Some("m-1".to_owned()),
            session_id: None,
            now: chrono::Utc::now(),
            conversation: None,
        })
    }

    #[tokio::test]
    async fn run_parses_content_and_deduplicated_references() {
        let runtime = AgentRuntime::new(Arc::new(CitingRunner), Arc::new(MessageCatalog::default()));
        let reply = runtime.run("q", &context()).await.expect("reply");

        assert_eq!(reply.content, "final answer");
        assert_eq!(reply.references.len(), 1);
        assert_eq!(reply.references[0].source, "google_search");
        assert_eq!(reply.references[0].icon, ":mag:");
        assert_eq!(reply.references[0].artifacts.len(), 1);
    }

    #[tokio::test]
    async fn echo_runtime_has_no_references() {
        let runtime = AgentRuntime::new(Arc::new(EchoAgentRunner), Arc::new(MessageCatalog::default()));
        let reply = runtime.run("ping", &context()).await.expect("reply");

        assert_eq!(reply.content, "You said: ping");
        assert!(reply.references.is_empty());
        assert!(!runtime.is_new_conversation("ping", &context()).await.expect("flag"));
    }
}
