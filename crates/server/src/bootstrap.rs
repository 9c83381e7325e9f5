use std::sync::Arc;

use threadmind_agent::{AgentError, AgentRuntime, HttpAgentRunner};
use threadmind_core::config::{AppConfig, ConfigError, LoadOptions, TrackingProvider};
use threadmind_db::{
    connect_with_settings, migrations, DbPool, FeedbackRepository, LogFeedbackRepository,
    SqlFeedbackRepository,
};
use threadmind_slack::{
    bot_dispatcher, ConversationReader, EventQueue, EventWorker, Ingress, RateLimitRetry,
    ReconnectPolicy, SessionResolver, SlackApi, SlackApiError, SlackWebClient, SocketModeRunner,
    WebSocketTransport,
};
use thiserror::Error;
use tracing::info;

use crate::bot::{BotEventProcessor, BotSettings};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub queue: EventQueue,
    pub worker: EventWorker,
    pub socket: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack setup failed: {0}")]
    Slack(#[from] SlackApiError),
    #[error("agent setup failed: {0}")]
    Agent(#[from] AgentError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(assistant = config.slack.assistant, "starting application bootstrap");
    let api: Arc<dyn SlackApi> = Arc::new(SlackWebClient::from_config(&config.slack)?);
    let (db_pool, feedback) = feedback_store(&config).await?;
    assemble(config, api, db_pool, feedback).await
}

/// Picks the feedback sink for the configured tracking provider. Only the
/// `database` provider opens (and migrates) the SQLite pool.
pub async fn feedback_store(
    config: &AppConfig,
) -> Result<(Option<DbPool>, Option<Arc<dyn FeedbackRepository>>), BootstrapError> {
    match config.tracking.provider {
        TrackingProvider::None => Ok((None, None)),
        TrackingProvider::Stdout => Ok((None, Some(Arc::new(LogFeedbackRepository)))),
        TrackingProvider::Database => {
            let db_pool = connect_with_settings(
                &config.database.url,
                config.database.max_connections,
                config.database.timeout_secs,
            )
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
            migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
            info!("feedback database connected and migrated");

            let repository = Arc::new(SqlFeedbackRepository::new(db_pool.clone()));
            Ok((Some(db_pool), Some(repository)))
        }
    }
}

/// Wires every component by hand. The Slack API is passed in so tests can
/// swap the web client for a fake.
pub async fn assemble(
    config: AppConfig,
    api: Arc<dyn SlackApi>,
    db_pool: Option<DbPool>,
    feedback: Option<Arc<dyn FeedbackRepository>>,
) -> Result<Application, BootstrapError> {
    let bot_id = match &config.slack.bot_id {
        Some(bot_id) => bot_id.clone(),
        None => {
            let identity = api.auth_test().await?;
            info!(bot_id = %identity.user_id, team_id = ?identity.team_id, "resolved bot identity");
            identity.user_id
        }
    };
    let catalog = Arc::new(config.catalog());

    let retry = RateLimitRetry::with_max_elapsed_secs(config.slack.rate_limit_max_elapsed_secs);
    let reader = ConversationReader::new(api.clone(), retry, config.slack.replies_page_size);
    let resolver = SessionResolver::new(reader, config.slack.history_page_size);
    let runner = Arc::new(HttpAgentRunner::from_config(&config.agent)?);
    let runtime = AgentRuntime::new(runner, catalog.clone());

    let (queue, receiver) = EventQueue::new();
    let processor = BotEventProcessor::new(
        api.clone(),
        resolver,
        runtime,
        catalog.clone(),
        feedback,
        BotSettings {
            bot_id: bot_id.clone(),
            workspace_url: config.slack.workspace_url.clone(),
            assistant: config.slack.assistant,
        },
    );
    let worker = EventWorker::new(receiver, Arc::new(processor));

    let dispatcher = bot_dispatcher(Ingress {
        queue: queue.clone(),
        api: api.clone(),
        catalog,
        bot_id,
        assistant: config.slack.assistant,
    });
    let socket = SocketModeRunner::new(
        Arc::new(WebSocketTransport::new(api)),
        dispatcher,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, queue, worker, socket })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use threadmind_core::config::{AppConfig, ConfigOverrides, LoadOptions, TrackingProvider};
    use threadmind_slack::testing::{RecordedCall, ScriptedSlackApi};
    use threadmind_slack::WorkerState;

    use crate::bootstrap::{assemble, bootstrap, feedback_store};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn database_provider_opens_and_migrates_the_feedback_store() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config.tracking.provider = TrackingProvider::Database;

        let (pool, feedback) = feedback_store(&config).await.expect("feedback store");
        let pool = pool.expect("database pool");
        assert!(feedback.is_some());

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'emoji_feedback'",
        )
        .fetch_one(&pool)
        .await
        .expect("schema lookup");
        assert_eq!(table_count, 1);
        pool.close().await;

        config.tracking.provider = TrackingProvider::Stdout;
        let (pool, feedback) = feedback_store(&config).await.expect("feedback store");
        assert!(pool.is_none());
        assert!(feedback.is_some());

        config.tracking.provider = TrackingProvider::None;
        let (_, feedback) = feedback_store(&config).await.expect("feedback store");
        assert!(feedback.is_none());
    }

    #[tokio::test]
    async fn assemble_resolves_the_bot_identity_when_unset() {
        let api = Arc::new(ScriptedSlackApi::default());
        let app = assemble(AppConfig::default(), api.clone(), None, None).await.expect("assembled");

        assert_eq!(api.calls(), vec![RecordedCall::AuthTest]);
        assert_eq!(app.queue.state(), WorkerState::Running);

        let mut config = AppConfig::default();
        config.slack.bot_id = Some("UCONFIGURED".to_string());
        let api = Arc::new(ScriptedSlackApi::default());
        assemble(config, api.clone(), None, None).await.expect("assembled");
        assert!(api.calls().is_empty());
    }
}
