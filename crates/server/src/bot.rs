use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use threadmind_agent::{AgentError, AgentRuntime};
use threadmind_core::messages::AI_THINKING_EMOJI;
use threadmind_core::{ApplicationError, ContextParams, MessageCatalog, RunContext};
use threadmind_db::{EmojiFeedback, FeedbackRepository};
use threadmind_slack::client::{MessageMetadata, PostMessage, ReplyPayload};
use threadmind_slack::events::{EventPayload, MessageEvent};
use threadmind_slack::urls::{build_channel_url, build_thread_url, replace_channel_ids_with_urls};
use threadmind_slack::{
    format_reply, new_conversation_message, BotEvent, EventProcessor, MessageTemplate, SessionResolver,
    SlackApi, SlackApiError,
};
use tracing::{debug, info, warn};

/// Turns queued Slack events into agent replies and feedback records.
pub struct BotEventProcessor {
    api: Arc<dyn SlackApi>,
    resolver: SessionResolver,
    runtime: AgentRuntime,
    catalog: Arc<MessageCatalog>,
    feedback: Option<Arc<dyn FeedbackRepository>>,
    bot_id: String,
    workspace_url: String,
    assistant: bool,
}

pub struct BotSettings {
    pub bot_id: String,
    pub workspace_url: String,
    pub assistant: bool,
}

impl BotEventProcessor {
    pub fn new(
        api: Arc<dyn SlackApi>,
        resolver: SessionResolver,
        runtime: AgentRuntime,
        catalog: Arc<MessageCatalog>,
        feedback: Option<Arc<dyn FeedbackRepository>>,
        settings: BotSettings,
    ) -> Self {
        Self {
            api,
            resolver,
            runtime,
            catalog,
            feedback,
            bot_id: settings.bot_id,
            workspace_url: settings.workspace_url,
            assistant: settings.assistant,
        }
    }

    fn run_context(&self, event: &BotEvent, message: &MessageEvent) -> RunContext {
        RunContext::build(ContextParams {
            bot_id: self.bot_id.clone(),
            user_id: event.user_id.clone(),
            channel_id: event.channel_id.clone(),
            channel_url: build_channel_url(&self.workspace_url, &event.channel_id),
            conversation_url: build_thread_url(
                &self.workspace_url,
                &event.channel_id,
                &message.ts,
                message.thread_ts.as_deref(),
            ),
            event_type: event.kind().as_str().to_owned(),
            message_id: event.message_id.clone(),
            session_id: event.session_id.clone(),
            now: Utc::now(),
            conversation: None,
        })
    }

    fn agent_input(&self, message: &MessageEvent) -> String {
        replace_channel_ids_with_urls(&message.text, &self.workspace_url)
    }

    async fn remove_thinking_reaction(&self, message: &MessageEvent) {
        let reaction = self.catalog.emoji(AI_THINKING_EMOJI);
        if let Err(error) = self.api.reactions_remove(&message.channel_id, &message.ts, reaction).await {
            warn!(
                channel_id = %message.channel_id,
                ts = %message.ts,
                error = %error,
                "failed to remove thinking reaction"
            );
        }
    }

    async fn reply(
        &self,
        event: &BotEvent,
        message: &MessageEvent,
        template: MessageTemplate,
        in_replies: bool,
    ) -> Result<(), ApplicationError> {
        let message_id = event.message_id.clone().unwrap_or_else(|| message.message_id().to_owned());
        let session_id = event.session_id.clone().unwrap_or_else(|| message_id.clone());
        let post = PostMessage::new(&event.channel_id, template.fallback_text, template.blocks)
            .in_thread(in_replies.then(|| message.reply_thread_ts().to_owned()))
            .with_metadata(MessageMetadata {
                event_type: format!("reply_{}", event.kind().as_str()),
                event_payload: ReplyPayload { reply_message_id: message_id, reply_session_id: session_id },
            });

        let posted = self.api.chat_post_message(&post).await.map_err(slack_error)?;
        info!(
            channel_id = %event.channel_id,
            message_id = event.message_id.as_deref().unwrap_or("none"),
            session_id = event.session_id.as_deref().unwrap_or("none"),
            reply_ts = %posted.ts,
            "reply posted"
        );
        Ok(())
    }
}

#[async_trait]
impl EventProcessor for BotEventProcessor {
    async fn process_message(&self, mut event: BotEvent) -> Result<(), ApplicationError> {
        let message = event.message_event().cloned().ok_or(ApplicationError::MissingField("event"))?;
        let session_id =
            self.resolver.find_session_id(&message, self.assistant).await.map_err(slack_error)?;
        event.session_id = Some(session_id);
        let context = self.run_context(&event, &message);

        if !self.assistant
            && self.runtime.is_new_conversation(&message.text, &context).await.map_err(agent_error)?
        {
            info!(channel_id = %event.channel_id, "message starts a new conversation");
            self.remove_thinking_reaction(&message).await;
            event.session_id = None;
            return self.reply(&event, &message, new_conversation_message(&self.catalog), false).await;
        }

        let reply =
            self.runtime.run(&self.agent_input(&message), &context).await.map_err(agent_error)?;
        if !self.assistant {
            self.remove_thinking_reaction(&message).await;
        }

        let template = format_reply(&reply.content, &reply.references, &self.catalog);
        self.reply(&event, &message, template, self.assistant).await
    }

    async fn process_app_mention(&self, mut event: BotEvent) -> Result<(), ApplicationError> {
        let message = event.message_event().cloned().ok_or(ApplicationError::MissingField("event"))?;
        let session_id = self.resolver.find_session_id(&message, true).await.map_err(slack_error)?;
        event.session_id = Some(session_id);
        let context = self.run_context(&event, &message);

        let reply =
            self.runtime.run(&self.agent_input(&message), &context).await.map_err(agent_error)?;
        self.remove_thinking_reaction(&message).await;

        let template = format_reply(&reply.content, &reply.references, &self.catalog);
        self.reply(&event, &message, template, true).await
    }

    async fn process_reaction_added(&self, event: BotEvent) -> Result<(), ApplicationError> {
        let Some(feedback) = &self.feedback else {
            return Ok(());
        };
        let EventPayload::ReactionAdded(reaction) = &event.payload else {
            return Err(ApplicationError::MissingField("item"));
        };
        if reaction.user_id == self.bot_id {
            debug!(reaction = %reaction.reaction, "ignoring the bot's own reaction");
            return Ok(());
        }

        let replies = self
            .resolver
            .reader()
            .replies(&reaction.item.channel, &reaction.item.ts, None)
            .await
            .map_err(slack_error)?;
        let Some(reply) = replies.iter().find(|reply| reply.ts == reaction.item.ts) else {
            debug!(ts = %reaction.item.ts, "reacted message not found");
            return Ok(());
        };
        let Some(message_id) = reply.reply_message_id() else {
            warn!(
                channel_id = %reaction.item.channel,
                ts = %reply.ts,
                "no reply_message_id in reacted message metadata"
            );
            return Ok(());
        };

        feedback
            .record(EmojiFeedback::new(
                message_id,
                &reaction.user_id,
                &reaction.item.channel,
                &reply.ts,
                &reply.text,
                &reaction.reaction,
            ))
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        info!(message_id, reaction = %reaction.reaction, "emoji feedback recorded");
        Ok(())
    }
}

fn slack_error(error: SlackApiError) -> ApplicationError {
    ApplicationError::Slack(error.to_string())
}

fn agent_error(error: AgentError) -> ApplicationError {
    ApplicationError::Agent(error.to_string())
}
