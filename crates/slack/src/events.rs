use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use threadmind_core::messages::{
    MessageCatalog, AI_THINKING_EMOJI, ASSISTANT_GREETING, ASSISTANT_GREETING_PROMPT,
    ASSISTANT_THINKING,
};
use tracing::{debug, info, warn};

use crate::client::{PostMessage, SlackApi, SlackApiError, SuggestedPrompt};
use crate::worker::{EnqueueError, EventQueue};

const MAX_SUGGESTED_PROMPTS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlackEvent {
    Message(MessageEvent),
    AppMention(MessageEvent),
    ReactionAdded(ReactionAddedEvent),
    AssistantThreadStarted(AssistantThreadStartedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    /// Decodes the `event` object of an `events_api` envelope. Shapes that do
    /// not decode are reported as unsupported rather than failing the socket.
    pub fn from_payload(event: &Value) -> Self {
        let event_type = event.get("type").and_then(Value::as_str).unwrap_or("unknown");
        let decoded = match event_type {
            "message" => MessageEvent::from_value(event).map(Self::Message),
            "app_mention" => MessageEvent::from_value(event).map(Self::AppMention),
            "reaction_added" => ReactionAddedEvent::from_value(event).map(Self::ReactionAdded),
            "assistant_thread_started" => {
                AssistantThreadStartedEvent::deserialize(event).map(Self::AssistantThreadStarted)
            }
            other => return Self::Unsupported { event_type: other.to_owned() },
        };

        decoded.unwrap_or_else(|error| {
            warn!(event_type, error = %error, "slack event payload did not decode");
            Self::Unsupported { event_type: event_type.to_owned() }
        })
    }

    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::AssistantThreadStarted(_) => SlackEventType::AssistantThreadStarted,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::Message(event) | Self::AppMention(event) => Some(&event.channel_id),
            Self::ReactionAdded(event) => Some(&event.item.channel),
            Self::AssistantThreadStarted(event) => Some(&event.assistant_thread.channel_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    AppMention,
    ReactionAdded,
    AssistantThreadStarted,
    Unsupported,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "channel")]
    pub channel_id: String,
    #[serde(rename = "user", default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub client_msg_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub edited: Option<Value>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl MessageEvent {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let mut event = Self::deserialize(value)?;
        event.raw = value.clone();
        Ok(event)
    }

    pub fn is_edited(&self) -> bool {
        self.edited.is_some()
    }

    /// Client-generated id of the message. Messages posted through the API
    /// have none, so the timestamp stands in.
    pub fn message_id(&self) -> &str {
        self.client_msg_id.as_deref().unwrap_or(&self.ts)
    }

    /// Thread the reply belongs to: the existing thread, else a new thread
    /// under this message.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReactionItem {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ReactionAddedEvent {
    #[serde(rename = "user")]
    pub user_id: String,
    pub reaction: String,
    pub item: ReactionItem,
    #[serde(default)]
    pub item_user: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl ReactionAddedEvent {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let mut event = Self::deserialize(value)?;
        event.raw = value.clone();
        Ok(event)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AssistantThread {
    pub user_id: String,
    pub channel_id: String,
    pub thread_ts: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AssistantThreadStartedEvent {
    pub assistant_thread: AssistantThread,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    AppMention,
    ReactionAdded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::AppMention => "app_mention",
            Self::ReactionAdded => "reaction_added",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventPayload {
    Message(MessageEvent),
    AppMention(MessageEvent),
    ReactionAdded(ReactionAddedEvent),
}

/// One unit of work for the queue worker. Only `session_id` changes after
/// the event is enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct BotEvent {
    pub user_id: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub session_id: Option<String>,
    pub payload: EventPayload,
}

impl BotEvent {
    pub fn message(event: MessageEvent) -> Self {
        Self::from_message(event, EventPayload::Message)
    }

    pub fn app_mention(event: MessageEvent) -> Self {
        Self::from_message(event, EventPayload::AppMention)
    }

    fn from_message(event: MessageEvent, wrap: fn(MessageEvent) -> EventPayload) -> Self {
        Self {
            user_id: event.user_id.clone().unwrap_or_default(),
            channel_id: event.channel_id.clone(),
            message_id: Some(event.message_id().to_owned()),
            session_id: None,
            payload: wrap(event),
        }
    }

    pub fn reaction_added(event: ReactionAddedEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            channel_id: event.item.channel.clone(),
            message_id: None,
            session_id: None,
            payload: EventPayload::ReactionAdded(event),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Message(_) => EventKind::Message,
            EventPayload::AppMention(_) => EventKind::AppMention,
            EventPayload::ReactionAdded(_) => EventKind::ReactionAdded,
        }
    }

    pub fn message_event(&self) -> Option<&MessageEvent> {
        match &self.payload {
            EventPayload::Message(event) | EventPayload::AppMention(event) => Some(event),
            EventPayload::ReactionAdded(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Enqueued,
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                "no handler registered; dropping slack event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Everything the ingress handlers share.
#[derive(Clone)]
pub struct Ingress {
    pub queue: EventQueue,
    pub api: Arc<dyn SlackApi>,
    pub catalog: Arc<MessageCatalog>,
    pub bot_id: String,
    pub assistant: bool,
}

/// Dispatcher with the message, mention, reaction and assistant thread
/// handlers registered. Unsupported events fall through as `Ignored`.
pub fn bot_dispatcher(ingress: Ingress) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(ingress.clone()));
    dispatcher.register(AppMentionHandler::new(ingress.clone()));
    dispatcher.register(ReactionAddedHandler::new(ingress.queue.clone()));
    dispatcher.register(AssistantThreadStartedHandler::new(ingress));
    dispatcher
}

pub struct MessageHandler {
    ingress: Ingress,
    mention: String,
}

impl MessageHandler {
    pub fn new(ingress: Ingress) -> Self {
        let mention = format!("<@{}>", ingress.bot_id);
        Self { ingress, mention }
    }

    fn accepts(&self, event: &MessageEvent) -> bool {
        if event.subtype.is_some() || event.bot_id.is_some() {
            return false;
        }
        if event.user_id.as_deref() == Some(self.ingress.bot_id.as_str()) {
            return false;
        }
        if event.text.trim().is_empty() || event.text.contains(&self.mention) {
            return false;
        }
        !self.ingress.assistant || event.thread_ts.is_some()
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if !self.accepts(event) {
            debug!(correlation_id = %ctx.correlation_id, ts = %event.ts, "message filtered");
            return Ok(HandlerResult::Ignored);
        }

        self.ingress.queue.put(BotEvent::message(event.clone()))?;
        info!(
            correlation_id = %ctx.correlation_id,
            event_type = "message",
            channel_id = %event.channel_id,
            message_id = event.message_id(),
            "slack message enqueued"
        );

        let catalog = &self.ingress.catalog;
        let indicator = if self.ingress.assistant {
            self.ingress
                .api
                .assistant_set_status(
                    &event.channel_id,
                    event.reply_thread_ts(),
                    catalog.message(ASSISTANT_THINKING),
                )
                .await
        } else {
            self.ingress
                .api
                .reactions_add(&event.channel_id, &event.ts, catalog.emoji(AI_THINKING_EMOJI))
                .await
        };
        if let Err(error) = indicator {
            warn!(correlation_id = %ctx.correlation_id, error = %error, "thinking indicator failed");
        }

        Ok(HandlerResult::Enqueued)
    }
}

pub struct AppMentionHandler {
    ingress: Ingress,
}

impl AppMentionHandler {
    pub fn new(ingress: Ingress) -> Self {
        Self { ingress }
    }
}

#[async_trait]
impl EventHandler for AppMentionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.is_edited() {
            debug!(correlation_id = %ctx.correlation_id, ts = %event.ts, "edited mention skipped");
            return Ok(HandlerResult::Ignored);
        }

        self.ingress.queue.put(BotEvent::app_mention(event.clone()))?;
        info!(
            correlation_id = %ctx.correlation_id,
            event_type = "app_mention",
            channel_id = %event.channel_id,
            message_id = event.message_id(),
            "slack app mention enqueued"
        );

        let reaction = self.ingress.catalog.emoji(AI_THINKING_EMOJI);
        if let Err(error) =
            self.ingress.api.reactions_add(&event.channel_id, &event.ts, reaction).await
        {
            warn!(correlation_id = %ctx.correlation_id, error = %error, "thinking reaction failed");
        }

        Ok(HandlerResult::Enqueued)
    }
}

pub struct ReactionAddedHandler {
    queue: EventQueue,
}

impl ReactionAddedHandler {
    pub fn new(queue: EventQueue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl EventHandler for ReactionAddedHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.queue.put(BotEvent::reaction_added(event.clone()))?;
        info!(
            correlation_id = %ctx.correlation_id,
            event_type = "reaction_added",
            channel_id = %event.item.channel,
            reaction = %event.reaction,
            "slack reaction enqueued"
        );
        Ok(HandlerResult::Enqueued)
    }
}

pub struct AssistantThreadStartedHandler {
    ingress: Ingress,
}

impl AssistantThreadStartedHandler {
    pub fn new(ingress: Ingress) -> Self {
        Self { ingress }
    }

    fn suggested_prompts(&self) -> Vec<SuggestedPrompt> {
        let mut prompts: Vec<SuggestedPrompt> = self
            .ingress
            .catalog
            .message_groups(ASSISTANT_GREETING_PROMPT)
            .into_iter()
            .filter_map(|mut group| {
                Some(SuggestedPrompt {
                    title: group.remove("title")?,
                    message: group.remove("message")?,
                })
            })
            .collect();
        prompts.shuffle(&mut rand::thread_rng());
        prompts.truncate(MAX_SUGGESTED_PROMPTS);
        prompts
    }
}

#[async_trait]
impl EventHandler for AssistantThreadStartedHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AssistantThreadStarted
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::AssistantThreadStarted(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let thread = &event.assistant_thread;
        info!(
            correlation_id = %ctx.correlation_id,
            channel_id = %thread.channel_id,
            thread_ts = %thread.thread_ts,
            "assistant thread started"
        );

        let greeting = self.ingress.catalog.message(ASSISTANT_GREETING);
        let message = PostMessage::new(&thread.channel_id, greeting, Vec::new())
            .in_thread(Some(thread.thread_ts.clone()));
        self.ingress.api.chat_post_message(&message).await?;

        let prompts = self.suggested_prompts();
        if !prompts.is_empty() {
            self.ingress
                .api
                .assistant_set_suggested_prompts(&thread.channel_id, &thread.thread_ts, &prompts)
                .await?;
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use threadmind_core::MessageCatalog;

    use super::{
        bot_dispatcher, BotEvent, EventContext, EventDispatcher, EventKind, HandlerResult,
        Ingress, SlackEnvelope, SlackEvent,
    };
    use crate::testing::{RecordedCall, ScriptedSlackApi};
    use crate::worker::{EventQueue, EventReceiver, QueueItem};

    fn envelope(event: serde_json::Value) -> SlackEnvelope {
        SlackEnvelope { envelope_id: "env-1".to_owned(), event: SlackEvent::from_payload(&event) }
    }

    fn ingress(assistant: bool) -> (Ingress, Arc<ScriptedSlackApi>, EventReceiver) {
        let api = Arc::new(ScriptedSlackApi::default());
        let (queue, receiver) = EventQueue::new();
        let ingress = Ingress {
            queue,
            api: api.clone(),
            catalog: Arc::new(MessageCatalog::default()),
            bot_id: "UBOT".to_owned(),
            assistant,
        };
        (ingress, api, receiver)
    }

    #[test]
    fn decodes_event_types() {
        let message = SlackEvent::from_payload(&json!({
            "type": "message", "channel": "C1", "user": "U1", "text": "hi", "ts": "1.000001",
            "client_msg_id": "m-1"
        }));
        let SlackEvent::Message(event) = &message else {
            panic!("expected message, got {message:?}");
        };
        assert_eq!(event.message_id(), "m-1");
        assert_eq!(event.raw["client_msg_id"], "m-1");

        let reaction = SlackEvent::from_payload(&json!({
            "type": "reaction_added", "user": "U2", "reaction": "+1",
            "item": {"type": "message", "channel": "C1", "ts": "1.000002"}
        }));
        assert_eq!(reaction.channel_id(), Some("C1"));

        let unknown = SlackEvent::from_payload(&json!({"type": "channel_created"}));
        assert_eq!(unknown, SlackEvent::Unsupported { event_type: "channel_created".to_owned() });

        let broken = SlackEvent::from_payload(&json!({"type": "app_mention", "channel": 4}));
        assert!(matches!(broken, SlackEvent::Unsupported { .. }));
    }

    #[test]
    fn message_id_falls_back_to_timestamp() {
        let SlackEvent::AppMention(event) = SlackEvent::from_payload(&json!({
            "type": "app_mention", "channel": "C1", "user": "U1", "text": "<@UBOT> hi",
            "ts": "1.000003"
        })) else {
            panic!("expected mention");
        };
        let bot_event = BotEvent::app_mention(event);
        assert_eq!(bot_event.message_id.as_deref(), Some("1.000003"));
        assert_eq!(bot_event.kind(), EventKind::AppMention);
        assert_eq!(bot_event.session_id, None);
    }

    #[tokio::test]
    async fn message_is_enqueued_then_marked_thinking() {
        let (ingress, api, mut receiver) = ingress(false);
        let dispatcher = bot_dispatcher(ingress);

        let result = dispatcher
            .dispatch(
                &envelope(json!({
                    "type": "message", "channel": "C1", "user": "U1", "text": "what is rust?",
                    "ts": "1.000001", "client_msg_id": "m-1"
                })),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Enqueued);
        let Some(QueueItem::Event(event)) = receiver.try_next() else {
            panic!("expected a queued event");
        };
        assert_eq!(event.message_id.as_deref(), Some("m-1"));
        assert_eq!(
            api.calls(),
            vec![RecordedCall::ReactionAdd {
                channel: "C1".to_owned(),
                ts: "1.000001".to_owned(),
                name: ":thinking_face:".to_owned()
            }]
        );
    }

    #[tokio::test]
    async fn bot_noise_and_mentions_are_filtered() {
        let (ingress, api, _receiver) = ingress(false);
        let dispatcher = bot_dispatcher(ingress);
        let payloads = [
            json!({"type": "message", "channel": "C1", "user": "U1", "text": "x", "ts": "1", "subtype": "channel_join"}),
            json!({"type": "message", "channel": "C1", "user": "U1", "text": "x", "ts": "1", "bot_id": "B1"}),
            json!({"type": "message", "channel": "C1", "user": "UBOT", "text": "x", "ts": "1"}),
            json!({"type": "message", "channel": "C1", "user": "U1", "text": "   ", "ts": "1"}),
            json!({"type": "message", "channel": "C1", "user": "U1", "text": "<@UBOT> hi", "ts": "1"}),
        ];

        for payload in payloads {
            let result =
                dispatcher.dispatch(&envelope(payload), &EventContext::default()).await.expect("dispatch");
            assert_eq!(result, HandlerResult::Ignored);
        }
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn assistant_mode_sets_status_for_thread_messages_only() {
        let (ingress, api, _receiver) = ingress(true);
        let dispatcher = bot_dispatcher(ingress);

        let top_level = json!({"type": "message", "channel": "D1", "user": "U1", "text": "hi", "ts": "2.0"});
        let result =
            dispatcher.dispatch(&envelope(top_level), &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);

        let threaded = json!({
            "type": "message", "channel": "D1", "user": "U1", "text": "hi", "ts": "2.5",
            "thread_ts": "2.0"
        });
        let result =
            dispatcher.dispatch(&envelope(threaded), &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Enqueued);
        assert!(matches!(
            api.calls().as_slice(),
            [RecordedCall::SetStatus { thread_ts, .. }] if thread_ts == "2.0"
        ));
    }

    #[tokio::test]
    async fn edited_mentions_are_skipped() {
        let (ingress, _api, _receiver) = ingress(false);
        let dispatcher = bot_dispatcher(ingress);
        let result = dispatcher
            .dispatch(
                &envelope(json!({
                    "type": "app_mention", "channel": "C1", "user": "U1", "text": "<@UBOT> hi",
                    "ts": "1", "edited": {"user": "U1", "ts": "2"}
                })),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn assistant_thread_gets_greeting_and_at_most_four_prompts() {
        let (ingress, api, _receiver) = ingress(true);
        let dispatcher = bot_dispatcher(ingress);
        let result = dispatcher
            .dispatch(
                &envelope(json!({
                    "type": "assistant_thread_started",
                    "assistant_thread": {"user_id": "U1", "channel_id": "D1", "thread_ts": "3.0"}
                })),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        let calls = api.calls();
        assert!(matches!(&calls[0], RecordedCall::PostMessage(message) if message.thread_ts.as_deref() == Some("3.0")));
        let RecordedCall::SuggestedPrompts { prompts, .. } = &calls[1] else {
            panic!("expected suggested prompts, got {calls:?}");
        };
        assert_eq!(prompts.len(), 4);
    }

    #[tokio::test]
    async fn closed_queue_surfaces_as_handler_error() {
        let (ingress, _api, _receiver) = ingress(false);
        ingress.queue.close();
        let dispatcher = bot_dispatcher(ingress);
        let result = dispatcher
            .dispatch(
                &envelope(json!({
                    "type": "reaction_added", "user": "U2", "reaction": "+1",
                    "item": {"channel": "C1", "ts": "1.0"}
                })),
                &EventContext::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let dispatcher = EventDispatcher::new();
        let result = dispatcher
            .dispatch(&envelope(json!({"type": "team_join"})), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
        let (ingress, _api, _receiver) = ingress(false);
        assert_eq!(bot_dispatcher(ingress).handler_count(), 4);
    }
}
