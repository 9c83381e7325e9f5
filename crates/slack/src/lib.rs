//! Slack side of threadmind.
//!
//! - **Socket Mode** (`socket`) - websocket ingress with ack-before-dispatch and reconnects
//! - **Events** (`events`) - envelope decoding and the ingress handlers that feed the queue
//! - **Worker** (`worker`) - single-consumer FIFO queue with sentinel shutdown
//! - **Sessions** (`session`) - recovers the agent session of a Slack conversation
//! - **Web API** (`client`, `conversations`, `retry`) - typed calls, pagination, rate-limit backoff
//! - **Replies** (`blocks`, `markdown`) - Block Kit reply formatting and mrkdwn fallback text
//!
//! # Architecture
//!
//! ```text
//! Slack → SocketModeRunner → EventDispatcher → handlers → EventQueue
//!                                                            ↓
//!                           chat.postMessage ← EventProcessor ← EventWorker
//! ```

pub mod blocks;
pub mod client;
pub mod conversations;
pub mod events;
pub mod markdown;
pub mod retry;
pub mod session;
pub mod socket;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod urls;
pub mod worker;

pub use blocks::{format_reply, new_conversation_message, MessageTemplate};
pub use client::{SlackApi, SlackApiError, SlackMessage, SlackWebClient};
pub use conversations::{message_to_text, ConversationReader};
pub use events::{bot_dispatcher, BotEvent, EventKind, EventPayload, Ingress};
pub use retry::RateLimitRetry;
pub use session::SessionResolver;
pub use socket::{ReconnectPolicy, SocketModeRunner, WebSocketTransport};
pub use worker::{EventProcessor, EventQueue, EventWorker, WorkerState};
