use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::SlackApi;
use crate::events::{EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// What the socket delivered.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketFrame {
    Envelope(SlackEnvelope),
    /// Slack is about to close the connection and wants a fresh one.
    Disconnect { reason: String },
}

/// Parses one Socket Mode text frame. `hello` and undecodable frames yield
/// `None`; envelopes of any type are returned so they still get acked.
pub fn decode_frame(text: &str) -> Option<SocketFrame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(error) => {
            warn!(error = %error, "socket mode frame is not json; skipping");
            return None;
        }
    };

    let frame_type = value.get("type").and_then(Value::as_str).unwrap_or("unknown");
    match frame_type {
        "hello" => {
            debug!("socket mode hello received");
            None
        }
        "disconnect" => {
            let reason = value.get("reason").and_then(Value::as_str).unwrap_or("unknown");
            Some(SocketFrame::Disconnect { reason: reason.to_owned() })
        }
        _ => {
            let Some(envelope_id) = value.get("envelope_id").and_then(Value::as_str) else {
                debug!(frame_type, "socket mode frame without envelope id; skipping");
                return None;
            };
            let event = match (frame_type, value.pointer("/payload/event")) {
                ("events_api", Some(event)) => SlackEvent::from_payload(event),
                _ => SlackEvent::Unsupported { event_type: frame_type.to_owned() },
            };
            Some(SocketFrame::Envelope(SlackEnvelope { envelope_id: envelope_id.to_owned(), event }))
        }
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the transport has nothing more to deliver.
    async fn next_frame(&self) -> Result<Option<SocketFrame>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over `tokio-tungstenite`. Each `connect` asks Slack for a
/// fresh websocket URL with the app-level token.
pub struct WebSocketTransport {
    api: Arc<dyn SlackApi>,
    sink: Mutex<Option<SplitSink<SocketStream, Message>>>,
    stream: Mutex<Option<SplitStream<SocketStream>>>,
}

impl WebSocketTransport {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api, sink: Mutex::new(None), stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .api
            .apps_connections_open()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (socket, _response) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, stream) = socket.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_frame(&self) -> Result<Option<SocketFrame>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Receive("not connected".to_owned()))?;

        loop {
            let message = stream
                .next()
                .await
                .ok_or_else(|| TransportError::Receive("socket closed by peer".to_owned()))?
                .map_err(|error| TransportError::Receive(error.to_string()))?;

            match message {
                Message::Text(text) => {
                    if let Some(frame) = decode_frame(text.as_str()) {
                        return Ok(Some(frame));
                    }
                }
                Message::Close(close) => {
                    let reason = close.map(|frame| frame.reason.to_string()).unwrap_or_default();
                    return Err(TransportError::Receive(format!("socket closed: {reason}")));
                }
                // pings are answered by tungstenite itself
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink =
            guard.as_mut().ok_or_else(|| TransportError::Acknowledge("not connected".to_owned()))?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        sink.send(Message::Text(ack.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.stream.lock().await.take();
        let Some(mut sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

enum PumpOutcome {
    Closed,
    Refresh,
    Shutdown,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps envelopes until the transport ends, retries run out, or
    /// `shutdown` flips to `true`. Never fails the process.
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut attempt = 0_u32;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let mut delivered = false;
            match self.connect_and_pump(attempt, &mut delivered, &mut shutdown).await {
                Ok(PumpOutcome::Closed | PumpOutcome::Shutdown) => return Ok(()),
                Ok(PumpOutcome::Refresh) => {
                    attempt = 0;
                }
                Err(transport_error) => {
                    // A session that delivered frames was healthy; its drop
                    // starts a fresh retry budget.
                    if delivered {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        delivered: &mut bool,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PumpOutcome, TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let frame = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested; closing socket mode transport");
                        self.transport.disconnect().await?;
                        return Ok(PumpOutcome::Shutdown);
                    }
                    continue;
                }
                frame = self.transport.next_frame() => frame?,
            };
            *delivered = true;

            let envelope = match frame {
                None => {
                    info!(attempt, "socket mode transport stream closed");
                    self.transport.disconnect().await?;
                    return Ok(PumpOutcome::Closed);
                }
                Some(SocketFrame::Disconnect { reason }) => {
                    info!(reason = %reason, "slack requested a reconnect; refreshing connection");
                    if let Err(error) = self.transport.disconnect().await {
                        debug!(error = %error, "closing the previous socket failed");
                    }
                    return Ok(PumpOutcome::Refresh);
                }
                Some(SocketFrame::Envelope(envelope)) => envelope,
            };
            let channel_id = envelope.event.channel_id().unwrap_or("unknown");

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                channel_id,
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id,
                    "acknowledged slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    channel_id,
                    error = %error,
                    "event dispatch failed; continuing socket loop"
                );
            }
        }
    }
}
