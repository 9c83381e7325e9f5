//! Single-consumer event queue.
//!
//! Ingress handlers `put` events and return right away; one worker task pops
//! them in FIFO order and runs them through an [`EventProcessor`]. Shutdown
//! pushes a sentinel behind the queued events and `join` waits until every
//! popped item, sentinel included, has been marked done.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use threadmind_core::ApplicationError;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};

use crate::events::BotEvent;

#[derive(Clone, Debug, PartialEq)]
pub enum QueueItem {
    Event(BotEvent),
    Sentinel,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("event queue is closed")]
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Draining,
    Stopped,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

struct Shared {
    pending: AtomicUsize,
    drained: Notify,
    state: watch::Sender<WorkerState>,
}

impl Shared {
    fn task_done(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// Marks one popped item done when dropped, whether processing finished,
/// failed, panicked or was cancelled.
struct TaskDone(Arc<Shared>);

impl Drop for TaskDone {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

/// Cancels the spawned processing task when the worker stops awaiting it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Moves the queue to `Stopped` if the worker future is dropped before it
/// reaches its own shutdown path.
struct StopOnDrop(Arc<Shared>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let stopped = self.0.state.send_if_modified(|state| {
            if *state == WorkerState::Stopped {
                false
            } else {
                *state = WorkerState::Stopped;
                true
            }
        });
        if stopped {
            warn!("event worker cancelled");
        }
    }
}

#[derive(Clone)]
pub struct EventQueue {
    sender: mpsc::UnboundedSender<QueueItem>,
    shared: Arc<Shared>,
}

pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<QueueItem>,
    shared: Arc<Shared>,
}

impl EventQueue {
    pub fn new() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(WorkerState::Running);
        let shared =
            Arc::new(Shared { pending: AtomicUsize::new(0), drained: Notify::new(), state });
        (Self { sender, shared: shared.clone() }, EventReceiver { receiver, shared })
    }

    pub fn put(&self, event: BotEvent) -> Result<(), EnqueueError> {
        if self.state() != WorkerState::Running {
            return Err(EnqueueError::Closed);
        }
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueueItem::Event(event)).is_err() {
            self.shared.task_done();
            return Err(EnqueueError::Closed);
        }
        Ok(())
    }

    /// Stops accepting events and pushes the sentinel. Calling it again is a
    /// no-op.
    pub fn close(&self) {
        let closed = self.shared.state.send_if_modified(|state| {
            if *state == WorkerState::Running {
                *state = WorkerState::Draining;
                true
            } else {
                false
            }
        });
        if !closed {
            return;
        }

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(QueueItem::Sentinel).is_err() {
            self.shared.task_done();
        }
        info!(pending = self.pending(), "event queue closed; sentinel pushed");
    }

    /// Resolves once every item put on the queue has been processed.
    pub async fn join(&self) {
        loop {
            let notified = self.shared.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.shared.state.subscribe()
    }
}

impl EventReceiver {
    /// Pops an item without waiting. Items popped this way are not marked
    /// done.
    pub fn try_next(&mut self) -> Option<QueueItem> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
pub trait EventProcessor: Send + Sync {
    async fn process_message(&self, event: BotEvent) -> Result<(), ApplicationError>;
    async fn process_app_mention(&self, event: BotEvent) -> Result<(), ApplicationError>;
    async fn process_reaction_added(&self, event: BotEvent) -> Result<(), ApplicationError>;
}

pub async fn dispatch(
    processor: &dyn EventProcessor,
    event: BotEvent,
) -> Result<(), ApplicationError> {
    use crate::events::EventKind;

    match event.kind() {
        EventKind::Message => processor.process_message(event).await,
        EventKind::AppMention => processor.process_app_mention(event).await,
        EventKind::ReactionAdded => processor.process_reaction_added(event).await,
    }
}

pub struct EventWorker {
    receiver: EventReceiver,
    processor: Arc<dyn EventProcessor>,
}

impl EventWorker {
    pub fn new(receiver: EventReceiver, processor: Arc<dyn EventProcessor>) -> Self {
        Self { receiver, processor }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("event worker started");
        let _stopped = StopOnDrop(self.receiver.shared.clone());
        loop {
            let Some(item) = self.receiver.receiver.recv().await else {
                warn!("event queue senders dropped; stopping worker");
                break;
            };
            let _done = TaskDone(self.receiver.shared.clone());

            match item {
                QueueItem::Sentinel => {
                    info!("sentinel received; stopping worker");
                    break;
                }
                QueueItem::Event(event) => self.process(event).await,
            }
        }
        self.stop();
    }

    async fn process(&self, event: BotEvent) {
        let event_type = event.kind().as_str();
        let message_id = event.message_id.clone().unwrap_or_default();
        let channel_id = event.channel_id.clone();
        let started = Instant::now();

        let processor = self.processor.clone();
        let task = tokio::spawn(async move { dispatch(processor.as_ref(), event).await });
        let _abort = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(Ok(())) => info!(
                event_type,
                channel_id = %channel_id,
                message_id = %message_id,
                duration_ms = started.elapsed().as_millis() as u64,
                "event processed"
            ),
            Ok(Err(failure)) => error!(
                event_type,
                channel_id = %channel_id,
                message_id = %message_id,
                error_kind = failure.kind(),
                error = %failure,
                "event processing failed; continuing"
            ),
            Err(join_error) if join_error.is_panic() => error!(
                event_type,
                channel_id = %channel_id,
                message_id = %message_id,
                "event processor panicked; continuing"
            ),
            Err(_) => warn!(
                event_type,
                channel_id = %channel_id,
                message_id = %message_id,
                "event processing cancelled"
            ),
        }
    }

    fn stop(&mut self) {
        self.receiver.receiver.close();
        let mut discarded = 0_usize;
        while let Some(_item) = self.receiver.try_next() {
            self.receiver.shared.task_done();
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "events arrived after the sentinel and were dropped");
        }
        self.receiver.shared.state.send_replace(WorkerState::Stopped);
        info!("event worker stopped");
    }
}
