//! Message event domain model
//!
//! Events represent occurrences in the message log: a message was inserted,
//! or a thread was marked read. They are broadcast to every connected inbox
//! session so each one can re-derive its views.
//!
//! ## Architecture
//!
//! The event system provides a multi-producer, multi-consumer event bus with:
//! - Unfiltered fan-out: every subscriber receives every event, and decides
//!   locally whether the event concerns its user (`MessageEvent::concerns`)
//! - Graceful shutdown with close state
//! - Lag recovery for slow consumers: a lagged receiver skips ahead rather
//!   than erroring out, and is expected to re-aggregate to catch up
//! - Streaming consumption with timeout handling

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::primitives::{WrappedChronoDateTime, WrappedUuidV4};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::timeout;
use tracing::{debug, trace};
use utoipa::ToSchema;

use super::message::Message;

// ============================================================================
// Event Types
// ============================================================================

/// Kinds of message events
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageEventKind {
    /// A new message was inserted into the log
    MessageInserted { message: Message },
    /// A user marked a whole thread as read
    ThreadRead {
        reader_id: WrappedUuidV4,
        counterpart_id: WrappedUuidV4,
    },
}

/// A message event with metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct MessageEvent {
    pub id: WrappedUuidV4,
    pub kind: MessageEventKind,
    pub created_at: WrappedChronoDateTime,
}

impl MessageEvent {
    /// Create a new event with the given kind
    pub fn new(kind: MessageEventKind) -> Self {
        Self {
            id: WrappedUuidV4::new(),
            kind,
            created_at: WrappedChronoDateTime::now(),
        }
    }

    /// Create a message inserted event
    pub fn message_inserted(message: Message) -> Self {
        Self::new(MessageEventKind::MessageInserted { message })
    }

    /// Create a thread read event
    pub fn thread_read(reader_id: WrappedUuidV4, counterpart_id: WrappedUuidV4) -> Self {
        Self::new(MessageEventKind::ThreadRead {
            reader_id,
            counterpart_id,
        })
    }

    /// Check whether this event involves the given user.
    ///
    /// Fan-out is unfiltered at the transport layer, so every subscriber sees
    /// every event; this is the subscriber-side relevance check.
    pub fn concerns(&self, user_id: &WrappedUuidV4) -> bool {
        match &self.kind {
            MessageEventKind::MessageInserted { message } => {
                &message.sender_id == user_id || &message.receiver_id == user_id
            }
            MessageEventKind::ThreadRead {
                reader_id,
                counterpart_id,
            } => reader_id == user_id || counterpart_id == user_id,
        }
    }
}

// ============================================================================
// Channel Types
// ============================================================================

/// Channel types for event broadcasting
pub type EventTx = broadcast::Sender<MessageEvent>;
pub type EventRx = broadcast::Receiver<MessageEvent>;

/// Create a new event broadcast channel
pub fn create_event_channel(capacity: usize) -> (EventTx, EventRx) {
    broadcast::channel(capacity)
}

/// Default capacity for event queues
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// EventQueue - Robust queue with close state and lag handling
// ============================================================================

/// Errors when dequeuing events
#[derive(Debug, thiserror::Error)]
pub enum DequeueError {
    #[error("Queue is empty")]
    QueueEmpty,
    #[error("Queue is closed")]
    QueueClosed,
}

/// An event queue with graceful shutdown and lag recovery
///
/// Each EventQueue wraps a broadcast channel and provides:
/// - Explicit close state for graceful shutdown
/// - Lag recovery for slow consumers
/// - `tap()` to create independent subscribers
pub struct EventQueue {
    sender: EventTx,
    receiver: Arc<Mutex<EventRx>>,
    is_closed: Arc<RwLock<bool>>,
}

impl EventQueue {
    /// Create a new EventQueue with specified capacity
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (sender, receiver) = broadcast::channel(capacity);
        trace!("EventQueue initialized with capacity {}", capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            is_closed: Arc::new(RwLock::new(false)),
        }
    }

    /// Create an EventQueue from an existing sender (for tapping)
    fn from_sender(sender: EventTx, is_closed: Arc<RwLock<bool>>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(sender.subscribe())),
            sender,
            is_closed,
        }
    }

    /// Enqueue an event to this queue
    pub async fn enqueue(
        &self,
        event: MessageEvent,
    ) -> Result<usize, broadcast::error::SendError<MessageEvent>> {
        if *self.is_closed.read().await {
            trace!("Queue closed, event not enqueued");
            return Ok(0);
        }
        trace!(event_id = %event.id, "Enqueuing event");
        self.sender.send(event)
    }

    /// Dequeue an event from the queue
    ///
    /// If `no_wait` is true, returns immediately with QueueEmpty if no events available.
    /// If `no_wait` is false, blocks until an event is available.
    pub async fn dequeue(&self, no_wait: bool) -> Result<MessageEvent, DequeueError> {
        let is_closed = *self.is_closed.read().await;
        let mut receiver = self.receiver.lock().await;

        if is_closed && receiver.is_empty() {
            trace!("Queue closed and empty");
            return Err(DequeueError::QueueClosed);
        }

        let event = if no_wait {
            match receiver.try_recv() {
                Ok(event) => event,
                Err(broadcast::error::TryRecvError::Empty) => return Err(DequeueError::QueueEmpty),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(DequeueError::QueueClosed);
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    // Recover from lag by trying again
                    match receiver.try_recv() {
                        Ok(event) => event,
                        Err(_) => return Err(DequeueError::QueueEmpty),
                    }
                }
            }
        } else {
            match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Closed) => return Err(DequeueError::QueueClosed),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Recover from lag by trying again
                    match receiver.recv().await {
                        Ok(event) => event,
                        Err(_) => return Err(DequeueError::QueueClosed),
                    }
                }
            }
        };

        trace!(event_id = %event.id, "Dequeued event");
        Ok(event)
    }

    /// Create a new subscriber to this queue
    pub fn tap(&self) -> EventQueue {
        trace!("Tapping EventQueue");
        EventQueue::from_sender(self.sender.clone(), self.is_closed.clone())
    }

    /// Close the queue for future events
    pub async fn close(&self) {
        trace!("Closing EventQueue");
        let mut is_closed = self.is_closed.write().await;
        *is_closed = true;
    }

    /// Check if the queue is closed
    pub async fn is_closed(&self) -> bool {
        *self.is_closed.read().await
    }

    /// Get the sender for publishing events directly
    pub fn sender(&self) -> EventTx {
        self.sender.clone()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventQueue {
    fn clone(&self) -> Self {
        // Clone creates a new subscriber (like tap)
        Self {
            sender: self.sender.clone(),
            receiver: Arc::new(Mutex::new(self.sender.subscribe())),
            is_closed: self.is_closed.clone(),
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

// ============================================================================
// EventConsumer - Streaming consumption with timeout handling
// ============================================================================

/// Consumer for reading events from a queue with streaming support
///
/// Provides convenient methods for consuming events:
/// - `consume_one()` - Non-blocking single event consumption
/// - `consume_one_blocking()` - Blocking single event consumption
/// - `consume_all()` - Async stream of events with timeout handling
pub struct EventConsumer {
    queue: EventQueue,
    timeout_duration: Duration,
}

impl EventConsumer {
    /// Create a new EventConsumer for the given queue
    pub fn new(queue: EventQueue) -> Self {
        trace!("EventConsumer initialized");
        Self {
            queue,
            timeout_duration: Duration::from_millis(500),
        }
    }

    /// Create a consumer with custom timeout
    pub fn with_timeout(queue: EventQueue, timeout: Duration) -> Self {
        Self {
            queue,
            timeout_duration: timeout,
        }
    }

    /// Consume one event from the queue (non-blocking)
    pub async fn consume_one(&self) -> Result<MessageEvent, DequeueError> {
        trace!("Consuming event (non-blocking)");
        self.queue.dequeue(true).await
    }

    /// Consume one event from the queue (blocking)
    pub async fn consume_one_blocking(&self) -> Result<MessageEvent, DequeueError> {
        trace!("Consuming event (blocking)");
        self.queue.dequeue(false).await
    }

    /// Consume all events as an async stream
    ///
    /// The stream yields events until the queue is closed.
    /// Uses timeout to periodically check for close state.
    pub fn consume_all(&self) -> impl Stream<Item = Result<MessageEvent, DequeueError>> + '_ {
        trace!("Starting consume_all stream");
        let queue = self.queue.clone();
        let timeout_duration = self.timeout_duration;

        async_stream::stream! {
            loop {
                match timeout(timeout_duration, queue.dequeue(false)).await {
                    Ok(Ok(event)) => {
                        trace!(event_id = %event.id, "Yielding event from stream");
                        yield Ok(event);
                    }
                    Ok(Err(DequeueError::QueueClosed)) => {
                        if queue.is_closed().await {
                            debug!("Queue closed, ending stream");
                            break;
                        }
                    }
                    Ok(Err(DequeueError::QueueEmpty)) => {
                        // Should not happen in blocking mode, but handle gracefully
                        continue;
                    }
                    Err(_) => {
                        // Timeout - check if we should continue
                        if queue.is_closed().await {
                            debug!("Queue closed during timeout, ending stream");
                            break;
                        }
                        continue;
                    }
                }
            }
        }
    }

    /// Get a reference to the underlying queue
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Close the underlying queue
    pub async fn close(&self) {
        self.queue.close().await;
    }
}

// ============================================================================
// EventBus - Main entry point for the event system
// ============================================================================

/// Multi-producer, multi-consumer event bus for message events
///
/// The EventBus is the main entry point for the event system. It provides
/// global event publishing and unfiltered subscriptions; relevance filtering
/// happens on the subscriber side.
#[derive(Clone)]
pub struct EventBus {
    tx: EventTx,
    is_closed: Arc<RwLock<bool>>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            is_closed: Arc::new(RwLock::new(false)),
        }
    }

    /// Get a sender handle for publishing events
    pub fn sender(&self) -> EventTx {
        self.tx.clone()
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> EventRx {
        self.tx.subscribe()
    }

    /// Create an EventQueue for this bus
    pub fn create_queue(&self) -> EventQueue {
        EventQueue::from_sender(self.tx.clone(), self.is_closed.clone())
    }

    /// Publish an event to all subscribers
    #[allow(clippy::result_large_err)]
    pub fn publish(
        &self,
        event: MessageEvent,
    ) -> Result<usize, broadcast::error::SendError<MessageEvent>> {
        self.tx.send(event)
    }

    /// Get the number of active subscribers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Close the event bus
    pub async fn close(&self) {
        let mut is_closed = self.is_closed.write().await;
        *is_closed = true;
    }

    /// Check if the event bus is closed
    pub async fn is_closed(&self) -> bool {
        *self.is_closed.read().await
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
