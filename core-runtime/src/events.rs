//! # Native Event Channel
//!
//! Carries engine status payloads from the host into the process using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The engine reports progress on named channels; single media items report
//! on [`UPDATED`]. Every payload embeds the identity key of the item or player
//! it concerns. The host adapter turns each native callback into an
//! [`EngineEvent`] and hands it to [`EventBus::emit`]; per-item listeners
//! subscribe and filter the shared stream down to what concerns them.
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐  subscribe  ┌───────────────┐
//! │ Host engine  ├──────────>│ EventBus  ├────────────>│ item listener │
//! │   adapter    │           │ (broadcast│             └───────────────┘
//! └──────────────┘           │  channel) │  subscribe  ┌───────────────┐
//!                            │           ├────────────>│ player listen │
//!                            └───────────┘             └───────────────┘
//! ```
//!
//! Delivery order across keys is whatever order the host emitted in; nothing
//! here ties payloads to lifecycle transitions.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EngineEvent, EventBus, EventStream};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = EventStream::new(bus.subscribe()).filter(|event| event.key == 3);
//!
//! bus.emit(EngineEvent::updated(1, "PLAYING")).ok();
//! bus.emit(EngineEvent::updated(3, "STALLED").with_field("position", 4.5)).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.status.as_deref(), Some("STALLED"));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` payloads. Non-fatal.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event channel.
///
/// Position ticks arrive several times a second per active item; subscribers
/// that fall further behind than this receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Channel name used by single media items.
pub const UPDATED: &str = "updated";

/// One status payload emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Channel the payload was emitted on (e.g. [`UPDATED`]).
    pub name: String,
    /// Identity key of the item or player the payload concerns.
    pub key: u64,
    /// Engine status at emission time, when the channel carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Engine-defined fields (position, duration, rate, ...).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EngineEvent {
    pub fn new(name: impl Into<String>, key: u64) -> Self {
        Self {
            name: name.into(),
            key,
            status: None,
            fields: Map::new(),
        }
    }

    /// An [`UPDATED`] payload carrying `status`.
    pub fn updated(key: u64, status: impl Into<String>) -> Self {
        Self::new(UPDATED, key).with_status(status)
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_updated(&self) -> bool {
        self.name == UPDATED
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for engine payloads.
///
/// Clone it to hand out more producers; every `subscribe()` creates an
/// independent receiver that sees all future payloads.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` payloads per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a payload to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// nobody is listening (which callers are free to ignore).
    pub fn emit(&self, event: EngineEvent) -> Result<usize, SendError<EngineEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past payloads are not replayed.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&EngineEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter predicate.
pub struct EventStream {
    receiver: Receiver<EngineEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<EngineEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only payloads matching `predicate` will be returned by `recv()`.
    ///
    /// The predicate runs at receive time, not at emit time, so it may consult
    /// state that changed after the payload was emitted.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&EngineEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &EngineEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next payload that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` payloads.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<EngineEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching payload without waiting.
    ///
    /// Returns `None` if nothing matching is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<EngineEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
