//! # Event Bus System
//!
//! Broadcasts playback session notifications to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`SessionEvent`] (state, progress, buffering, errors),
//!   [`QueueEvent`] (cursor and timeline sync) and [`FocusEvent`], wrapped in
//!   the top-level [`CoreEvent`]
//! - **EventBus**: Cloneable broadcast handle owned by the session
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Session owner    ├──────────────>│ EventBus  ├─────────────────>│ UI         │
//! │ (state, polling) │               │ (broadcast│                  └────────────┘
//! └──────────────────┘               │  channel) │     subscribe    ┌────────────┐
//!                                    │           ├─────────────────>│ Media notif│
//!                                    └───────────┘                  └────────────┘
//! ```
//!
//! Every event is emitted from the session owner task, so a single subscriber
//! observes events in the order the owner produced them.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent, SessionState};
//!
//! let event_bus = EventBus::new(64);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Session(SessionEvent::StateChanged {
//!         state: SessionState::Playing,
//!         current_item: None,
//!     }))
//!     .ok();
//!
//! assert!(matches!(subscriber.try_recv(), Ok(CoreEvent::Session(_))));
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; position updates are periodic and self-correcting.
//! - **`RecvError::Closed`**: the session was dropped.

use bridge_traits::focus::FocusState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// One second of position and buffering updates for a handful of sessions fits
/// comfortably.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session state, progress and errors
    Session(SessionEvent),
    /// Queue cursor and backend timeline sync
    Queue(QueueEvent),
    /// Audio focus changes reported by the host
    Focus(FocusEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Focus(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Queue(QueueEvent::SyncFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::StateChanged { .. }) => EventSeverity::Info,
            CoreEvent::Focus(FocusEvent::Changed {
                state: FocusState::LostPermanent,
            }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Externally visible state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Stopped,
    Playing,
    Paused,
    Buffering,
    Ended,
    Error,
}

impl SessionState {
    /// Playback was requested and has not been paused or stopped since.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Playing | SessionState::Buffering)
    }

    /// A backend timeline exists for this state.
    pub fn has_timeline(&self) -> bool {
        matches!(
            self,
            SessionState::Playing | SessionState::Buffering | SessionState::Paused
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Buffering => "buffering",
            SessionState::Ended => "ended",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Summary of the queue item a notification refers to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NowPlaying {
    /// Stable identifier of the queue item.
    pub item_id: String,
    /// Position of the item in the queue when the event was emitted.
    pub index: usize,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// Events produced by the session owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The session state or the current item changed.
    StateChanged {
        state: SessionState,
        current_item: Option<NowPlaying>,
    },
    /// Periodic position readout while playing.
    PositionChanged {
        /// Whole percent of the current item, `0..=100`.
        progress_pct: u8,
        position_ms: u64,
        duration_ms: u64,
    },
    /// Periodic buffering readout while the current item downloads.
    BufferingChanged {
        buffered_pct: u8,
        buffered_position_ms: u64,
    },
    /// The backend failed; the session is now in [`SessionState::Error`].
    Error { cause: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::StateChanged { .. } => "Session state changed",
            SessionEvent::PositionChanged { .. } => "Playback position updated",
            SessionEvent::BufferingChanged { .. } => "Buffering progress updated",
            SessionEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Queue contents or cursor changed.
    Changed {
        len: usize,
        current_index: Option<usize>,
    },
    /// A queue edit could not be mirrored to the backend timeline. The next
    /// edit or load resends the whole queue.
    SyncFailed { message: String },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Changed { .. } => "Queue changed",
            QueueEvent::SyncFailed { .. } => "Queue sync with backend failed",
        }
    }
}

// ============================================================================
// Focus Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FocusEvent {
    Changed { state: FocusState },
}

impl FocusEvent {
    fn description(&self) -> &str {
        match self {
            FocusEvent::Changed { .. } => "Audio focus changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for session notifications.
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    /// A bus with [`DEFAULT_EVENT_BUFFER_SIZE`] slots per subscriber.
    fn default() -> Self {
        EventBus::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus({} subscribers)", self.sender.receiver_count())
    }
}

// ============================================================================
// Filtered Receiver
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscriber that silently skips events rejected by its predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let queue_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Queue(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        EventStream {
            receiver,
            predicate: None,
        }
    }

    /// Keep only events for which `predicate` returns `true`.
    pub fn filter(self, predicate: impl Fn(&CoreEvent) -> bool + Send + Sync + 'static) -> Self {
        EventStream {
            predicate: Some(Box::new(predicate)),
            ..self
        }
    }

    fn wanted(&self, event: &CoreEvent) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(event),
            None => true,
        }
    }

    /// Waits for the next wanted event.
    ///
    /// Lag and closure are reported exactly as `broadcast::Receiver` reports
    /// them.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        let mut event = self.receiver.recv().await?;
        while !self.wanted(&event) {
            event = self.receiver.recv().await?;
        }
        Ok(event)
    }

    /// Drains unwanted events and returns the first wanted one already
    /// queued, or `None` when the queue runs dry.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
                Err(TryRecvError::Lagged(skipped)) => {
                    return Some(Err(RecvError::Lagged(skipped)))
                }
            };
            if self.wanted(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
