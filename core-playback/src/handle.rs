//! # Session Handle
//!
//! Cloneable command surface of a running [`PlaybackSession`].
//!
//! Every command is sent to the session owner and resolves once it has been
//! carried out: immediately for commands that only touch the queue or fail
//! validation, and when the engine acknowledged the operation for transport
//! commands. On success the command yields the session state at that point.
//!
//! Dropping the last handle shuts the session down exactly as
//! [`SessionHandle::release`] would.
//!
//! [`PlaybackSession`]: crate::session::PlaybackSession

use crate::error::{PlaybackError, Result};
use crate::queue::MediaItem;
use core_runtime::events::{CoreEvent, EventBus, EventStream, SessionState};
use std::fmt;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Commands accepted by the session owner.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Play,
    Pause,
    Stop,
    /// Target position in milliseconds; may be negative.
    Seek(i64),
    Next,
    Previous,
    Reset,
    SetQueue(Vec<MediaItem>),
    Insert { index: usize, items: Vec<MediaItem> },
    Remove(usize),
    Move { from: usize, to: usize },
    Release,
}

impl SessionCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SessionCommand::Play => "play",
            SessionCommand::Pause => "pause",
            SessionCommand::Stop => "stop",
            SessionCommand::Seek(_) => "seek",
            SessionCommand::Next => "next",
            SessionCommand::Previous => "previous",
            SessionCommand::Reset => "reset",
            SessionCommand::SetQueue(_) => "set_queue",
            SessionCommand::Insert { .. } => "insert",
            SessionCommand::Remove(_) => "remove",
            SessionCommand::Move { .. } => "move",
            SessionCommand::Release => "release",
        }
    }
}

pub(crate) type Reply = oneshot::Sender<Result<SessionState>>;

pub(crate) enum Inbound {
    Command {
        command: SessionCommand,
        reply: Reply,
    },
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub state: SessionState,
    pub position: Duration,
    pub duration: Duration,
    pub buffered_position: Duration,
    pub buffered_percentage: u8,
    pub current_index: Option<usize>,
    pub current_item: Option<MediaItem>,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Inbound>,
    events: EventBus,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Inbound>, events: EventBus) -> Self {
        Self { commands, events }
    }

    /// Start or resume playback of the current item (the first one if
    /// nothing is selected).
    ///
    /// # Errors
    ///
    /// `EmptyQueue`, `FocusDenied`, `InvalidState` from `Error`.
    pub async fn play(&self) -> Result<SessionState> {
        self.send(SessionCommand::Play).await
    }

    /// # Errors
    ///
    /// `InvalidState` unless playing or buffering.
    pub async fn pause(&self) -> Result<SessionState> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn stop(&self) -> Result<SessionState> {
        self.send(SessionCommand::Stop).await
    }

    /// Seek within the current item. The position is clamped to
    /// `[0, duration]`.
    ///
    /// # Errors
    ///
    /// `NotReady` while stopped, `InvalidState` from `Ended` or `Error`.
    pub async fn seek(&self, position_ms: i64) -> Result<SessionState> {
        self.send(SessionCommand::Seek(position_ms)).await
    }

    pub async fn next(&self) -> Result<SessionState> {
        self.send(SessionCommand::Next).await
    }

    pub async fn previous(&self) -> Result<SessionState> {
        self.send(SessionCommand::Previous).await
    }

    /// Stop and clear the queue. Also leaves the `Error` state.
    pub async fn reset(&self) -> Result<SessionState> {
        self.send(SessionCommand::Reset).await
    }

    /// Replace the queue, stopping any live playback first.
    pub async fn set_queue(&self, items: Vec<MediaItem>) -> Result<SessionState> {
        self.send(SessionCommand::SetQueue(items)).await
    }

    pub async fn insert_items(&self, index: usize, items: Vec<MediaItem>) -> Result<SessionState> {
        self.send(SessionCommand::Insert { index, items }).await
    }

    pub async fn remove_item(&self, index: usize) -> Result<SessionState> {
        self.send(SessionCommand::Remove(index)).await
    }

    pub async fn move_item(&self, from: usize, to: usize) -> Result<SessionState> {
        self.send(SessionCommand::Move { from, to }).await
    }

    /// Tear the session down: timers, engine and audio focus. Every later
    /// command fails with `Disposed`.
    pub async fn release(&self) -> Result<SessionState> {
        self.send(SessionCommand::Release).await
    }

    pub async fn snapshot(&self) -> Result<PlaybackSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Inbound::Snapshot(reply))
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)
    }

    /// Raw subscription to session notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Filterable subscription to session notifications.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    async fn send(&self, command: SessionCommand) -> Result<SessionState> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Inbound::Command { command, reply })
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)?
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}
