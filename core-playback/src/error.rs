//! # Playback Error Types
//!
//! Errors returned by session commands and the components behind them.

use bridge_traits::BridgeError;
use core_runtime::events::SessionState;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Command Errors
    // ========================================================================
    /// Transport command issued before anything was loaded into the backend.
    #[error("Backend not ready: nothing loaded")]
    NotReady,

    /// The session or backend was released.
    #[error("Playback session has been released")]
    Disposed,

    /// Command not valid in the current session state.
    #[error("Cannot {command} while {state}")]
    InvalidState {
        state: SessionState,
        command: &'static str,
    },

    /// `Play()` with nothing to play.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Queue index outside the valid range.
    #[error("Queue index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// The host refused audio focus.
    #[error("Audio focus request denied")]
    FocusDenied,

    /// The command was superseded by a later Stop, Release or reload before
    /// the backend acknowledged it.
    #[error("Command cancelled before the backend settled")]
    Cancelled,

    /// The session owner task is gone.
    #[error("Playback session is no longer running")]
    SessionClosed,

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// A queue edit could not be mirrored to the backend timeline.
    #[error("Queue sync failed: {0}")]
    QueueSyncFailed(String),

    /// The engine reported a failure.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// A host bridge call failed outside of command execution.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Playback settings failed validation.
    #[error("Invalid playback settings: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Returns `true` if the session is still usable after this error and the
    /// caller may simply retry or issue another command.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackError::Disposed | PlaybackError::SessionClosed | PlaybackError::Config(_)
        )
    }

    /// Returns `true` if this error originates from the host engine.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::BackendError(_)
                | PlaybackError::QueueSyncFailed(_)
                | PlaybackError::Bridge(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
