//! # Playback Session Core
//!
//! Coordinates a native playback engine, a mutable media queue, host audio
//! focus and periodic status reporting behind a single session state machine.
//!
//! ## Overview
//!
//! - [`queue`]: ordered media items with a current-item cursor
//! - [`queue_editor`]: mirrors queue edits onto the engine timeline
//! - [`backend`]: serialises engine calls and stamps engine events with a
//!   load generation
//! - [`poller`]: position and buffering timers
//! - [`focus`]: audio focus requests and reactions to focus changes
//! - [`session`] / [`handle`]: the owner task and its command surface
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{MediaItem, PlaybackSession, PlaybackSettings};
//! use core_runtime::config::SessionConfig;
//!
//! let config = SessionConfig::builder().engine(engine).build()?;
//! let session = PlaybackSession::spawn(config, PlaybackSettings::default()).await?;
//!
//! session.set_queue(vec![MediaItem::from_uri("https://example.com/a.mp3")]).await?;
//! session.play().await?;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod focus;
pub mod handle;
pub mod poller;
pub mod queue;
pub mod queue_editor;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{NavigationMode, PlaybackSettings};
pub use error::{PlaybackError, Result};
pub use handle::{PlaybackSnapshot, SessionHandle};
pub use queue::{ItemId, MediaItem, MediaMetadata, MediaQueue};
pub use session::PlaybackSession;
