//! # Host Bridge Traits
//!
//! Contracts between the playback session core and the host platform.
//!
//! ## Overview
//!
//! The core owns queue bookkeeping, command sequencing and status polling. The
//! actual audio engine, the platform's audio focus arbitration and the host log
//! pipeline are supplied by the embedding application through the traits in
//! this crate.
//!
//! ## Traits
//!
//! - [`PlaybackEngine`](playback::PlaybackEngine) - Load a timeline, play, pause, seek, edit in place
//! - [`EngineEventSink`](playback::EngineEventSink) - Engine-to-core event channel
//! - [`AudioFocusHost`](focus::AudioFocusHost) - Request/abandon focus, observe focus changes
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! A session refuses to start without an engine, and refuses to enable audio
//! focus handling without a focus host:
//!
//! ```ignore
//! let config = SessionConfig::builder()
//!     .engine(Arc::new(MyEngine::new()))
//!     .build()?; // CapabilityMissing when the engine is absent
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! between the session owner task and the engine worker task.

pub mod error;
pub mod focus;
pub mod log;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use focus::{AudioFocusHost, FocusChangeStream, FocusGrant, FocusState, UnarbitratedFocus};
pub use log::{LogEntry, LogLevel, LoggerSink};
pub use playback::{
    EngineEvent, EngineEventSink, EngineSample, EngineState, LoadRequest, MediaSource,
    PlaybackEngine,
};
