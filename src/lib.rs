//! Workspace umbrella crate.
//!
//! Re-exports the playback session core so host applications can depend on
//! `media-session-workspace` alone instead of wiring `core-playback`,
//! `core-runtime`, and `bridge-traits` individually.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;
