//! Playback engine bridge trait and supporting types.
//!
//! The core playback session never decodes or renders audio itself. It drives a
//! host-provided [`PlaybackEngine`] (ExoPlayer, AVPlayer, GStreamer, a web
//! `<audio>` element...) through the narrow contract defined here: load a
//! timeline of sources, toggle play/pause, seek, edit the timeline in place,
//! and report state changes back through an [`EngineEventSink`].
//!
//! Engines may emit events from any thread. The core stamps every sink it hands
//! out so that events belonging to a timeline that has since been replaced are
//! recognised as stale and dropped.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Opaque description of a playable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    /// Remote or local URI. Headers are attached to every HTTP request the
    /// engine issues for this source.
    Uri {
        uri: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// File on the host filesystem.
    LocalFile { path: PathBuf },
    /// Host-defined handle (content provider id, asset catalog key, ...).
    Handle { handle: u64 },
}

impl MediaSource {
    /// Create a URI source without request headers.
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri {
            uri: uri.into(),
            headers: HashMap::new(),
        }
    }

    /// Create a URI source carrying request headers.
    pub fn uri_with_headers(uri: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self::Uri {
            uri: uri.into(),
            headers,
        }
    }

    /// Whether the engine has to reach the network to play this source.
    pub fn is_remote(&self) -> bool {
        match self {
            Self::Uri { uri, .. } => uri.starts_with("http://") || uri.starts_with("https://"),
            _ => false,
        }
    }

    /// Request headers for URI sources.
    pub fn headers(&self) -> Option<&HashMap<String, String>> {
        match self {
            Self::Uri { headers, .. } => Some(headers),
            _ => None,
        }
    }

    /// Short human-readable locator, safe to log (headers are never included).
    pub fn locator(&self) -> String {
        match self {
            Self::Uri { uri, .. } => uri.clone(),
            Self::LocalFile { path } => path.display().to_string(),
            Self::Handle { handle } => format!("handle:{handle}"),
        }
    }
}

/// Coarse engine state as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// Nothing loaded, or the engine was stopped.
    Idle,
    /// Loading or rebuffering; playback cannot make progress yet.
    Buffering,
    /// Enough data is available to play immediately.
    Ready,
    /// The last item of the timeline finished.
    Ended,
}

/// Event pushed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    /// The engine moved to another timeline entry on its own (auto-advance,
    /// removal of the playing entry).
    PositionDiscontinuity { timeline_index: usize },
    /// Unrecoverable playback failure.
    Error { cause: String },
    /// Push-style buffering progress, for engines that report it.
    BufferedUpdate { percentage: u8 },
}

/// Receiver for [`EngineEvent`]s.
///
/// Must be callable from any thread; implementations never block.
pub trait EngineEventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Point-in-time position readout taken from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSample {
    /// Playback position within the current item.
    pub position: Duration,
    /// Duration of the current item. Zero when unknown.
    pub duration: Duration,
    /// Position up to which data is buffered.
    pub buffered_position: Duration,
    /// Buffered share of the current item, `0..=100`.
    pub buffered_percentage: u8,
}

/// Timeline handed to [`PlaybackEngine::load`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Every source of the queue, in queue order.
    pub sources: Vec<MediaSource>,
    /// Timeline entry to start from.
    pub start_index: usize,
    /// Position within the start entry.
    pub start_position: Duration,
}

impl LoadRequest {
    pub fn new(sources: Vec<MediaSource>, start_index: usize) -> Self {
        Self {
            sources,
            start_index,
            start_position: Duration::ZERO,
        }
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }
}

/// Host playback engine.
///
/// Calls are issued one at a time from a single worker task, so
/// implementations never see overlapping commands. Completion of a call means
/// the engine accepted it; observable effects (readiness, end of media) are
/// reported asynchronously through the sink passed to [`load`](Self::load).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{EngineEventSink, LoadRequest, PlaybackEngine};
///
/// async fn start(engine: &dyn PlaybackEngine, request: LoadRequest, sink: Arc<dyn EngineEventSink>) -> Result<()> {
///     engine.load(request, sink).await?;
///     engine.play().await
/// }
/// ```
#[async_trait::async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Replace the whole timeline and prepare playback of `request.start_index`.
    ///
    /// Events for this timeline must be delivered to `events`; the sink of a
    /// previous load must no longer be used.
    async fn load(&self, request: LoadRequest, events: Arc<dyn EngineEventSink>) -> Result<()>;

    /// Start or resume playback once ready.
    async fn play(&self) -> Result<()>;

    /// Pause without dropping buffered data.
    async fn pause(&self) -> Result<()>;

    /// Stop playback and drop the loaded timeline.
    async fn stop(&self) -> Result<()>;

    /// Seek within the current timeline entry.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Set output volume, `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Insert sources into the loaded timeline before `index`.
    async fn insert_sources(&self, index: usize, sources: Vec<MediaSource>) -> Result<()>;

    /// Remove one timeline entry.
    async fn remove_source(&self, index: usize) -> Result<()>;

    /// Move one timeline entry so that it ends up at `to`.
    async fn move_source(&self, from: usize, to: usize) -> Result<()>;

    /// Replace the loaded timeline without interrupting the playing entry
    /// when it is still present.
    async fn replace_sources(&self, sources: Vec<MediaSource>) -> Result<()>;

    /// Free every native resource. No other call follows.
    async fn release(&self) -> Result<()>;

    /// Read the current position and buffering progress.
    fn sample(&self) -> EngineSample;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_source_reports_remote() {
        assert!(MediaSource::uri("https://cdn.example.com/a.mp3").is_remote());
        assert!(!MediaSource::uri("content://media/42").is_remote());
        assert!(!MediaSource::LocalFile {
            path: PathBuf::from("/music/a.flac")
        }
        .is_remote());
    }

    #[test]
    fn locator_never_includes_headers() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        let source = MediaSource::uri_with_headers("https://cdn.example.com/a.mp3", headers);

        assert_eq!(source.locator(), "https://cdn.example.com/a.mp3");
        assert_eq!(
            source.headers().and_then(|h| h.get("Authorization")),
            Some(&"Bearer abc".to_string())
        );
        assert_eq!(MediaSource::Handle { handle: 7 }.locator(), "handle:7");
    }

    #[test]
    fn uri_source_deserializes_without_headers() {
        let source: MediaSource =
            serde_json::from_str(r#"{"Uri":{"uri":"https://cdn.example.com/a.mp3"}}"#).unwrap();
        assert_eq!(source, MediaSource::uri("https://cdn.example.com/a.mp3"));
    }

    #[test]
    fn load_request_defaults_to_item_start() {
        let request = LoadRequest::new(vec![MediaSource::uri("a")], 0);
        assert_eq!(request.start_position, Duration::ZERO);

        let request = request.with_start_position(Duration::from_secs(3));
        assert_eq!(request.start_position, Duration::from_secs(3));
    }
}
