//! # Playback Session Demo
//!
//! Drives a playback session against a console engine that pretends to play
//! each source for a few seconds, printing every session notification.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    EngineEvent, EngineEventSink, EngineSample, EngineState, LoadRequest, MediaSource,
    PlaybackEngine,
};
use core_playback::{MediaItem, MediaMetadata, PlaybackSession, PlaybackSettings, Result};
use core_runtime::config::SessionConfig;
use core_runtime::events::{CoreEvent, EventSeverity};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TRACK_LENGTH: Duration = Duration::from_secs(4);

// ============================================================================
// Console Engine
// ============================================================================

#[derive(Default)]
struct Timeline {
    sources: Vec<MediaSource>,
    index: usize,
    position: Duration,
    playing: bool,
    sink: Option<Arc<dyn EngineEventSink>>,
}

/// Engine that "plays" by advancing a clock every 100 ms.
#[derive(Clone, Default)]
struct ConsoleEngine {
    timeline: Arc<Mutex<Timeline>>,
}

impl ConsoleEngine {
    fn start_clock(&self) {
        let timeline = Arc::clone(&self.timeline);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                let mut t = timeline.lock().unwrap();
                if !t.playing {
                    continue;
                }
                t.position += Duration::from_millis(100);
                if t.position < TRACK_LENGTH {
                    continue;
                }

                t.position = Duration::ZERO;
                let sink = t.sink.clone();
                let event = if t.index + 1 < t.sources.len() {
                    t.index += 1;
                    EngineEvent::PositionDiscontinuity {
                        timeline_index: t.index,
                    }
                } else {
                    t.playing = false;
                    EngineEvent::StateChanged(EngineState::Ended)
                };
                drop(t);

                if let Some(sink) = sink {
                    sink.emit(event);
                }
            }
        });
    }

    fn emit(&self, event: EngineEvent) {
        let sink = self.timeline.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }
}

#[async_trait::async_trait]
impl PlaybackEngine for ConsoleEngine {
    async fn load(&self, request: LoadRequest, events: Arc<dyn EngineEventSink>) -> BridgeResult<()> {
        println!("   🔌 engine: load {} sources at #{}", request.sources.len(), request.start_index);
        let mut t = self.timeline.lock().unwrap();
        t.sources = request.sources;
        t.index = request.start_index;
        t.position = request.start_position;
        t.playing = false;
        t.sink = Some(events);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.timeline.lock().unwrap().playing = true;
        self.emit(EngineEvent::StateChanged(EngineState::Buffering));
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.emit(EngineEvent::StateChanged(EngineState::Ready));
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.timeline.lock().unwrap().playing = false;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        let mut t = self.timeline.lock().unwrap();
        t.playing = false;
        t.sink = None;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.timeline.lock().unwrap().position = position;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        println!("   🔈 engine: volume {:.1}", volume);
        Ok(())
    }

    async fn insert_sources(&self, index: usize, sources: Vec<MediaSource>) -> BridgeResult<()> {
        let mut t = self.timeline.lock().unwrap();
        let at = index.min(t.sources.len());
        let tail = t.sources.split_off(at);
        t.sources.extend(sources);
        t.sources.extend(tail);
        Ok(())
    }

    async fn remove_source(&self, index: usize) -> BridgeResult<()> {
        let mut t = self.timeline.lock().unwrap();
        if index < t.sources.len() {
            t.sources.remove(index);
        }
        Ok(())
    }

    async fn move_source(&self, from: usize, to: usize) -> BridgeResult<()> {
        let mut t = self.timeline.lock().unwrap();
        let source = t.sources.remove(from);
        t.sources.insert(to, source);
        Ok(())
    }

    async fn replace_sources(&self, sources: Vec<MediaSource>) -> BridgeResult<()> {
        self.timeline.lock().unwrap().sources = sources;
        Ok(())
    }

    async fn release(&self) -> BridgeResult<()> {
        println!("   🧹 engine: released");
        Ok(())
    }

    fn sample(&self) -> EngineSample {
        let t = self.timeline.lock().unwrap();
        EngineSample {
            position: t.position,
            duration: TRACK_LENGTH,
            buffered_position: TRACK_LENGTH,
            buffered_percentage: 100,
        }
    }
}

// ============================================================================
// Demo
// ============================================================================

fn track(n: usize, title: &str) -> MediaItem {
    MediaItem::from_uri(format!("https://media.example.com/demo/{n}.mp3")).with_metadata(
        MediaMetadata {
            title: Some(title.to_string()),
            artist: Some("Demo Ensemble".to_string()),
            album: None,
        },
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))
        .map_err(|err| core_playback::PlaybackError::Config(err.to_string()))?;

    println!("🎵 Playback Session Demo\n");

    let engine = ConsoleEngine::default();
    engine.start_clock();

    let config = SessionConfig::builder()
        .engine(Arc::new(engine))
        .build()
        .map_err(|err| core_playback::PlaybackError::Config(err.to_string()))?;
    let session = PlaybackSession::spawn(config, PlaybackSettings::responsive()).await?;

    let mut events = session.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let marker = match event.severity() {
                EventSeverity::Error => "❌",
                EventSeverity::Warning => "⚠️ ",
                EventSeverity::Info => "📣",
                EventSeverity::Debug => "  ",
            };
            match &event {
                CoreEvent::Session(inner) => println!("{marker} {inner:?}"),
                CoreEvent::Queue(inner) => println!("{marker} {inner:?}"),
                CoreEvent::Focus(inner) => println!("{marker} {inner:?}"),
            }
        }
    });

    session
        .set_queue(vec![track(1, "Overture"), track(2, "Interlude")])
        .await?;
    session.insert_items(2, vec![track(3, "Finale")]).await?;

    println!("\n▶️  play -> {}", session.play().await?);
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("\n⏸️  pause -> {}", session.pause().await?);
    let snapshot = session.snapshot().await?;
    println!(
        "   position {:.1}s of {:.1}s on #{:?}",
        snapshot.position.as_secs_f64(),
        snapshot.duration.as_secs_f64(),
        snapshot.current_index
    );

    println!("\n⏩ seek -> {}", session.seek(3_500).await?);
    println!("▶️  play -> {}", session.play().await?);
    tokio::time::sleep(Duration::from_secs(10)).await;

    println!("\n⏹️  release -> {}", session.release().await?);
    println!("\n🎉 Demo completed successfully!");

    Ok(())
}
