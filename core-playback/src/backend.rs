//! # Backend Adapter
//!
//! Owns the host [`PlaybackEngine`] and serialises every call to it.
//!
//! ## Overview
//!
//! The session owner never awaits the engine directly. Each operation is
//! submitted as a job to a dedicated worker task, which executes jobs strictly
//! in submission order and reports completion back to the owner as a
//! [`SessionMessage::Settled`]. The owner keeps handling commands and events
//! while the engine works.
//!
//! ```text
//! owner ──submit(job)──> worker ──await──> PlaybackEngine
//!   ^                      │
//!   └────── Settled ───────┘
//! ```
//!
//! ## Generations
//!
//! Every load, stop and release starts a new generation. Engine events are
//! stamped with the generation of the load that produced them (through a
//! [`GenerationSink`]) and job completions carry the generation they were
//! submitted under, so the owner can recognise and drop anything that belongs
//! to a timeline it has already abandoned.

use crate::error::{PlaybackError, Result};
use crate::queue::QueueDiff;
use crate::session::SessionMessage;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, EngineEvent, EngineEventSink, EngineSample, LoadRequest, MediaSource,
    PlaybackEngine,
};
use core_runtime::logging::redact_headers;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Identifies one submitted backend job.
pub type Ticket = u64;

/// Lifecycle of the backend as seen by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    /// No timeline loaded in the current generation.
    Unloaded,
    /// A load was submitted in the current generation.
    Loaded,
    /// The engine was released; no further jobs are accepted.
    Released,
}

/// Incremental edit of the loaded timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEdit {
    Insert {
        index: usize,
        sources: Vec<MediaSource>,
    },
    Remove {
        index: usize,
    },
    Move {
        from: usize,
        to: usize,
    },
    Replace {
        sources: Vec<MediaSource>,
    },
}

impl From<&QueueDiff> for TimelineEdit {
    fn from(diff: &QueueDiff) -> Self {
        match diff {
            QueueDiff::Inserted { index, sources } => TimelineEdit::Insert {
                index: *index,
                sources: sources.clone(),
            },
            QueueDiff::Removed { index } => TimelineEdit::Remove { index: *index },
            QueueDiff::Moved { from, to } => TimelineEdit::Move {
                from: *from,
                to: *to,
            },
            QueueDiff::Replaced { sources } => TimelineEdit::Replace {
                sources: sources.clone(),
            },
        }
    }
}

enum BackendOp {
    Load {
        request: LoadRequest,
        events: Arc<dyn EngineEventSink>,
    },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
    Edit(TimelineEdit),
    Release,
}

impl BackendOp {
    fn name(&self) -> &'static str {
        match self {
            BackendOp::Load { .. } => "load",
            BackendOp::Play => "play",
            BackendOp::Pause => "pause",
            BackendOp::Stop => "stop",
            BackendOp::Seek(_) => "seek",
            BackendOp::SetVolume(_) => "set_volume",
            BackendOp::Edit(_) => "edit",
            BackendOp::Release => "release",
        }
    }
}

struct BackendJob {
    ticket: Ticket,
    generation: u64,
    op: BackendOp,
}

/// Sink handed to the engine on load; stamps events with the load generation.
struct GenerationSink {
    generation: u64,
    outbox: mpsc::UnboundedSender<SessionMessage>,
}

impl EngineEventSink for GenerationSink {
    fn emit(&self, event: EngineEvent) {
        let message = SessionMessage::Engine {
            generation: self.generation,
            event,
        };
        if self.outbox.send(message).is_err() {
            trace!(generation = self.generation, "session gone; engine event dropped");
        }
    }
}

/// Owner-side handle on the engine worker.
pub struct BackendAdapter {
    engine: Arc<dyn PlaybackEngine>,
    jobs: mpsc::UnboundedSender<BackendJob>,
    outbox: mpsc::UnboundedSender<SessionMessage>,
    status: BackendStatus,
    generation: u64,
    next_ticket: Ticket,
}

impl BackendAdapter {
    /// Spawn the engine worker. Completions and engine events are delivered
    /// to `outbox`.
    pub(crate) fn spawn(
        engine: Arc<dyn PlaybackEngine>,
        outbox: mpsc::UnboundedSender<SessionMessage>,
    ) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(Arc::clone(&engine), queue, outbox.clone()));

        Self {
            engine,
            jobs,
            outbox,
            status: BackendStatus::Unloaded,
            generation: 0,
            next_ticket: 1,
        }
    }

    pub fn status(&self) -> BackendStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.status == BackendStatus::Loaded
    }

    /// Replace the engine timeline. Starts a new generation.
    pub fn load(&mut self, request: LoadRequest) -> Result<Ticket> {
        self.ensure_alive()?;
        self.generation += 1;
        self.status = BackendStatus::Loaded;

        debug!(
            generation = self.generation,
            sources = request.sources.len(),
            start_index = request.start_index,
            start_ms = request.start_position.as_millis() as u64,
            headers = ?start_headers(&request),
            "loading timeline"
        );

        let events: Arc<dyn EngineEventSink> = Arc::new(GenerationSink {
            generation: self.generation,
            outbox: self.outbox.clone(),
        });
        self.submit(BackendOp::Load { request, events })
    }

    pub fn play(&mut self) -> Result<Ticket> {
        self.ensure_loaded()?;
        self.submit(BackendOp::Play)
    }

    pub fn pause(&mut self) -> Result<Ticket> {
        self.ensure_loaded()?;
        self.submit(BackendOp::Pause)
    }

    pub fn seek(&mut self, position: Duration) -> Result<Ticket> {
        self.ensure_loaded()?;
        self.submit(BackendOp::Seek(position))
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<Ticket> {
        self.ensure_alive()?;
        self.submit(BackendOp::SetVolume(volume))
    }

    /// Apply an incremental edit to the loaded timeline.
    pub fn edit(&mut self, edit: TimelineEdit) -> Result<Ticket> {
        self.ensure_loaded()?;
        self.submit(BackendOp::Edit(edit))
    }

    /// Stop and drop the timeline. Starts a new generation.
    pub fn stop(&mut self) -> Result<Ticket> {
        self.ensure_alive()?;
        self.generation += 1;
        self.status = BackendStatus::Unloaded;
        self.submit(BackendOp::Stop)
    }

    /// Release the engine. Every later call fails with `Disposed`.
    pub fn release(&mut self) -> Result<Ticket> {
        self.ensure_alive()?;
        self.generation += 1;
        let ticket = self.submit(BackendOp::Release)?;
        self.status = BackendStatus::Released;
        Ok(ticket)
    }

    /// Current position readout. `NotReady` while nothing is loaded.
    pub fn sample(&self) -> Result<EngineSample> {
        self.ensure_loaded()?;
        Ok(self.engine.sample())
    }

    fn ensure_alive(&self) -> Result<()> {
        match self.status {
            BackendStatus::Released => Err(PlaybackError::Disposed),
            _ => Ok(()),
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        match self.status {
            BackendStatus::Loaded => Ok(()),
            BackendStatus::Unloaded => Err(PlaybackError::NotReady),
            BackendStatus::Released => Err(PlaybackError::Disposed),
        }
    }

    fn submit(&mut self, op: BackendOp) -> Result<Ticket> {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        trace!(ticket, generation = self.generation, op = op.name(), "submitting backend job");

        self.jobs
            .send(BackendJob {
                ticket,
                generation: self.generation,
                op,
            })
            .map_err(|_| {
                PlaybackError::Bridge(BridgeError::NotAvailable(
                    "engine worker stopped".to_string(),
                ))
            })?;

        Ok(ticket)
    }
}

impl fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("next_ticket", &self.next_ticket)
            .finish()
    }
}

async fn run_worker(
    engine: Arc<dyn PlaybackEngine>,
    mut jobs: mpsc::UnboundedReceiver<BackendJob>,
    outbox: mpsc::UnboundedSender<SessionMessage>,
) {
    let mut released = false;

    while let Some(BackendJob {
        ticket,
        generation,
        op,
    }) = jobs.recv().await
    {
        let name = op.name();
        released = matches!(op, BackendOp::Release);

        let result = execute(engine.as_ref(), op).await;
        if let Err(err) = &result {
            warn!(ticket, generation, op = name, error = %err, "engine call failed");
        }

        let settled = SessionMessage::Settled {
            ticket,
            generation,
            result,
        };
        if outbox.send(settled).is_err() {
            trace!(ticket, "session gone; completion dropped");
        }

        if released {
            break;
        }
    }

    if !released {
        debug!("backend adapter dropped without release; releasing engine");
        if let Err(err) = engine.release().await {
            warn!(error = %err, "engine release failed");
        }
    }
}

async fn execute(engine: &dyn PlaybackEngine, op: BackendOp) -> BridgeResult<()> {
    match op {
        BackendOp::Load { request, events } => engine.load(request, events).await,
        BackendOp::Play => engine.play().await,
        BackendOp::Pause => engine.pause().await,
        BackendOp::Stop => engine.stop().await,
        BackendOp::Seek(position) => engine.seek(position).await,
        BackendOp::SetVolume(volume) => engine.set_volume(volume).await,
        BackendOp::Edit(TimelineEdit::Insert { index, sources }) => {
            engine.insert_sources(index, sources).await
        }
        BackendOp::Edit(TimelineEdit::Remove { index }) => engine.remove_source(index).await,
        BackendOp::Edit(TimelineEdit::Move { from, to }) => engine.move_source(from, to).await,
        BackendOp::Edit(TimelineEdit::Replace { sources }) => {
            engine.replace_sources(sources).await
        }
        BackendOp::Release => engine.release().await,
    }
}

/// Request headers of the starting source, safe to log.
fn start_headers(request: &LoadRequest) -> Vec<(String, String)> {
    request
        .sources
        .get(request.start_index)
        .and_then(MediaSource::headers)
        .map(redact_headers)
        .unwrap_or_default()
}
