//! # Playback Session
//!
//! The session owner: a single task holding the queue, the backend adapter,
//! the focus coordinator and the status poller, and the only place where the
//! [`SessionState`] changes.
//!
//! ## Message flow
//!
//! ```text
//! SessionHandle ──Inbound──┐
//!                          v
//! engine events ──┐   ┌─────────┐   submit   ┌────────────────┐
//! focus changes ──┼──>│  owner  │──────────> │ backend worker │
//! timer ticks   ──┘   └─────────┘ <───────── └────────────────┘
//!                          │         Settled
//!                          v
//!                      EventBus
//! ```
//!
//! Commands, engine events, focus changes, timer ticks and backend
//! completions are all handled one at a time by the owner, so no state
//! transition ever races another. Internal messages are drained before the
//! next command is taken.
//!
//! ## Generations
//!
//! Load, stop and release start a new backend generation. Engine events and
//! completions from an older generation are dropped, and commands still
//! waiting on one resolve with `Cancelled`.

use crate::backend::{BackendAdapter, Ticket};
use crate::config::PlaybackSettings;
use crate::error::{PlaybackError, Result};
use crate::focus::{AudioFocusCoordinator, FocusAction};
use crate::handle::{Inbound, PlaybackSnapshot, Reply, SessionCommand, SessionHandle};
use crate::poller::{StatusPoller, TimerKind};
use crate::queue::{MediaItem, MediaQueue, QueueDiff};
use crate::queue_editor::{EditSettlement, QueueEditor};
use bridge_traits::{
    AudioFocusHost, BridgeError, EngineEvent, EngineState, FocusChangeStream, FocusState,
    LoadRequest, UnarbitratedFocus,
};
use core_runtime::config::SessionConfig;
use core_runtime::events::{
    CoreEvent, EventBus, FocusEvent, QueueEvent, SessionEvent, SessionState,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, instrument, trace, warn};

/// Internal messages marshalled onto the owner task.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    /// Engine event, stamped with the load generation that produced it.
    Engine { generation: u64, event: EngineEvent },
    Focus(FocusState),
    Tick { timer: TimerKind, stamp: u64 },
    /// A backend job finished.
    Settled {
        ticket: Ticket,
        generation: u64,
        result: std::result::Result<(), BridgeError>,
    },
}

struct PendingCommand {
    reply: Reply,
    generation: u64,
    command: &'static str,
}

/// How a command resolves.
enum Completion {
    Now(SessionState),
    /// When the backend settles this ticket.
    Settles(Ticket),
}

impl Completion {
    fn after(ticket: Option<Ticket>, state: SessionState) -> Self {
        match ticket {
            Some(ticket) => Completion::Settles(ticket),
            None => Completion::Now(state),
        }
    }
}

pub struct PlaybackSession {
    settings: PlaybackSettings,
    queue: MediaQueue,
    editor: QueueEditor,
    backend: BackendAdapter,
    focus: AudioFocusCoordinator,
    poller: StatusPoller,
    events: EventBus,
    state: SessionState,
    /// Last engine state of the current generation was `Ready`.
    engine_ready: bool,
    /// The cursor moved off the loaded item while paused.
    cursor_moved: bool,
    /// Where the next load starts; set by seeking an item that is not loaded.
    start_position: Option<Duration>,
    pending: HashMap<Ticket, PendingCommand>,
    released: bool,
    inbox: mpsc::UnboundedReceiver<SessionMessage>,
    focus_forwarder: Option<DropGuard>,
}

impl PlaybackSession {
    /// Start a session owner and return a handle to it.
    ///
    /// # Errors
    ///
    /// `Config` if either configuration is invalid, `Bridge` if the focus
    /// host cannot be subscribed to.
    pub async fn spawn(config: SessionConfig, settings: PlaybackSettings) -> Result<SessionHandle> {
        config
            .validate()
            .map_err(|err| PlaybackError::Config(err.to_string()))?;
        settings.validate()?;

        let (outbox, inbox) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let events = EventBus::new(config.event_buffer_size);

        let host: Arc<dyn AudioFocusHost> = match config.active_focus_host() {
            Some(host) => host,
            None => Arc::new(UnarbitratedFocus),
        };
        let focus = AudioFocusCoordinator::new(host, config.features.enable_ducking);
        let changes = focus.subscribe().await?;
        let focus_forwarder = spawn_focus_forwarder(changes, outbox.clone());

        let session = Self {
            queue: MediaQueue::new(),
            editor: QueueEditor::new(),
            backend: BackendAdapter::spawn(Arc::clone(&config.engine), outbox.clone()),
            poller: StatusPoller::new(&settings, outbox),
            focus,
            events: events.clone(),
            state: SessionState::Stopped,
            engine_ready: false,
            cursor_moved: false,
            start_position: None,
            pending: HashMap::new(),
            released: false,
            inbox,
            focus_forwarder: Some(focus_forwarder),
            settings,
        };

        info!(
            audio_focus = config.features.enable_audio_focus,
            ducking = config.features.enable_ducking,
            navigation = ?session.settings.navigation,
            "playback session started"
        );
        tokio::spawn(session.run(commands));

        Ok(SessionHandle::new(commands_tx, events))
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Inbound>) {
        loop {
            tokio::select! {
                biased;
                Some(message) = self.inbox.recv() => self.on_message(message).await,
                inbound = commands.recv() => match inbound {
                    Some(Inbound::Command { command, reply }) => {
                        self.on_command(command, reply).await
                    }
                    Some(Inbound::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    None => break,
                },
            }
        }

        if !self.released {
            debug!("all session handles dropped; releasing");
            if let Err(err) = self.teardown().await {
                warn!(error = %err, "teardown on drop failed");
            }
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[instrument(skip_all, fields(command = command.name(), state = %self.state))]
    async fn on_command(&mut self, command: SessionCommand, reply: Reply) {
        let name = command.name();

        match self.execute(command).await {
            Ok(Completion::Now(state)) => {
                let _ = reply.send(Ok(state));
            }
            Ok(Completion::Settles(ticket)) => {
                trace!(ticket, "command waiting for backend");
                self.pending.insert(
                    ticket,
                    PendingCommand {
                        reply,
                        generation: self.backend.generation(),
                        command: name,
                    },
                );
            }
            Err(err) => {
                debug!(error = %err, "command rejected");
                let _ = reply.send(Err(err));
            }
        }
    }

    async fn execute(&mut self, command: SessionCommand) -> Result<Completion> {
        if self.released {
            return Err(PlaybackError::Disposed);
        }

        match command {
            SessionCommand::Play => self.play().await,
            SessionCommand::Pause => self.pause(),
            SessionCommand::Stop => self.stop().await,
            SessionCommand::Seek(position_ms) => self.seek(position_ms),
            SessionCommand::Next => self.navigate("next", true),
            SessionCommand::Previous => self.navigate("previous", false),
            SessionCommand::Reset => self.reset().await,
            SessionCommand::SetQueue(items) => self.set_queue(items).await,
            SessionCommand::Insert { index, items } => {
                let diff = self.queue.insert(index, items)?;
                self.queue_changed(&diff);
                Ok(Completion::Now(self.state))
            }
            SessionCommand::Remove(index) => self.remove(index).await,
            SessionCommand::Move { from, to } => {
                let diff = self.queue.move_item(from, to)?;
                self.queue_changed(&diff);
                Ok(Completion::Now(self.state))
            }
            SessionCommand::Release => self.release().await,
        }
    }

    async fn play(&mut self) -> Result<Completion> {
        match self.state {
            SessionState::Playing | SessionState::Buffering => {
                return Ok(Completion::Now(self.state))
            }
            SessionState::Error => {
                return Err(PlaybackError::InvalidState {
                    state: self.state,
                    command: "play",
                })
            }
            SessionState::Stopped | SessionState::Paused | SessionState::Ended => {}
        }

        if self.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        self.focus.request().await?;
        self.focus.clear_auto_pause();

        let resumable = self.state == SessionState::Paused
            && self.backend.is_loaded()
            && !self.cursor_moved;

        let ticket = if resumable {
            self.resume()?
        } else {
            self.load_current()?;
            self.backend.play()?
        };
        Ok(Completion::Settles(ticket))
    }

    fn pause(&mut self) -> Result<Completion> {
        if !self.state.is_active() {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                command: "pause",
            });
        }

        self.focus.clear_auto_pause();
        let ticket = self.pause_backend()?;
        Ok(Completion::Settles(ticket))
    }

    async fn stop(&mut self) -> Result<Completion> {
        let ticket = self.stop_backend().await?;
        self.transition(SessionState::Stopped);
        Ok(Completion::after(ticket, SessionState::Stopped))
    }

    fn seek(&mut self, position_ms: i64) -> Result<Completion> {
        if matches!(self.state, SessionState::Ended | SessionState::Error) {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                command: "seek",
            });
        }

        if self.cursor_moved {
            // Not loaded yet, so the duration is unknown.
            let target = clamp_seek(position_ms, Duration::ZERO);
            debug!(
                requested_ms = position_ms,
                target_ms = target.as_millis() as u64,
                "seek deferred to next load"
            );
            self.start_position = Some(target);
            return Ok(Completion::Now(self.state));
        }

        let sample = self.backend.sample()?;
        let target = clamp_seek(position_ms, sample.duration);
        debug!(
            requested_ms = position_ms,
            target_ms = target.as_millis() as u64,
            "seeking"
        );

        let ticket = self.backend.seek(target)?;
        self.poller.reset_progress();
        Ok(Completion::Settles(ticket))
    }

    fn navigate(&mut self, command: &'static str, forward: bool) -> Result<Completion> {
        if self.state == SessionState::Error {
            return Err(PlaybackError::InvalidState {
                state: self.state,
                command,
            });
        }

        let mode = self.settings.navigation;
        let moved = if forward {
            self.queue.advance(mode)
        } else {
            self.queue.retreat(mode)
        };
        if !moved {
            return Ok(Completion::Now(self.state));
        }
        self.start_position = None;
        self.publish_queue();

        if self.state.is_active() {
            self.load_current()?;
            let ticket = self.backend.play()?;
            return Ok(Completion::Settles(ticket));
        }

        if self.state == SessionState::Paused {
            self.cursor_moved = true;
        }
        self.announce(self.state);
        Ok(Completion::Now(self.state))
    }

    async fn reset(&mut self) -> Result<Completion> {
        let ticket = self.stop_backend().await?;
        let diff = self.queue.clear();
        self.queue_changed(&diff);
        self.announce(SessionState::Stopped);
        Ok(Completion::after(ticket, SessionState::Stopped))
    }

    async fn set_queue(&mut self, items: Vec<MediaItem>) -> Result<Completion> {
        let ticket = if self.state.has_timeline() {
            self.stop_backend().await?
        } else {
            None
        };
        let state = if ticket.is_some() {
            SessionState::Stopped
        } else {
            self.state
        };

        let diff = self.queue.replace(items);
        self.queue_changed(&diff);
        self.announce(state);
        Ok(Completion::after(ticket, state))
    }

    async fn remove(&mut self, index: usize) -> Result<Completion> {
        let was_current = self.queue.current_index() == Some(index);
        let diff = self.queue.remove(index)?;
        self.queue_changed(&diff);

        if !was_current {
            return Ok(Completion::Now(self.state));
        }

        if self.state.has_timeline() {
            if self.queue.current_index().is_none() {
                debug!("current item removed with nothing after it; stopping");
                let ticket = self.stop_backend().await?;
                self.announce(SessionState::Stopped);
                return Ok(Completion::after(ticket, SessionState::Stopped));
            }

            // The engine continues with the item that slid into place.
            self.poller.reset_progress();
            self.poller.start(TimerKind::Buffering);
        }

        self.announce(self.state);
        Ok(Completion::Now(self.state))
    }

    async fn release(&mut self) -> Result<Completion> {
        let ticket = self.teardown().await?;
        Ok(Completion::Settles(ticket))
    }

    // ========================================================================
    // Backend plumbing
    // ========================================================================

    /// Load the full queue with the current item selected (the first one if
    /// nothing is).
    fn load_current(&mut self) -> Result<Ticket> {
        let index = match self.queue.current_index() {
            Some(index) => index,
            None => {
                self.queue.set_current(0)?;
                self.publish_queue();
                0
            }
        };

        let start = self.start_position.take().unwrap_or_default();
        let ticket = self.backend.load(
            LoadRequest::new(self.queue.sources(), index).with_start_position(start),
        )?;
        self.cancel_superseded();
        self.editor.mark_synced();
        self.engine_ready = false;
        self.cursor_moved = false;

        self.poller.stop(TimerKind::Status);
        self.poller.reset_progress();
        self.poller.start(TimerKind::Buffering);

        self.announce(SessionState::Buffering);
        Ok(ticket)
    }

    fn resume(&mut self) -> Result<Ticket> {
        let ticket = self.backend.play()?;
        if self.engine_ready {
            self.poller.start(TimerKind::Status);
            self.transition(SessionState::Playing);
        } else {
            self.transition(SessionState::Buffering);
        }
        Ok(ticket)
    }

    fn pause_backend(&mut self) -> Result<Ticket> {
        let ticket = self.backend.pause()?;
        self.poller.stop(TimerKind::Status);
        self.transition(SessionState::Paused);
        Ok(ticket)
    }

    /// Drop timers, focus and the loaded timeline. `None` when nothing was
    /// loaded.
    async fn stop_backend(&mut self) -> Result<Option<Ticket>> {
        self.poller.stop_all();
        if self.focus.is_ducked() {
            self.set_volume(self.settings.full_volume);
        }
        self.focus.abandon().await;
        self.engine_ready = false;
        self.cursor_moved = false;
        self.start_position = None;

        if !self.backend.is_loaded() {
            return Ok(None);
        }

        let ticket = self.backend.stop()?;
        self.cancel_superseded();
        Ok(Some(ticket))
    }

    /// Stop timers, give focus back and release the engine.
    async fn teardown(&mut self) -> Result<Ticket> {
        self.released = true;
        self.poller.stop_all();
        self.focus_forwarder.take();
        self.focus.abandon().await;
        self.engine_ready = false;

        let ticket = self.backend.release()?;
        self.cancel_superseded();
        self.transition(SessionState::Stopped);

        info!("playback session released");
        Ok(ticket)
    }

    fn set_volume(&mut self, volume: f32) {
        if let Err(err) = self.backend.set_volume(volume) {
            warn!(volume, error = %err, "failed to change output volume");
        }
    }

    /// Resolve commands waiting on a generation that was just abandoned.
    fn cancel_superseded(&mut self) {
        let generation = self.backend.generation();
        let (stale, live): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, pending)| pending.generation < generation);
        self.pending = live;

        for (ticket, pending) in stale {
            debug!(ticket, command = pending.command, "command superseded");
            let _ = pending.reply.send(Err(PlaybackError::Cancelled));
        }
    }

    fn queue_changed(&mut self, diff: &QueueDiff) {
        if let Err(err) = self.editor.apply(diff, &self.queue, &mut self.backend) {
            warn!(error = %err, "queue edit not mirrored to backend");
            self.publish(CoreEvent::Queue(QueueEvent::SyncFailed {
                message: err.to_string(),
            }));
        }
        self.publish_queue();
    }

    // ========================================================================
    // Internal messages
    // ========================================================================

    async fn on_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Engine { generation, event } => {
                if generation != self.backend.generation() {
                    debug!(
                        generation,
                        current = self.backend.generation(),
                        ?event,
                        "stale engine event dropped"
                    );
                    return;
                }
                self.on_engine_event(event).await;
            }
            SessionMessage::Focus(focus) => self.on_focus_change(focus).await,
            SessionMessage::Tick { timer, stamp } => self.on_tick(timer, stamp),
            SessionMessage::Settled {
                ticket,
                generation,
                result,
            } => self.on_settled(ticket, generation, result),
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        trace!(?event, "engine event");

        if self.state == SessionState::Error && !matches!(event, EngineEvent::Error { .. }) {
            return;
        }

        match event {
            EngineEvent::StateChanged(engine_state) => self.on_engine_state(engine_state).await,
            EngineEvent::PositionDiscontinuity { timeline_index } => {
                self.on_discontinuity(timeline_index)
            }
            EngineEvent::Error { cause } => self.fail(cause),
            EngineEvent::BufferedUpdate { percentage } => {
                let buffered_position = self
                    .backend
                    .sample()
                    .map(|sample| sample.buffered_position)
                    .unwrap_or_default();
                if let Some(event) = self.poller.observe_buffering(percentage, buffered_position) {
                    self.publish(CoreEvent::Session(event));
                }
            }
        }
    }

    async fn on_engine_state(&mut self, engine_state: EngineState) {
        match engine_state {
            EngineState::Ready => {
                self.engine_ready = true;
                if self.state == SessionState::Buffering {
                    self.poller.reset_progress();
                    self.poller.ensure_running(TimerKind::Status);
                    self.transition(SessionState::Playing);
                }
            }
            EngineState::Buffering => {
                self.engine_ready = false;
                if self.state == SessionState::Playing {
                    self.transition(SessionState::Buffering);
                }
            }
            EngineState::Ended => {
                self.engine_ready = false;
                if self.state.has_timeline() {
                    self.poller.stop_all();
                    self.focus.abandon().await;
                    self.transition(SessionState::Ended);
                }
            }
            EngineState::Idle => {}
        }
    }

    /// The engine moved to another timeline entry on its own.
    fn on_discontinuity(&mut self, timeline_index: usize) {
        if self.queue.current_index() == Some(timeline_index) {
            return;
        }
        if let Err(err) = self.queue.set_current(timeline_index) {
            warn!(timeline_index, error = %err, "engine reported an unknown timeline entry");
            return;
        }

        debug!(timeline_index, "engine advanced to next item");
        self.cursor_moved = false;
        self.start_position = None;
        self.poller.reset_progress();
        self.poller.start(TimerKind::Buffering);
        self.publish_queue();
        self.announce(self.state);
    }

    async fn on_focus_change(&mut self, focus: FocusState) {
        if self.released {
            return;
        }
        self.publish(CoreEvent::Focus(FocusEvent::Changed { state: focus }));

        let action = self.focus.on_change(focus, self.state);
        let outcome = match action {
            FocusAction::None => Ok(()),
            FocusAction::Pause => self.pause_backend().map(drop),
            FocusAction::Resume { restore_volume } => {
                if restore_volume {
                    self.set_volume(self.settings.full_volume);
                }
                if self.state == SessionState::Paused {
                    self.resume().map(drop)
                } else {
                    Ok(())
                }
            }
            FocusAction::Duck => {
                self.set_volume(self.settings.duck_volume);
                Ok(())
            }
            FocusAction::Unduck => {
                self.set_volume(self.settings.full_volume);
                Ok(())
            }
            FocusAction::Stop => match self.stop_backend().await {
                Ok(_) => {
                    self.transition(SessionState::Stopped);
                    Ok(())
                }
                Err(err) => Err(err),
            },
        };

        if let Err(err) = outcome {
            warn!(?action, error = %err, "focus action failed");
        }
    }

    fn on_tick(&mut self, timer: TimerKind, stamp: u64) {
        if !self.poller.accepts(timer, stamp) {
            trace!(?timer, stamp, "stale tick dropped");
            return;
        }
        let Ok(sample) = self.backend.sample() else {
            return;
        };

        let event = match timer {
            TimerKind::Status => self.poller.observe_position(&sample),
            TimerKind::Buffering => self
                .poller
                .observe_buffering(sample.buffered_percentage, sample.buffered_position),
        };
        if let Some(event) = event {
            self.publish(CoreEvent::Session(event));
        }
    }

    fn on_settled(
        &mut self,
        ticket: Ticket,
        generation: u64,
        result: std::result::Result<(), BridgeError>,
    ) {
        match self.editor.settle(ticket, &result) {
            EditSettlement::Unrelated => {}
            EditSettlement::Applied => return,
            EditSettlement::Failed(message) => {
                warn!(ticket, %message, "timeline edit failed; full queue will be resent");
                self.publish(CoreEvent::Queue(QueueEvent::SyncFailed { message }));
                return;
            }
        }

        let pending = self.pending.remove(&ticket);

        if generation != self.backend.generation() {
            trace!(ticket, generation, "stale completion dropped");
            if let Some(pending) = pending {
                let _ = pending.reply.send(Err(PlaybackError::Cancelled));
            }
            return;
        }

        match result {
            Ok(()) => {
                if let Some(pending) = pending {
                    trace!(ticket, command = pending.command, state = %self.state, "command settled");
                    let _ = pending.reply.send(Ok(self.state));
                }
            }
            Err(err) => {
                let cause = err.to_string();
                self.fail(cause.clone());
                if let Some(pending) = pending {
                    let _ = pending.reply.send(Err(PlaybackError::BackendError(cause)));
                }
            }
        }
    }

    /// Enter the error state. Commands still waiting fail with the cause.
    fn fail(&mut self, cause: String) {
        if self.released {
            return;
        }

        for (_, pending) in self.pending.drain() {
            let _ = pending
                .reply
                .send(Err(PlaybackError::BackendError(cause.clone())));
        }

        if self.state == SessionState::Error {
            debug!(%cause, "further backend failure while in error state");
            return;
        }

        error!(%cause, "playback failed");
        self.poller.stop_all();
        self.engine_ready = false;
        self.transition(SessionState::Error);
        self.publish(CoreEvent::Session(SessionEvent::Error { cause }));
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn snapshot(&self) -> PlaybackSnapshot {
        let sample = self.backend.sample().unwrap_or_default();
        PlaybackSnapshot {
            state: self.state,
            position: sample.position,
            duration: sample.duration,
            buffered_position: sample.buffered_position,
            buffered_percentage: sample.buffered_percentage.min(100),
            current_index: self.queue.current_index(),
            current_item: self.queue.current().cloned(),
        }
    }

    fn transition(&mut self, state: SessionState) {
        if self.state != state {
            self.announce(state);
        }
    }

    /// Set the state and tell subscribers, even if only the current item
    /// changed.
    fn announce(&mut self, state: SessionState) {
        if self.state != state {
            info!(from = %self.state, to = %state, "session state changed");
        }
        self.state = state;
        self.publish(CoreEvent::Session(SessionEvent::StateChanged {
            state,
            current_item: self.queue.now_playing(),
        }));
    }

    fn publish_queue(&self) {
        self.publish(CoreEvent::Queue(QueueEvent::Changed {
            len: self.queue.len(),
            current_index: self.queue.current_index(),
        }));
    }

    fn publish(&self, event: CoreEvent) {
        let _ = self.events.emit(event);
    }
}

/// Clamp a requested seek target into `[0, duration]`. An unknown (zero)
/// duration only clamps the lower bound.
pub fn clamp_seek(position_ms: i64, duration: Duration) -> Duration {
    let requested = Duration::from_millis(u64::try_from(position_ms).unwrap_or(0));
    if duration.is_zero() {
        requested
    } else {
        requested.min(duration)
    }
}

fn spawn_focus_forwarder(
    mut changes: Box<dyn FocusChangeStream>,
    outbox: mpsc::UnboundedSender<SessionMessage>,
) -> DropGuard {
    let token = CancellationToken::new();
    let cancelled = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => break,
                change = changes.next() => match change {
                    Some(focus) => {
                        if outbox.send(SessionMessage::Focus(focus)).is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        trace!("focus forwarder stopped");
    });

    token.drop_guard()
}
