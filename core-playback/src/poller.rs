//! # Status Poller
//!
//! Two periodic timers sampling the engine while a session is live.
//!
//! - The **status** timer runs while playing and turns position readouts into
//!   `PositionChanged` notifications.
//! - The **buffering** timer runs from load until the current item is fully
//!   buffered and turns buffering readouts into `BufferingChanged`
//!   notifications. It stops itself once the item reaches 100%.
//!
//! Timer tasks never touch the engine. They only post a
//! [`SessionMessage::Tick`] to the session owner, which takes the sample and
//! calls back into [`StatusPoller::observe_position`] /
//! [`StatusPoller::observe_buffering`]. Every tick carries the stamp of the
//! timer run that produced it; ticks from a stopped or restarted run are
//! rejected by [`StatusPoller::accepts`].

use crate::config::PlaybackSettings;
use crate::session::SessionMessage;
use bridge_traits::EngineSample;
use core_runtime::events::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Status,
    Buffering,
}

#[derive(Default)]
struct TimerSlot {
    stamp: u64,
    // Dropping the guard cancels the timer task.
    guard: Option<DropGuard>,
}

impl TimerSlot {
    fn is_running(&self) -> bool {
        self.guard.is_some()
    }
}

pub struct StatusPoller {
    status_interval: Duration,
    buffering_interval: Duration,
    status: TimerSlot,
    buffering: TimerSlot,
    next_stamp: u64,
    last_progress: Option<u8>,
    last_buffered: Option<u8>,
    outbox: mpsc::UnboundedSender<SessionMessage>,
}

impl StatusPoller {
    pub(crate) fn new(
        settings: &PlaybackSettings,
        outbox: mpsc::UnboundedSender<SessionMessage>,
    ) -> Self {
        Self {
            status_interval: settings.status_interval,
            buffering_interval: settings.buffering_interval,
            status: TimerSlot::default(),
            buffering: TimerSlot::default(),
            next_stamp: 0,
            last_progress: None,
            last_buffered: None,
            outbox,
        }
    }

    /// Start `kind`, restarting it if it already runs.
    pub fn start(&mut self, kind: TimerKind) {
        self.next_stamp += 1;
        let stamp = self.next_stamp;
        let period = match kind {
            TimerKind::Status => self.status_interval,
            TimerKind::Buffering => {
                self.last_buffered = None;
                self.buffering_interval
            }
        };

        let guard = spawn_ticker(kind, stamp, period, self.outbox.clone());
        let slot = self.slot_mut(kind);
        slot.stamp = stamp;
        slot.guard = Some(guard);

        trace!(?kind, stamp, "timer started");
    }

    /// Start `kind` only if it is not already running.
    pub fn ensure_running(&mut self, kind: TimerKind) {
        if !self.is_running(kind) {
            self.start(kind);
        }
    }

    pub fn stop(&mut self, kind: TimerKind) {
        if self.slot_mut(kind).guard.take().is_some() {
            trace!(?kind, "timer stopped");
        }
    }

    pub fn stop_all(&mut self) {
        self.stop(TimerKind::Status);
        self.stop(TimerKind::Buffering);
    }

    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_running()
    }

    /// Whether a tick stamped `stamp` belongs to the live run of `kind`.
    pub fn accepts(&self, kind: TimerKind, stamp: u64) -> bool {
        let slot = self.slot(kind);
        slot.is_running() && slot.stamp == stamp
    }

    /// Forget the last reported progress, so the next sample is always
    /// reported (after a seek or a change of item).
    pub fn reset_progress(&mut self) {
        self.last_progress = None;
    }

    /// Turn a position sample into a notification when the whole-percent
    /// progress changed.
    pub fn observe_position(&mut self, sample: &EngineSample) -> Option<SessionEvent> {
        let progress = progress_percent(sample.position, sample.duration);
        if self.last_progress == Some(progress) {
            return None;
        }
        self.last_progress = Some(progress);

        Some(SessionEvent::PositionChanged {
            progress_pct: progress,
            position_ms: millis(sample.position),
            duration_ms: millis(sample.duration),
        })
    }

    /// Turn a buffering readout into a notification when it changed. Stops
    /// the buffering timer once the item is fully buffered.
    pub fn observe_buffering(
        &mut self,
        percentage: u8,
        buffered_position: Duration,
    ) -> Option<SessionEvent> {
        let percentage = percentage.min(100);

        if percentage >= 100 && self.is_running(TimerKind::Buffering) {
            debug!("current item fully buffered; buffering timer stopped");
            self.stop(TimerKind::Buffering);
        }

        if self.last_buffered == Some(percentage) {
            return None;
        }
        self.last_buffered = Some(percentage);

        Some(SessionEvent::BufferingChanged {
            buffered_pct: percentage,
            buffered_position_ms: millis(buffered_position),
        })
    }

    fn slot(&self, kind: TimerKind) -> &TimerSlot {
        match kind {
            TimerKind::Status => &self.status,
            TimerKind::Buffering => &self.buffering,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::Status => &mut self.status,
            TimerKind::Buffering => &mut self.buffering,
        }
    }
}

/// Whole-percent progress, rounded up. Zero when the duration is unknown.
pub fn progress_percent(position: Duration, duration: Duration) -> u8 {
    if duration.is_zero() {
        return 0;
    }
    let ratio = position.as_secs_f64() / duration.as_secs_f64();
    (ratio * 100.0).ceil().clamp(0.0, 100.0) as u8
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn spawn_ticker(
    kind: TimerKind,
    stamp: u64,
    period: Duration,
    outbox: mpsc::UnboundedSender<SessionMessage>,
) -> DropGuard {
    let token = CancellationToken::new();
    let cancelled = token.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => break,
                _ = ticker.tick() => {
                    if outbox.send(SessionMessage::Tick { timer: kind, stamp }).is_err() {
                        break;
                    }
                }
            }
        }
    });

    token.drop_guard()
}
