//! # Queue Editor
//!
//! Mirrors queue edits onto the backend timeline.
//!
//! Edits are translated one-to-one into [`TimelineEdit`]s and submitted
//! through the [`BackendAdapter`], so they reach the engine in the order they
//! were made. While nothing is loaded there is no timeline to edit; the next
//! load carries the full queue anyway.
//!
//! A failed edit (rejected by the adapter or by the engine) never fails the
//! queue command that caused it. It surfaces as a `QueueSyncFailed`
//! notification and marks the timeline dirty: the following edit resends the
//! whole queue as a [`TimelineEdit::Replace`] instead of an incremental edit.

use crate::backend::{BackendAdapter, Ticket, TimelineEdit};
use crate::error::{PlaybackError, Result};
use crate::queue::{MediaQueue, QueueDiff};
use bridge_traits::BridgeError;
use std::collections::HashSet;
use tracing::{debug, trace};

/// What a backend completion meant for the editor.
#[derive(Debug, PartialEq)]
pub(crate) enum EditSettlement {
    /// Not an edit ticket.
    Unrelated,
    Applied,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct QueueEditor {
    dirty: bool,
    in_flight: HashSet<Ticket>,
}

impl QueueEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when the backend timeline may have diverged from the queue.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mirror `diff` (already applied to `queue`) onto the backend.
    ///
    /// # Errors
    ///
    /// `QueueSyncFailed` if the adapter refused the edit. The queue itself is
    /// unaffected.
    pub fn apply(
        &mut self,
        diff: &QueueDiff,
        queue: &MediaQueue,
        backend: &mut BackendAdapter,
    ) -> Result<()> {
        if !backend.is_loaded() {
            trace!("no timeline loaded; edit deferred to next load");
            return Ok(());
        }

        let edit = if self.dirty {
            debug!(len = queue.len(), "timeline dirty; resending full queue");
            TimelineEdit::Replace {
                sources: queue.sources(),
            }
        } else {
            TimelineEdit::from(diff)
        };

        match backend.edit(edit) {
            Ok(ticket) => {
                self.in_flight.insert(ticket);
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                Err(PlaybackError::QueueSyncFailed(err.to_string()))
            }
        }
    }

    /// Record the outcome of a backend job.
    pub(crate) fn settle(
        &mut self,
        ticket: Ticket,
        result: &std::result::Result<(), BridgeError>,
    ) -> EditSettlement {
        if !self.in_flight.remove(&ticket) {
            return EditSettlement::Unrelated;
        }

        match result {
            Ok(()) => EditSettlement::Applied,
            Err(err) => {
                self.dirty = true;
                EditSettlement::Failed(err.to_string())
            }
        }
    }

    /// A fresh load made the backend timeline match the queue again.
    pub fn mark_synced(&mut self) {
        self.dirty = false;
        self.in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MediaItem;
    use crate::session::SessionMessage;
    use crate::test_support::{EngineCall, RecordingEngine};
    use bridge_traits::LoadRequest;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Fixture {
        engine: RecordingEngine,
        backend: BackendAdapter,
        inbox: mpsc::UnboundedReceiver<SessionMessage>,
        queue: MediaQueue,
        editor: QueueEditor,
    }

    impl Fixture {
        fn new() -> Self {
            let engine = RecordingEngine::new();
            let (outbox, inbox) = mpsc::unbounded_channel();
            let backend = BackendAdapter::spawn(Arc::new(engine.clone()), outbox);
            let mut queue = MediaQueue::new();
            queue
                .insert(0, vec![MediaItem::from_uri("a"), MediaItem::from_uri("b")])
                .unwrap();
            Self {
                engine,
                backend,
                inbox,
                queue,
                editor: QueueEditor::new(),
            }
        }

        fn load(&mut self) {
            self.backend
                .load(LoadRequest::new(self.queue.sources(), 0))
                .unwrap();
            self.editor.mark_synced();
        }

        async fn settle_next(&mut self) -> EditSettlement {
            loop {
                match self.inbox.recv().await {
                    Some(SessionMessage::Settled { ticket, result, .. }) => {
                        match self.editor.settle(ticket, &result) {
                            EditSettlement::Unrelated => continue,
                            other => return other,
                        }
                    }
                    Some(_) => continue,
                    None => panic!("worker stopped"),
                }
            }
        }
    }

    #[tokio::test]
    async fn edits_before_load_are_deferred() {
        let mut fx = Fixture::new();
        let diff = fx.queue.remove(0).unwrap();

        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();
        tokio::task::yield_now().await;

        assert!(fx.engine.calls().is_empty());
        assert!(!fx.editor.is_dirty());
    }

    #[tokio::test]
    async fn edits_are_mirrored_in_order() {
        let mut fx = Fixture::new();
        fx.load();

        let diff = fx
            .queue
            .insert(2, vec![MediaItem::from_uri("c")])
            .unwrap();
        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();
        let diff = fx.queue.move_item(2, 0).unwrap();
        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();
        let diff = fx.queue.remove(1).unwrap();
        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();

        assert_eq!(fx.settle_next().await, EditSettlement::Applied);
        assert_eq!(fx.settle_next().await, EditSettlement::Applied);
        assert_eq!(fx.settle_next().await, EditSettlement::Applied);

        assert_eq!(
            fx.engine.calls(),
            vec![
                EngineCall::Load {
                    sources: 2,
                    start_index: 0
                },
                EngineCall::Insert { index: 2, count: 1 },
                EngineCall::Move(2, 0),
                EngineCall::Remove(1),
            ]
        );
    }

    #[tokio::test]
    async fn failed_edit_triggers_full_resend() {
        let mut fx = Fixture::new();
        fx.load();

        fx.engine.fail_edits(true);
        let diff = fx.queue.remove(1).unwrap();
        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();
        assert!(matches!(fx.settle_next().await, EditSettlement::Failed(_)));
        assert!(fx.editor.is_dirty());

        fx.engine.fail_edits(false);
        let diff = fx
            .queue
            .insert(1, vec![MediaItem::from_uri("c"), MediaItem::from_uri("d")])
            .unwrap();
        fx.editor.apply(&diff, &fx.queue, &mut fx.backend).unwrap();
        assert_eq!(fx.settle_next().await, EditSettlement::Applied);
        assert!(!fx.editor.is_dirty());

        assert_eq!(fx.engine.calls().last(), Some(&EngineCall::Replace(3)));
    }

    #[tokio::test]
    async fn released_backend_defers_edits() {
        let mut fx = Fixture::new();
        fx.load();
        fx.backend.release().unwrap();

        let diff = fx.queue.remove(0).unwrap();
        assert!(fx.editor.apply(&diff, &fx.queue, &mut fx.backend).is_ok());
        assert!(!fx.editor.is_dirty());
    }
}
