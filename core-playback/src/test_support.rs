//! Recording engine shared by the unit tests.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, EngineEvent, EngineEventSink, EngineSample, LoadRequest, MediaSource,
    PlaybackEngine,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    Load { sources: usize, start_index: usize },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetVolume(f32),
    Insert { index: usize, count: usize },
    Remove(usize),
    Move(usize, usize),
    Replace(usize),
    Release,
}

#[derive(Default)]
struct Recorded {
    calls: Vec<EngineCall>,
    sinks: Vec<Arc<dyn EngineEventSink>>,
    sample: EngineSample,
    fail_edits: bool,
    load_gate: Option<Arc<Notify>>,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingEngine {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Every subsequent load waits for one `notify_one` on the returned gate.
    pub(crate) fn gate_loads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state.lock().unwrap().load_gate = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn fail_edits(&self, fail: bool) {
        self.state.lock().unwrap().fail_edits = fail;
    }

    pub(crate) fn set_sample(&self, sample: EngineSample) {
        self.state.lock().unwrap().sample = sample;
    }

    /// Emit through the sink of the most recent load.
    pub(crate) fn emit(&self, event: EngineEvent) {
        let sink = self.state.lock().unwrap().sinks.last().cloned();
        sink.expect("no load happened yet").emit(event);
    }

    pub(crate) async fn wait_for(&self, call: &EngineCall) {
        for _ in 0..1_000 {
            if self.count(call) > 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("engine never saw {:?}; calls: {:?}", call, self.calls());
    }

    fn record(&self, call: EngineCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn record_edit(&self, call: EngineCall) -> BridgeResult<()> {
        let fail = self.state.lock().unwrap().fail_edits;
        self.record(call);
        if fail {
            return Err(BridgeError::EngineRejected {
                command: "edit",
                reason: "timeline locked".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PlaybackEngine for RecordingEngine {
    async fn load(&self, request: LoadRequest, events: Arc<dyn EngineEventSink>) -> BridgeResult<()> {
        let gate = self.state.lock().unwrap().load_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(EngineCall::Load {
            sources: request.sources.len(),
            start_index: request.start_index,
        });
        state.sinks.push(events);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(EngineCall::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(EngineCall::Stop);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.record(EngineCall::Seek(position));
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.record(EngineCall::SetVolume(volume));
        Ok(())
    }

    async fn insert_sources(&self, index: usize, sources: Vec<MediaSource>) -> BridgeResult<()> {
        self.record_edit(EngineCall::Insert {
            index,
            count: sources.len(),
        })
    }

    async fn remove_source(&self, index: usize) -> BridgeResult<()> {
        self.record_edit(EngineCall::Remove(index))
    }

    async fn move_source(&self, from: usize, to: usize) -> BridgeResult<()> {
        self.record_edit(EngineCall::Move(from, to))
    }

    async fn replace_sources(&self, sources: Vec<MediaSource>) -> BridgeResult<()> {
        self.record_edit(EngineCall::Replace(sources.len()))
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record(EngineCall::Release);
        Ok(())
    }

    fn sample(&self) -> EngineSample {
        self.state.lock().unwrap().sample
    }
}
