//! Test utilities for engine consumers
//!
//! Provides [`RecordingEngine`], an [`Engine`] that records every call, can be
//! told to fail lifecycle calls, and lets a test play the engine's role by
//! emitting events into the registered sink from any thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use genie_core::prelude::*;
use genie_core::{Credential, Event, FocusState};

use crate::engine::{Engine, EngineHandle, EngineSink, HandleParams};

/// One recorded call into the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateHandle {
        device_id: String,
        credential: Option<Credential>,
    },
    Start,
    Stop,
    Destroy,
    Wake {
        word: String,
        doa: i32,
        confidence: f64,
    },
    Silence,
    VolumeChanged(u8),
    MuteChanged(bool),
    NetworkUp,
    NetworkDown,
    TextRecognize(String),
    QueryUserInfo,
    FocusChanged(FocusState),
}

/// Recording engine double
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    sink: Mutex<Option<(EngineHandle, Arc<dyn EngineSink>)>>,
    failing_creates: AtomicUsize,
    failing_starts: AtomicUsize,
    failing_stops: AtomicBool,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` `create_handle` calls fail
    pub fn fail_next_creates(&self, n: usize) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` `start` calls fail
    pub fn fail_next_starts(&self, n: usize) {
        self.failing_starts.store(n, Ordering::SeqCst);
    }

    /// Make every `stop` call fail
    pub fn fail_stops(&self, fail: bool) {
        self.failing_stops.store(fail, Ordering::SeqCst);
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `pred`
    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Forget recorded calls (the registered sink is kept)
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Handle returned by the most recent successful `create_handle`
    pub fn handle(&self) -> Option<EngineHandle> {
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .map(|(handle, _)| *handle)
    }

    /// The sink registered by the most recent successful `create_handle`.
    ///
    /// Holding on to it after release mimics a late native callback.
    pub fn sink(&self) -> Option<(EngineHandle, Arc<dyn EngineSink>)> {
        self.sink.lock().unwrap().clone()
    }

    /// Deliver an event as the engine would. Returns `false` if no sink is registered.
    pub fn emit(&self, event: Event) -> bool {
        match self.sink() {
            Some((handle, sink)) => {
                sink.on_event(handle, event);
                true
            }
            None => false,
        }
    }

    /// Ask the bridge for the current volume, as the engine would
    pub fn query_volume(&self) -> Option<u8> {
        let (handle, sink) = self.sink()?;
        sink.volume(handle)
    }

    /// Ask the bridge to change the device volume, as the engine would
    pub fn request_volume(&self, percent: u8) -> bool {
        match self.sink() {
            Some((handle, sink)) => sink.set_volume(handle, percent),
            None => false,
        }
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Engine for RecordingEngine {
    fn create_handle(
        &self,
        params: HandleParams,
        sink: Arc<dyn EngineSink>,
    ) -> Result<EngineHandle> {
        self.record(EngineCall::CreateHandle {
            device_id: params.device_id.clone(),
            credential: params.credential.clone(),
        });
        if Self::take_failure(&self.failing_creates) {
            return Err(Error::init("recording engine: create failure requested"));
        }
        let handle = EngineHandle::next();
        *self.sink.lock().unwrap() = Some((handle, sink));
        Ok(handle)
    }

    fn start(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::Start);
        if Self::take_failure(&self.failing_starts) {
            return Err(Error::start("recording engine: start failure requested"));
        }
        Ok(())
    }

    fn stop(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::Stop);
        if self.failing_stops.load(Ordering::SeqCst) {
            return Err(Error::engine("recording engine: stop failure requested"));
        }
        Ok(())
    }

    fn destroy(&self, _handle: EngineHandle) {
        self.record(EngineCall::Destroy);
    }

    fn send_wake(
        &self,
        _handle: EngineHandle,
        word: &str,
        doa: i32,
        confidence: f64,
    ) -> Result<()> {
        self.record(EngineCall::Wake {
            word: word.to_string(),
            doa,
            confidence,
        });
        Ok(())
    }

    fn send_silence(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::Silence);
        Ok(())
    }

    fn send_volume_changed(&self, _handle: EngineHandle, percent: u8) -> Result<()> {
        self.record(EngineCall::VolumeChanged(percent));
        Ok(())
    }

    fn send_mute_changed(&self, _handle: EngineHandle, muted: bool) -> Result<()> {
        self.record(EngineCall::MuteChanged(muted));
        Ok(())
    }

    fn send_network_up(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::NetworkUp);
        Ok(())
    }

    fn send_network_down(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::NetworkDown);
        Ok(())
    }

    fn send_text_recognize(&self, _handle: EngineHandle, text: &str) -> Result<()> {
        self.record(EngineCall::TextRecognize(text.to_string()));
        Ok(())
    }

    fn send_query_user_info(&self, _handle: EngineHandle) -> Result<()> {
        self.record(EngineCall::QueryUserInfo);
        Ok(())
    }

    fn send_focus_changed(&self, _handle: EngineHandle, focus: FocusState) -> Result<()> {
        self.record(EngineCall::FocusChanged(focus));
        Ok(())
    }
}
