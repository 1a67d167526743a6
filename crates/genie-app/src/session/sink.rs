//! Engine callback entry point
//!
//! The engine calls [`CallbackSink`] from its own threads. Every entry point
//! first checks the session's liveness flag and the handle it was called
//! for, so callbacks that race with release, or come from a previous engine
//! instance, are dropped without touching session state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use genie_core::prelude::*;
use genie_core::Event;
use genie_engine::{EngineHandle, EngineSink};

use crate::dispatcher::{EventSender, Message};
use crate::volume::VolumeBridge;

pub(crate) struct CallbackSink {
    alive: Arc<AtomicBool>,
    /// Set once `create_handle` has returned
    handle: OnceLock<EngineHandle>,
    sender: EventSender,
    volume: VolumeBridge,
}

impl CallbackSink {
    pub fn new(alive: Arc<AtomicBool>, sender: EventSender, volume: VolumeBridge) -> Self {
        Self {
            alive,
            handle: OnceLock::new(),
            sender,
            volume,
        }
    }

    pub fn bind(&self, handle: EngineHandle) {
        if self.handle.set(handle).is_err() {
            warn!("Callback sink already bound, ignoring {}", handle);
        }
    }

    fn accepts(&self, handle: EngineHandle) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            trace!("Dropping callback for {} after release", handle);
            return false;
        }
        match self.handle.get() {
            Some(bound) if *bound != handle => {
                debug!("Dropping callback for stale {} (current {})", handle, bound);
                false
            }
            // Unbound: the engine is calling back from inside create_handle
            _ => true,
        }
    }
}

impl EngineSink for CallbackSink {
    fn on_event(&self, handle: EngineHandle, event: Event) {
        if !self.accepts(handle) {
            return;
        }
        trace!("Engine event from {}: {}", handle, event.event_type());
        self.sender.post(Message::Engine(event));
    }

    fn volume(&self, handle: EngineHandle) -> Option<u8> {
        if !self.accepts(handle) {
            return None;
        }
        self.volume.current_percent()
    }

    fn set_volume(&self, handle: EngineHandle, percent: u8) -> bool {
        if !self.accepts(handle) {
            return false;
        }
        self.volume.apply_engine_volume(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::EdgeDetector;
    use crate::dispatcher::{EventDispatcher, MessageHandler};
    use crate::volume::SoftwareMixer;
    use genie_core::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Collector(Mutex<Vec<Message>>);

    impl MessageHandler for Collector {
        fn handle(&self, message: Message) {
            self.0.lock().unwrap().push(message);
        }
    }

    fn setup() -> (
        CallbackSink,
        Arc<AtomicBool>,
        EventDispatcher,
        Arc<Collector>,
    ) {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(Collector::default());
        dispatcher.start(collector.clone()).unwrap();

        let alive = Arc::new(AtomicBool::new(true));
        let volume = VolumeBridge::new(
            Arc::new(SoftwareMixer::new(10, 5)),
            Arc::new(EdgeDetector::new()),
        );
        let sink = CallbackSink::new(alive.clone(), dispatcher.sender(), volume);
        (sink, alive, dispatcher, collector)
    }

    #[test]
    fn test_bound_handle_events_are_posted() {
        let (sink, _alive, dispatcher, collector) = setup();
        let handle = EngineHandle::next();
        sink.bind(handle);

        sink.on_event(handle, Event::status(StatusCode::Authorized));
        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert_eq!(collector.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let (sink, _alive, dispatcher, collector) = setup();
        sink.bind(EngineHandle::next());
        let stale = EngineHandle::next();

        sink.on_event(stale, Event::status(StatusCode::Authorized));
        assert_eq!(sink.volume(stale), None);
        assert!(!sink.set_volume(stale, 80));

        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert!(collector.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_released_session_ignores_callbacks() {
        let (sink, alive, dispatcher, collector) = setup();
        let handle = EngineHandle::next();
        sink.bind(handle);
        alive.store(false, Ordering::Release);

        sink.on_event(
            handle,
            Event::AsrResult {
                text: "late".into(),
            },
        );
        assert_eq!(sink.volume(handle), None);
        assert!(!sink.set_volume(handle, 80));

        assert!(dispatcher.flush(Duration::from_secs(5)));
        assert!(collector.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_volume_queries_answered_synchronously() {
        let (sink, _alive, _dispatcher, _collector) = setup();
        let handle = EngineHandle::next();
        sink.bind(handle);

        assert_eq!(sink.volume(handle), Some(50));
        assert!(sink.set_volume(handle, 80));
        assert_eq!(sink.volume(handle), Some(80));
    }
}
