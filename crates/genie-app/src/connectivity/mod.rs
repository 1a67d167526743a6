//! Platform signal edge detection
//!
//! The platform reports levels (reachable or not, current volume, current
//! focus). The engine wants transitions. [`EdgeDetector`] keeps the last
//! known value of each signal and turns a new observation into an edge only
//! when it differs; [`ConnectivityMonitor`] posts those edges to the
//! dispatcher, which forwards them to the engine.

pub mod signals;

use std::sync::{Arc, Mutex};

use genie_core::prelude::*;
use genie_core::{ConnectivityEdge, FocusState};

use crate::dispatcher::{EventSender, Message};

pub use signals::{spawn_poller, NetworkProbe, SignalSource, SysfsSignals};

#[derive(Debug, Default)]
struct LastKnown {
    network: Option<bool>,
    volume: Option<u8>,
    focus: Option<FocusState>,
}

/// Level-to-edge converter with de-duplication
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: Mutex<LastKnown>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe network reachability
    pub fn network(&self, reachable: bool) -> Option<ConnectivityEdge> {
        let mut last = self.lock();
        if last.network == Some(reachable) {
            return None;
        }
        last.network = Some(reachable);
        Some(ConnectivityEdge::network(reachable))
    }

    /// Observe device volume in percent (clamped to 100)
    pub fn volume(&self, percent: u8) -> Option<ConnectivityEdge> {
        let percent = percent.min(100);
        let mut last = self.lock();
        if last.volume == Some(percent) {
            return None;
        }
        last.volume = Some(percent);
        Some(ConnectivityEdge::VolumeChanged(percent))
    }

    pub fn focus(&self, state: FocusState) -> Option<ConnectivityEdge> {
        let mut last = self.lock();
        if last.focus == Some(state) {
            return None;
        }
        last.focus = Some(state);
        Some(ConnectivityEdge::focus(state))
    }

    /// Record a network state the engine already knows about
    pub fn prime_network(&self, reachable: bool) {
        self.lock().network = Some(reachable);
    }

    /// Record a volume the engine already knows about
    pub fn prime_volume(&self, percent: u8) {
        self.lock().volume = Some(percent.min(100));
    }

    pub fn last_network(&self) -> Option<bool> {
        self.lock().network
    }

    pub fn last_volume(&self) -> Option<u8> {
        self.lock().volume
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LastKnown> {
        // The state is plain data; a poisoned lock still holds a usable value
        self.last
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Entry point for platform signal observations
#[derive(Clone)]
pub struct ConnectivityMonitor {
    detector: Arc<EdgeDetector>,
    sender: EventSender,
}

impl ConnectivityMonitor {
    pub fn new(detector: Arc<EdgeDetector>, sender: EventSender) -> Self {
        Self { detector, sender }
    }

    pub fn on_network_changed(&self, reachable: bool) {
        if let Some(edge) = self.detector.network(reachable) {
            self.post(edge);
        }
    }

    pub fn on_volume_changed(&self, percent: u8) {
        if let Some(edge) = self.detector.volume(percent) {
            self.post(edge);
        }
    }

    pub fn on_focus_changed(&self, state: FocusState) {
        if let Some(edge) = self.detector.focus(state) {
            self.post(edge);
        }
    }

    fn post(&self, edge: ConnectivityEdge) {
        debug!("Connectivity edge: {:?}", edge);
        self.sender.post(Message::Edge(edge));
    }
}
