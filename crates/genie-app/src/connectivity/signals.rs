//! Platform signal sources and the polling task that samples them

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use genie_core::prelude::*;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::ConnectivityMonitor;
use crate::volume::{percent_for_level, AudioOutput};

/// Synchronous reachability check, used when a session starts
pub trait NetworkProbe: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// Sampled platform signals
#[trait_variant::make(SignalSource: Send)]
pub trait LocalSignalSource {
    /// Whether any network route is currently usable
    async fn network_reachable(&self) -> bool;

    /// Current output volume in percent, `None` if unavailable
    async fn volume_percent(&self) -> Option<u8>;
}

/// Signals read from Linux sysfs plus an [`AudioOutput`]
#[derive(Clone)]
pub struct SysfsSignals {
    net_root: PathBuf,
    audio: Arc<dyn AudioOutput>,
}

impl SysfsSignals {
    pub fn new(audio: Arc<dyn AudioOutput>) -> Self {
        Self {
            net_root: PathBuf::from("/sys/class/net"),
            audio,
        }
    }

    /// Read interfaces from a different root instead of `/sys/class/net`
    pub fn with_net_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.net_root = root.into();
        self
    }

    fn any_interface_up(&self) -> bool {
        let entries = match std::fs::read_dir(&self.net_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {:?}: {}", self.net_root, e);
                return false;
            }
        };

        entries.filter_map(|entry| entry.ok()).any(|entry| {
            if entry.file_name() == "lo" {
                return false;
            }
            std::fs::read_to_string(entry.path().join("operstate"))
                .map(|state| state.trim() == "up")
                .unwrap_or(false)
        })
    }
}

impl NetworkProbe for SysfsSignals {
    fn is_reachable(&self) -> bool {
        self.any_interface_up()
    }
}

impl SignalSource for SysfsSignals {
    async fn network_reachable(&self) -> bool {
        self.any_interface_up()
    }

    async fn volume_percent(&self) -> Option<u8> {
        percent_for_level(self.audio.level(), self.audio.max_level())
    }
}

/// Sample `source` every `interval` and feed the levels into `monitor`.
///
/// The first sample is taken immediately. The task ends when `shutdown_rx`
/// flips to `true` or its sender is dropped.
pub fn spawn_poller<S>(
    source: Arc<S>,
    monitor: ConnectivityMonitor,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: SignalSource + Sync + 'static,
{
    tokio::spawn(async move {
        let mut poll_tick = tokio::time::interval(interval);
        poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll_tick.tick() => {
                    let reachable = SignalSource::network_reachable(&*source).await;
                    monitor.on_network_changed(reachable);

                    if let Some(percent) = SignalSource::volume_percent(&*source).await {
                        monitor.on_volume_changed(percent);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Signal poller stopping");
                        break;
                    }
                }
            }
        }
    })
}
