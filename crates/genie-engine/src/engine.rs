//! Engine call surface and inbound callback surface
//!
//! The voice engine is an opaque collaborator. The bridge talks to it through
//! the [`Engine`] trait and receives events through an [`EngineSink`] that the
//! engine may invoke from any of its own threads.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use genie_core::prelude::*;
use genie_core::{Credential, Event, FocusState};

/// Global handle counter
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque token identifying one engine instance.
///
/// Handles are never reused within a process, so a callback tagged with a
/// released handle can always be told apart from one for a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandle(u64);

impl EngineHandle {
    /// Allocate a fresh, process-unique handle
    pub fn next() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Parameters for constructing an engine handle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandleParams {
    /// Hardware identifier of this device (e.g. the wireless MAC address)
    pub device_id: String,
    pub biz_type: String,
    pub biz_group: String,
    pub biz_secret: String,
    /// CA certificate (PEM) used by the engine for its gateway connection
    pub ca_cert: String,
    /// Previously persisted credential, if any
    pub credential: Option<Credential>,
}

/// Calls into the voice engine.
///
/// Every `send_*` method is a fire-and-forget notification; an `Err` means the
/// engine rejected the call, not that the cloud request failed.
pub trait Engine: Send + Sync {
    /// Construct an engine instance. `sink` receives all of its callbacks.
    fn create_handle(
        &self,
        params: HandleParams,
        sink: Arc<dyn EngineSink>,
    ) -> Result<EngineHandle>;

    fn start(&self, handle: EngineHandle) -> Result<()>;

    fn stop(&self, handle: EngineHandle) -> Result<()>;

    /// Release the instance. No callbacks for `handle` are expected afterwards,
    /// but the bridge tolerates late ones.
    fn destroy(&self, handle: EngineHandle);

    fn send_wake(&self, handle: EngineHandle, word: &str, doa: i32, confidence: f64) -> Result<()>;

    fn send_silence(&self, handle: EngineHandle) -> Result<()>;

    fn send_volume_changed(&self, handle: EngineHandle, percent: u8) -> Result<()>;

    fn send_mute_changed(&self, handle: EngineHandle, muted: bool) -> Result<()>;

    fn send_network_up(&self, handle: EngineHandle) -> Result<()>;

    fn send_network_down(&self, handle: EngineHandle) -> Result<()>;

    fn send_text_recognize(&self, handle: EngineHandle, text: &str) -> Result<()>;

    fn send_query_user_info(&self, handle: EngineHandle) -> Result<()>;

    /// Audio focus transitions. Engines without focus handling ignore them.
    fn send_focus_changed(&self, handle: EngineHandle, focus: FocusState) -> Result<()> {
        trace!("{} ignores focus change {:?}", handle, focus);
        Ok(())
    }
}

/// Callbacks from the engine into the bridge.
///
/// Implementations must be callable from any thread, must not block, and must
/// treat calls for an unknown or released handle as no-ops.
pub trait EngineSink: Send + Sync {
    /// An inbound command, status change, or recognition result
    fn on_event(&self, handle: EngineHandle, event: Event);

    /// Current device volume in percent, `None` if unavailable
    fn volume(&self, handle: EngineHandle) -> Option<u8>;

    /// Engine-requested volume change. Returns `true` if it was applied.
    fn set_volume(&self, handle: EngineHandle, percent: u8) -> bool;
}
