//! Session lifecycle and inbound event handling
//!
//! [`SessionController`] owns the one engine instance of this process. Host
//! code drives its lifecycle (`create` → `start` ⇄ `stop` → `release`) and
//! registers listeners; engine callbacks and platform signal edges reach it
//! through the [`EventDispatcher`] and are handled one at a time on the
//! delivery thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use genie_core::prelude::*;
use genie_core::{CommandCode, ConnectivityEdge, Credential, Event, FocusState, SessionPhase};
use genie_engine::{Engine, EngineHandle, HandleParams};

use super::listeners::{CommandListener, Listeners, StatusListener, TextListener};
use super::sink::CallbackSink;
use crate::config::SessionConfig;
use crate::connectivity::{ConnectivityMonitor, EdgeDetector, NetworkProbe, SysfsSignals};
use crate::credential_store::CredentialStore;
use crate::device_id::DeviceIdResolver;
use crate::dispatcher::{EventDispatcher, Message, MessageHandler};
use crate::volume::{AudioOutput, SoftwareMixer, VolumeBridge};

/// Assembles a [`SessionController`]
pub struct SessionBuilder {
    engine: Arc<dyn Engine>,
    store: CredentialStore,
    config: SessionConfig,
    audio: Option<Arc<dyn AudioOutput>>,
    network: Option<Arc<dyn NetworkProbe>>,
}

impl SessionBuilder {
    pub fn new(engine: Arc<dyn Engine>, store: CredentialStore) -> Self {
        Self {
            engine,
            store,
            config: SessionConfig::default(),
            audio: None,
            network: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Device audio output (default: a [`SoftwareMixer`])
    pub fn audio(mut self, audio: Arc<dyn AudioOutput>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Reachability check used when the session starts (default: sysfs)
    pub fn network(mut self, network: Arc<dyn NetworkProbe>) -> Self {
        self.network = Some(network);
        self
    }

    /// Build the controller, loading any persisted credential
    pub fn build(self) -> SessionController {
        let audio = self
            .audio
            .unwrap_or_else(|| Arc::new(SoftwareMixer::default()));
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(SysfsSignals::new(audio.clone())));
        let detector = Arc::new(EdgeDetector::new());
        let identity = self.store.load();

        match &identity {
            Some(credential) => info!("Loaded credential for {}", credential.device_id),
            None => info!("No stored credential, starting unauthenticated"),
        }

        SessionController {
            inner: Arc::new(Inner {
                engine: self.engine,
                config: self.config,
                store: self.store,
                identity: Mutex::new(identity),
                lifecycle: Mutex::new(Lifecycle::default()),
                listeners: Listeners::default(),
                dispatcher: EventDispatcher::new(),
                volume: VolumeBridge::new(audio, detector.clone()),
                detector,
                network,
                alive: Arc::new(AtomicBool::new(true)),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Lifecycle {
    phase: SessionPhase,
    handle: Option<EngineHandle>,
}

/// The bridge's handle to one engine instance.
///
/// Dropping the controller releases the session.
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn builder(engine: Arc<dyn Engine>, store: CredentialStore) -> SessionBuilder {
        SessionBuilder::new(engine, store)
    }

    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────

    /// Construct the engine instance. A no-op when already created.
    pub fn create(&self, device_id: &dyn DeviceIdResolver) -> Result<()> {
        self.inner.create(device_id)
    }

    /// Start the engine, then push the current volume and network state.
    ///
    /// On failure the session stays created and `start` may be retried.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Stop the engine. A no-op unless started; engine errors are logged.
    /// Only fails with [`Error::Disposed`] after release.
    pub fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    /// Tear down delivery, clear listeners and destroy the engine instance.
    ///
    /// No listener runs after this returns (unless it is called from inside
    /// a listener, in which case that invocation finishes first). Idempotent.
    pub fn release(&self) {
        self.inner.release();
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lifecycle().phase
    }

    pub fn is_created(&self) -> bool {
        matches!(self.phase(), SessionPhase::Created | SessionPhase::Started)
    }

    pub fn is_started(&self) -> bool {
        self.phase() == SessionPhase::Started
    }

    pub fn engine_handle(&self) -> Option<EngineHandle> {
        self.inner.lifecycle().handle
    }

    /// The credential currently in effect
    pub fn credential(&self) -> Option<Credential> {
        self.inner.credential()
    }

    // ─────────────────────────────────────────────────────────
    // Listeners
    // ─────────────────────────────────────────────────────────

    pub fn on_command(&self, listener: Option<CommandListener>) {
        if self.inner.accepts_registration("command") {
            self.inner.listeners.set_command(listener);
        }
    }

    pub fn on_status(&self, listener: Option<StatusListener>) {
        if self.inner.accepts_registration("status") {
            self.inner.listeners.set_status(listener);
        }
    }

    pub fn on_asr_result(&self, listener: Option<TextListener>) {
        if self.inner.accepts_registration("asr result") {
            self.inner.listeners.set_asr_result(listener);
        }
    }

    pub fn on_nlu_result(&self, listener: Option<TextListener>) {
        if self.inner.accepts_registration("nlu result") {
            self.inner.listeners.set_nlu_result(listener);
        }
    }

    pub fn on_member_qr_code(&self, listener: Option<TextListener>) {
        if self.inner.accepts_registration("member qr code") {
            self.inner.listeners.set_member_qr_code(listener);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Platform signals
    // ─────────────────────────────────────────────────────────

    pub fn notify_network_up(&self) -> Result<()> {
        self.inner.forward_edge(ConnectivityEdge::NetworkUp)
    }

    pub fn notify_network_down(&self) -> Result<()> {
        self.inner.forward_edge(ConnectivityEdge::NetworkDown)
    }

    pub fn notify_volume(&self, percent: u8) -> Result<()> {
        self.inner
            .forward_edge(ConnectivityEdge::VolumeChanged(percent.min(100)))
    }

    pub fn notify_focus(&self, state: FocusState) -> Result<()> {
        self.inner.forward_edge(ConnectivityEdge::focus(state))
    }

    /// De-duplicating entry point for platform observations
    pub fn connectivity_monitor(&self) -> ConnectivityMonitor {
        ConnectivityMonitor::new(self.inner.detector.clone(), self.inner.dispatcher.sender())
    }

    pub fn volume_bridge(&self) -> VolumeBridge {
        self.inner.volume.clone()
    }

    // ─────────────────────────────────────────────────────────
    // Control plane (requires started)
    // ─────────────────────────────────────────────────────────

    /// Recognize `text` as if it had been spoken
    pub fn submit_text(&self, text: &str) -> Result<()> {
        let handle = self.inner.started_handle("submit text")?;
        self.inner.engine.send_text_recognize(handle, text)
    }

    pub fn wake(&self, word: &str, doa: i32, confidence: f64) -> Result<()> {
        let handle = self.inner.started_handle("wake")?;
        self.inner.engine.send_wake(handle, word, doa, confidence)
    }

    pub fn silence(&self) -> Result<()> {
        let handle = self.inner.started_handle("signal silence")?;
        self.inner.engine.send_silence(handle)
    }

    /// Push-to-talk: wake with the configured word
    pub fn start_record(&self) -> Result<()> {
        let handle = self.inner.started_handle("start recording")?;
        let wakeup = &self.inner.config.wakeup;
        self.inner
            .engine
            .send_wake(handle, &wakeup.word, wakeup.doa, wakeup.confidence)
    }

    pub fn stop_record(&self) -> Result<()> {
        let handle = self.inner.started_handle("stop recording")?;
        self.inner.engine.send_silence(handle)
    }

    pub fn mute(&self) -> Result<()> {
        self.inner.set_muted(true)
    }

    pub fn unmute(&self) -> Result<()> {
        self.inner.set_muted(false)
    }

    /// Ask the engine for account details; a guest answer yields a QR code
    pub fn query_user_info(&self) -> Result<()> {
        let handle = self.inner.started_handle("query user info")?;
        self.inner.engine.send_query_user_info(handle)
    }

    /// Wait until every event posted so far has been delivered.
    ///
    /// Returns `false` on timeout, before start, after release, or when
    /// called from a listener.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.inner.dispatcher.flush(timeout)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.inner.release();
    }
}

// ─────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────

struct Inner {
    engine: Arc<dyn Engine>,
    config: SessionConfig,
    store: CredentialStore,
    identity: Mutex<Option<Credential>>,
    lifecycle: Mutex<Lifecycle>,
    listeners: Listeners,
    dispatcher: EventDispatcher,
    detector: Arc<EdgeDetector>,
    volume: VolumeBridge,
    network: Arc<dyn NetworkProbe>,
    /// Cleared first thing on release; every callback entry checks it
    alive: Arc<AtomicBool>,
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn credential(&self) -> Option<Credential> {
        self.identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.alive.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::Disposed)
        }
    }

    fn accepts_registration(&self, kind: &str) -> bool {
        let alive = self.alive.load(Ordering::Acquire);
        if !alive {
            debug!("Ignoring {} listener registration after release", kind);
        }
        alive
    }

    /// Lifecycle setup must not run inside a listener callback
    fn ensure_outside_delivery(&self, operation: &'static str) -> Result<()> {
        if self.dispatcher.is_delivery_thread() {
            let phase = self.lifecycle().phase;
            warn!("Rejecting {} from the delivery thread", operation);
            return Err(Error::invalid_state(operation, phase.as_str()));
        }
        Ok(())
    }

    fn create(&self, resolver: &dyn DeviceIdResolver) -> Result<()> {
        self.ensure_alive()?;
        self.ensure_outside_delivery("create")?;
        let mut lifecycle = self.lifecycle();

        match lifecycle.phase {
            SessionPhase::Idle => {}
            SessionPhase::Released => return Err(Error::Disposed),
            SessionPhase::Created | SessionPhase::Started => {
                debug!("Session already created, ignoring create");
                return Ok(());
            }
        }

        let device_id = resolver
            .resolve()
            .ok_or_else(|| Error::init("device identifier could not be resolved"))?;

        let sink = Arc::new(CallbackSink::new(
            self.alive.clone(),
            self.dispatcher.sender(),
            self.volume.clone(),
        ));
        let params = HandleParams {
            device_id: device_id.clone(),
            biz_type: self.config.biz_type.clone(),
            biz_group: self.config.biz_group.clone(),
            biz_secret: self.config.biz_secret.clone(),
            ca_cert: self.config.ca_cert.clone(),
            credential: self.credential(),
        };

        let handle = self
            .engine
            .create_handle(params, sink.clone())
            .map_err(|e| match e {
                Error::Init { .. } => e,
                other => Error::init(other.to_string()),
            })?;
        sink.bind(handle);

        lifecycle.handle = Some(handle);
        lifecycle.phase = SessionPhase::Created;
        info!("Created {} for device {}", handle, device_id);
        Ok(())
    }

    fn start(self: &Arc<Self>) -> Result<()> {
        self.ensure_alive()?;
        self.ensure_outside_delivery("start")?;

        let mut lifecycle = self.lifecycle();
        let handle = match (lifecycle.phase, lifecycle.handle) {
            (SessionPhase::Created, Some(handle)) => handle,
            (SessionPhase::Started, _) => {
                debug!("Session already started, ignoring start");
                return Ok(());
            }
            (SessionPhase::Released, _) => return Err(Error::Disposed),
            _ => return Err(Error::start("session has not been created")),
        };

        self.dispatcher
            .start(self.clone())
            .map_err(|e| Error::start(format!("event delivery unavailable: {}", e)))?;

        self.engine.start(handle).map_err(|e| match e {
            Error::Start { .. } => e,
            other => Error::start(other.to_string()),
        })?;

        lifecycle.phase = SessionPhase::Started;
        info!("Started {}", handle);

        // Still holding the lifecycle lock, so release cannot destroy the handle under us
        if self.alive.load(Ordering::Acquire) {
            self.push_platform_state(handle);
        }
        Ok(())
    }

    /// Synthetic first events: the engine learns the current volume and
    /// network state once, and the detector is primed so the poller does
    /// not repeat them.
    fn push_platform_state(&self, handle: EngineHandle) {
        if let Some(percent) = self.volume.current_percent() {
            self.detector.prime_volume(percent);
            if let Err(e) = self.engine.send_volume_changed(handle, percent) {
                warn!("Failed to push initial volume {}%: {}", percent, e);
            }
        }

        let reachable = self.network.is_reachable();
        self.detector.prime_network(reachable);
        let result = if reachable {
            self.engine.send_network_up(handle)
        } else {
            self.engine.send_network_down(handle)
        };
        if let Err(e) = result {
            warn!("Failed to push initial network state: {}", e);
        }
    }

    fn stop(&self) -> Result<()> {
        self.ensure_alive()?;
        let mut lifecycle = self.lifecycle();

        let handle = match (lifecycle.phase, lifecycle.handle) {
            (SessionPhase::Started, Some(handle)) => handle,
            (phase, _) => {
                debug!("Session is {}, ignoring stop", phase);
                return Ok(());
            }
        };

        if let Err(e) = self.engine.stop(handle) {
            warn!("Engine stop failed for {}: {}", handle, e);
        }
        lifecycle.phase = SessionPhase::Created;
        info!("Stopped {}", handle);
        Ok(())
    }

    fn release(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }

        self.dispatcher.shutdown();
        self.listeners.clear();

        let mut lifecycle = self.lifecycle();
        if let Some(handle) = lifecycle.handle.take() {
            if lifecycle.phase == SessionPhase::Started {
                if let Err(e) = self.engine.stop(handle) {
                    warn!("Engine stop failed during release of {}: {}", handle, e);
                }
            }
            self.engine.destroy(handle);
            info!("Released {}", handle);
        }
        lifecycle.phase = SessionPhase::Released;
    }

    fn started_handle(&self, operation: &'static str) -> Result<EngineHandle> {
        self.ensure_alive()?;
        let lifecycle = self.lifecycle();
        match (lifecycle.phase, lifecycle.handle) {
            (SessionPhase::Started, Some(handle)) => Ok(handle),
            (SessionPhase::Released, _) => Err(Error::Disposed),
            (phase, _) => Err(Error::invalid_state(operation, phase.as_str())),
        }
    }

    fn set_muted(&self, muted: bool) -> Result<()> {
        let handle = self.started_handle(if muted { "mute" } else { "unmute" })?;
        if !self.volume.apply_mute(muted) {
            warn!("Audio output refused mute={}", muted);
        }
        self.engine.send_mute_changed(handle, muted)
    }

    fn forward_edge(&self, edge: ConnectivityEdge) -> Result<()> {
        self.ensure_alive()?;

        let Some(handle) = self.lifecycle().handle else {
            warn!("Dropping {:?}: session not created yet", edge);
            return Ok(());
        };

        match edge {
            ConnectivityEdge::NetworkUp => self.engine.send_network_up(handle),
            ConnectivityEdge::NetworkDown => self.engine.send_network_down(handle),
            ConnectivityEdge::VolumeChanged(percent) => {
                self.engine.send_volume_changed(handle, percent)
            }
            ConnectivityEdge::FocusGained => {
                self.engine.send_focus_changed(handle, FocusState::Gained)
            }
            ConnectivityEdge::FocusLost => self.engine.send_focus_changed(handle, FocusState::Lost),
            ConnectivityEdge::FocusTransient => self
                .engine
                .send_focus_changed(handle, FocusState::Transient),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Inbound events (delivery thread only)
    // ─────────────────────────────────────────────────────────

    fn handle_event(&self, event: Event) {
        match event {
            Event::Command { code, payload, .. } if code.is_activation() => {
                self.persist_activation(code, &payload);
            }
            Event::Command {
                domain,
                code: CommandCode::UserInfoResponse,
                payload,
            } => match guest_qr_code(&payload) {
                Some(qr_code) => {
                    self.listeners.emit_member_qr_code(&qr_code);
                }
                None => {
                    self.listeners
                        .emit_command(domain, CommandCode::UserInfoResponse, &payload);
                }
            },
            Event::Command {
                domain,
                code,
                payload,
            } => {
                self.listeners.emit_command(domain, code, &payload);
            }
            Event::Status { code } => {
                self.listeners.emit_status(code);
            }
            Event::AsrResult { text } => {
                self.listeners.emit_asr_result(&text);
            }
            Event::NluResult { text } => {
                self.listeners.emit_nlu_result(&text);
            }
            Event::MemberQrCode { code } => {
                self.listeners.emit_member_qr_code(&code);
            }
        }
    }

    /// Store the credential carried by an activation response.
    ///
    /// The file is written before the in-memory identity changes.
    fn persist_activation(&self, code: CommandCode, payload: &str) {
        let credential = match Credential::from_activation_payload(payload) {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Dropping {:?}: {}", code, e);
                return;
            }
        };

        if let Err(e) = self.store.save(&credential) {
            error!(
                "Credential for {} not persisted: {}",
                credential.device_id, e
            );
        }

        info!("Activated as {} ({:?})", credential.device_id, code);
        *self
            .identity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credential);
    }
}

impl MessageHandler for Inner {
    fn handle(&self, message: Message) {
        if !self.alive.load(Ordering::Acquire) {
            return;
        }

        match message {
            Message::Engine(event) => self.handle_event(event),
            Message::Edge(edge) => {
                if let Err(e) = self.forward_edge(edge) {
                    warn!("Failed to forward {:?} to engine: {}", edge, e);
                }
            }
        }
    }
}

/// QR code of a guest `UserInfoResponse`, `None` for members or unreadable payloads
fn guest_qr_code(payload: &str) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("User info payload is not JSON: {}", e);
            return None;
        }
    };

    if value.get("userType").and_then(|v| v.as_str()) != Some("guest") {
        return None;
    }

    let qr_code = value.get("qrCode").and_then(|v| v.as_str());
    if qr_code.is_none() {
        warn!("Guest user info without qrCode");
    }
    qr_code.map(str::to_string)
}
