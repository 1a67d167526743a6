//! In-process loopback engine
//!
//! Behaves like a minimal voice engine without any cloud connection: every
//! started handle gets its own worker thread, and all callbacks into the
//! [`EngineSink`] are made from that thread, the way a native engine calls
//! back from its own execution context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tokio::sync::mpsc;

use genie_core::prelude::*;
use genie_core::{CommandCode, Credential, Domain, Event, FocusState, StatusCode};

use crate::engine::{Engine, EngineHandle, EngineSink, HandleParams};

/// Length of generated guest identifiers and tokens
const GUEST_TOKEN_LEN: usize = 32;

/// Work items for a loopback worker thread
#[derive(Debug)]
enum Action {
    Wake { word: String },
    Silence,
    Text(String),
    Mute(bool),
    Network(bool),
    Volume(u8),
    Focus(FocusState),
    QueryUserInfo,
}

struct Worker {
    tx: mpsc::UnboundedSender<Action>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

struct LoopbackSession {
    params: HandleParams,
    sink: Arc<dyn EngineSink>,
    worker: Option<Worker>,
}

/// An [`Engine`] that answers locally from a worker thread per handle
#[derive(Default)]
pub struct LoopbackEngine {
    sessions: Mutex<HashMap<EngineHandle, LoopbackSession>>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles that have been created and not destroyed
    pub fn live_handles(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EngineHandle, LoopbackSession>> {
        // A poisoned map only means a caller panicked mid-call; the data is still consistent.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn dispatch(&self, handle: EngineHandle, action: Action) -> Result<()> {
        let sessions = self.lock();
        let session = sessions
            .get(&handle)
            .ok_or_else(|| Error::engine(format!("unknown handle {}", handle)))?;
        let worker = session
            .worker
            .as_ref()
            .ok_or_else(|| Error::engine(format!("{} is not running", handle)))?;
        worker
            .tx
            .send(action)
            .map_err(|_| Error::engine(format!("{} worker has exited", handle)))
    }

    /// Like `dispatch`, but a stopped handle accepts the notification silently
    fn notify(&self, handle: EngineHandle, action: Action) -> Result<()> {
        let sessions = self.lock();
        let session = sessions
            .get(&handle)
            .ok_or_else(|| Error::engine(format!("unknown handle {}", handle)))?;
        match &session.worker {
            Some(worker) => {
                let _ = worker.tx.send(action);
            }
            None => debug!("{} not running, dropping {:?}", handle, action),
        }
        Ok(())
    }

    fn take_worker(&self, handle: EngineHandle) -> Option<Worker> {
        self.lock()
            .get_mut(&handle)
            .and_then(|session| session.worker.take())
    }
}

impl Engine for LoopbackEngine {
    fn create_handle(
        &self,
        params: HandleParams,
        sink: Arc<dyn EngineSink>,
    ) -> Result<EngineHandle> {
        if params.device_id.trim().is_empty() {
            return Err(Error::init("device id is empty"));
        }

        let handle = EngineHandle::next();
        info!(
            "Loopback engine created {} for device {} (credential: {})",
            handle,
            params.device_id,
            params.credential.is_some()
        );
        self.lock().insert(
            handle,
            LoopbackSession {
                params,
                sink,
                worker: None,
            },
        );
        Ok(handle)
    }

    fn start(&self, handle: EngineHandle) -> Result<()> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&handle)
            .ok_or_else(|| Error::start(format!("unknown handle {}", handle)))?;

        if session.worker.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let state = WorkerState {
            handle,
            sink: Arc::clone(&session.sink),
            credential: session
                .params
                .credential
                .clone()
                .filter(Credential::is_authenticated),
            guest: false,
        };

        let thread = thread::Builder::new()
            .name(format!("loopback-{}", handle.id()))
            .spawn(move || state.run(rx))
            .map_err(|e| Error::start(format!("failed to spawn worker: {}", e)))?;

        session.worker = Some(Worker {
            tx,
            thread_id: thread.thread().id(),
            thread: Some(thread),
        });
        info!("Loopback engine started {}", handle);
        Ok(())
    }

    fn stop(&self, handle: EngineHandle) -> Result<()> {
        let Some(mut worker) = self.take_worker(handle) else {
            return Ok(());
        };

        // Closing the channel ends the worker loop
        drop(worker.tx);
        if let Some(thread) = worker.thread.take() {
            if thread::current().id() == worker.thread_id {
                warn!("{} stopped from its own worker thread, not joining", handle);
            } else if thread.join().is_err() {
                return Err(Error::engine(format!("{} worker panicked", handle)));
            }
        }
        info!("Loopback engine stopped {}", handle);
        Ok(())
    }

    fn destroy(&self, handle: EngineHandle) {
        if let Err(e) = self.stop(handle) {
            warn!("Error stopping {} during destroy: {}", handle, e);
        }
        if self.lock().remove(&handle).is_some() {
            info!("Loopback engine destroyed {}", handle);
        }
    }

    fn send_wake(&self, handle: EngineHandle, word: &str, doa: i32, confidence: f64) -> Result<()> {
        debug!(
            "{} wakeup '{}' doa={} confidence={:.3}",
            handle, word, doa, confidence
        );
        self.dispatch(
            handle,
            Action::Wake {
                word: word.to_string(),
            },
        )
    }

    fn send_silence(&self, handle: EngineHandle) -> Result<()> {
        self.dispatch(handle, Action::Silence)
    }

    fn send_volume_changed(&self, handle: EngineHandle, percent: u8) -> Result<()> {
        self.notify(handle, Action::Volume(percent))
    }

    fn send_mute_changed(&self, handle: EngineHandle, muted: bool) -> Result<()> {
        self.notify(handle, Action::Mute(muted))
    }

    fn send_network_up(&self, handle: EngineHandle) -> Result<()> {
        self.notify(handle, Action::Network(true))
    }

    fn send_network_down(&self, handle: EngineHandle) -> Result<()> {
        self.notify(handle, Action::Network(false))
    }

    fn send_text_recognize(&self, handle: EngineHandle, text: &str) -> Result<()> {
        self.dispatch(handle, Action::Text(text.to_string()))
    }

    fn send_query_user_info(&self, handle: EngineHandle) -> Result<()> {
        self.dispatch(handle, Action::QueryUserInfo)
    }

    fn send_focus_changed(&self, handle: EngineHandle, focus: FocusState) -> Result<()> {
        self.notify(handle, Action::Focus(focus))
    }
}

/// State owned by one worker thread
struct WorkerState {
    handle: EngineHandle,
    sink: Arc<dyn EngineSink>,
    credential: Option<Credential>,
    guest: bool,
}

impl WorkerState {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<Action>) {
        self.emit(Event::status(StatusCode::GatewayConnected));
        self.authorize();

        while let Some(action) = rx.blocking_recv() {
            trace!("{} handling {:?}", self.handle, action);
            self.handle_action(action);
        }

        self.emit(Event::status(StatusCode::GatewayDisconnected));
        debug!("{} worker exiting", self.handle);
    }

    fn emit(&self, event: Event) {
        self.sink.on_event(self.handle, event);
    }

    fn authorize(&mut self) {
        if self.credential.is_some() {
            self.emit(Event::status(StatusCode::Authorized));
            return;
        }

        self.emit(Event::status(StatusCode::Unauthorized));
        let credential = Credential::new(random_token(), random_token());
        let payload = json!({
            "uuid": credential.device_id,
            "accessToken": credential.access_token,
        });
        self.emit(Event::Command {
            domain: Domain::Account,
            code: CommandCode::GuestActivateResponse,
            payload: payload.to_string(),
        });
        self.credential = Some(credential);
        self.guest = true;
        self.emit(Event::status(StatusCode::Authorized));
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Wake { .. } => {
                self.emit(Event::status(StatusCode::MicrophoneWakeup));
                self.emit(Event::status(StatusCode::MicrophoneStarted));
            }
            Action::Silence => {
                self.emit(Event::status(StatusCode::MicrophoneStopped));
            }
            Action::Text(text) => self.recognize(&text),
            Action::Mute(true) => self.emit(Event::status(StatusCode::SpeakerMuted)),
            Action::Mute(false) => self.emit(Event::status(StatusCode::SpeakerUnmuted)),
            Action::Network(true) => self.emit(Event::status(StatusCode::NetworkConnected)),
            Action::Network(false) => self.emit(Event::status(StatusCode::NetworkDisconnected)),
            Action::Volume(percent) => {
                debug!("{} speaker volume now {}%", self.handle, percent);
            }
            Action::Focus(focus) => {
                debug!("{} audio focus {:?}", self.handle, focus);
            }
            Action::QueryUserInfo => self.user_info(),
        }
    }

    fn recognize(&self, text: &str) {
        self.emit(Event::AsrResult {
            text: text.to_string(),
        });

        let reply = match parse_volume_request(text) {
            Some(percent) => {
                let applied = self.sink.set_volume(self.handle, percent);
                self.emit(Event::NluResult {
                    text: json!({ "query": text, "intent": "volume", "slots": { "percent": percent } })
                        .to_string(),
                });
                if applied {
                    format!("Volume set to {} percent", percent)
                } else {
                    "Sorry, I could not change the volume".to_string()
                }
            }
            None => {
                self.emit(Event::NluResult {
                    text: json!({ "query": text, "intent": "chat" }).to_string(),
                });
                format!("You said: {}", text)
            }
        };

        self.emit(Event::Command {
            domain: Domain::Speaker,
            code: CommandCode::Speak,
            payload: json!({ "text": reply }).to_string(),
        });
    }

    fn user_info(&self) {
        let uuid = self
            .credential
            .as_ref()
            .map(|c| c.device_id.clone())
            .unwrap_or_default();
        let payload = if self.guest {
            json!({
                "userType": "guest",
                "qrCode": format!("https://loopback.invalid/bind?uuid={}", uuid),
            })
        } else {
            json!({ "userType": "member", "uuid": uuid })
        };
        self.emit(Event::Command {
            domain: Domain::Account,
            code: CommandCode::UserInfoResponse,
            payload: payload.to_string(),
        });
    }
}

/// "volume 40" / "set volume to 40" style utterances
fn parse_volume_request(text: &str) -> Option<u8> {
    let lower = text.to_lowercase();
    if !lower.contains("volume") {
        return None;
    }
    lower
        .split_whitespace()
        .filter_map(|word| word.trim_end_matches('%').parse::<u8>().ok())
        .find(|percent| *percent <= 100)
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GUEST_TOKEN_LEN)
        .map(char::from)
        .collect()
}
