//! Application listener slots
//!
//! One slot per event kind, each holding at most one callback. Registering
//! `None` clears a slot. Callbacks are invoked outside the slot lock, so a
//! listener may re-register itself or others while running.

use std::sync::{Arc, Mutex};

use genie_core::{CommandCode, Domain, StatusCode};

pub type CommandListener = Box<dyn Fn(Domain, CommandCode, &str) + Send + Sync>;
pub type StatusListener = Box<dyn Fn(StatusCode) + Send + Sync>;
/// ASR text, NLU text, or member QR code
pub type TextListener = Box<dyn Fn(&str) + Send + Sync>;

struct Slot<F: ?Sized> {
    inner: Mutex<Option<Arc<F>>>,
}

impl<F: ?Sized> Default for Slot<F> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<F: ?Sized> Slot<F> {
    fn set(&self, listener: Option<Box<F>>) {
        *self.guard() = listener.map(Arc::from);
    }

    fn get(&self) -> Option<Arc<F>> {
        self.guard().clone()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<Arc<F>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

type CommandFn = dyn Fn(Domain, CommandCode, &str) + Send + Sync;
type StatusFn = dyn Fn(StatusCode) + Send + Sync;
type TextFn = dyn Fn(&str) + Send + Sync;

#[derive(Default)]
pub(crate) struct Listeners {
    command: Slot<CommandFn>,
    status: Slot<StatusFn>,
    asr_result: Slot<TextFn>,
    nlu_result: Slot<TextFn>,
    member_qr_code: Slot<TextFn>,
}

impl Listeners {
    pub fn set_command(&self, listener: Option<CommandListener>) {
        self.command.set(listener);
    }

    pub fn set_status(&self, listener: Option<StatusListener>) {
        self.status.set(listener);
    }

    pub fn set_asr_result(&self, listener: Option<TextListener>) {
        self.asr_result.set(listener);
    }

    pub fn set_nlu_result(&self, listener: Option<TextListener>) {
        self.nlu_result.set(listener);
    }

    pub fn set_member_qr_code(&self, listener: Option<TextListener>) {
        self.member_qr_code.set(listener);
    }

    pub fn clear(&self) {
        self.command.set(None);
        self.status.set(None);
        self.asr_result.set(None);
        self.nlu_result.set(None);
        self.member_qr_code.set(None);
    }

    // Each `emit_*` returns whether a listener was registered

    pub fn emit_command(&self, domain: Domain, code: CommandCode, payload: &str) -> bool {
        self.command
            .get()
            .map(|f| f(domain, code, payload))
            .is_some()
    }

    pub fn emit_status(&self, code: StatusCode) -> bool {
        self.status.get().map(|f| f(code)).is_some()
    }

    pub fn emit_asr_result(&self, text: &str) -> bool {
        self.asr_result.get().map(|f| f(text)).is_some()
    }

    pub fn emit_nlu_result(&self, text: &str) -> bool {
        self.nlu_result.get().map(|f| f(text)).is_some()
    }

    pub fn emit_member_qr_code(&self, code: &str) -> bool {
        self.member_qr_code.get().map(|f| f(code)).is_some()
    }
}
