//! Headless mode - NDJSON event output for scripted hosts
//!
//! Every listener callback of the session is written to stdout as one JSON
//! object per line, so the bridge can be driven and observed by a test script
//! or a supervising process without any UI.
//!
//! # Example Output
//!
//! ```json
//! {"event":"session_started","handle":"engine#1","device_id":"AA:BB:CC:DD:EE:FF","timestamp":1704700001000}
//! {"event":"status","code":"authorized","timestamp":1704700001010}
//! {"event":"asr_result","text":"hello","timestamp":1704700002000}
//! ```

pub mod command;
pub mod runner;

use chrono::Utc;
use genie_core::{CommandCode, Domain, StatusCode};
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

pub use command::HostCommand;
pub use runner::run_headless;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Engine command not consumed by the bridge
    Command {
        domain: Domain,
        code: CommandCode,
        payload: String,
        timestamp: i64,
    },

    Status {
        code: StatusCode,
        timestamp: i64,
    },

    AsrResult {
        text: String,
        timestamp: i64,
    },

    NluResult {
        text: String,
        timestamp: i64,
    },

    /// Binding QR code for a guest device
    MemberQrCode {
        code: String,
        timestamp: i64,
    },

    SessionStarted {
        handle: String,
        device_id: String,
        timestamp: i64,
    },

    SessionStopped {
        timestamp: i64,
    },

    SessionReleased {
        timestamp: i64,
    },

    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn command(domain: Domain, code: CommandCode, payload: &str) -> Self {
        Self::Command {
            domain,
            code,
            payload: payload.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn status(code: StatusCode) -> Self {
        Self::Status {
            code,
            timestamp: Self::now(),
        }
    }

    pub fn asr_result(text: &str) -> Self {
        Self::AsrResult {
            text: text.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn nlu_result(text: &str) -> Self {
        Self::NluResult {
            text: text.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn member_qr_code(code: &str) -> Self {
        Self::MemberQrCode {
            code: code.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn session_started(handle: &str, device_id: &str) -> Self {
        Self::SessionStarted {
            handle: handle.to_string(),
            device_id: device_id.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn session_stopped() -> Self {
        Self::SessionStopped {
            timestamp: Self::now(),
        }
    }

    pub fn session_released() -> Self {
        Self::SessionReleased {
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
