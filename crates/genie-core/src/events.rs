//! Engine event definitions
//!
//! The engine reports four kinds of inbound events (commands, status changes,
//! ASR and NLU results). Commands are addressed by a `(Domain, CommandCode)`
//! pair whose numeric values are fixed by the engine SDK.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Command Domains
// ─────────────────────────────────────────────────────────

/// Namespace a command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Account,
    System,
    Microphone,
    Speaker,
    Text,
    Audio,
    SystemControl,
    DotMatrixDisplay,
    Network,
    Light,
    Data,
    Alarm,
    Unknown(i32),
}

impl Domain {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Account,
            1 => Self::System,
            2 => Self::Microphone,
            3 => Self::Speaker,
            4 => Self::Text,
            5 => Self::Audio,
            6 => Self::SystemControl,
            7 => Self::DotMatrixDisplay,
            8 => Self::Network,
            9 => Self::Light,
            10 => Self::Data,
            11 => Self::Alarm,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Account => 0,
            Self::System => 1,
            Self::Microphone => 2,
            Self::Speaker => 3,
            Self::Text => 4,
            Self::Audio => 5,
            Self::SystemControl => 6,
            Self::DotMatrixDisplay => 7,
            Self::Network => 8,
            Self::Light => 9,
            Self::Data => 10,
            Self::Alarm => 11,
            Self::Unknown(raw) => *raw,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Command Codes
// ─────────────────────────────────────────────────────────

/// Command issued by the engine to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCode {
    // Account
    GuestActivateResponse,
    MemberActivateResponse,
    UserInfoResponse,
    // Microphone
    StopListen,
    ExpectSpeechStart,
    ExpectSpeechStop,
    // Speaker
    Speak,
    SetVolume,
    AdjustVolume,
    SetMute,
    // Text
    ListenResult,
    // Audio
    Play,
    PlayOnce,
    ClearQueue,
    // DotMatrixDisplay
    Render,
    // Light
    Adjust,
    // Data
    DataSync,
    // Alarm
    Set,
    // Network
    NetworkConfig,
    // System
    Setting,
    ThrowException,
    Success,
    // SystemControl
    Pause,
    Resume,
    Exit,
    Standby,
    Volume,
    Unknown(u32),
}

impl CommandCode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0 => Self::GuestActivateResponse,
            0x1 => Self::MemberActivateResponse,
            0x2 => Self::UserInfoResponse,
            0x10 => Self::StopListen,
            0x11 => Self::ExpectSpeechStart,
            0x12 => Self::ExpectSpeechStop,
            0x20 => Self::Speak,
            0x21 => Self::SetVolume,
            0x22 => Self::AdjustVolume,
            0x23 => Self::SetMute,
            0x30 => Self::ListenResult,
            0x40 => Self::Play,
            0x41 => Self::PlayOnce,
            0x42 => Self::ClearQueue,
            0x50 => Self::Render,
            0x60 => Self::Adjust,
            0x70 => Self::DataSync,
            0x80 => Self::Set,
            0x100 => Self::NetworkConfig,
            0x1000 => Self::Setting,
            0x1001 => Self::ThrowException,
            0x1002 => Self::Success,
            0x2000 => Self::Pause,
            0x2001 => Self::Resume,
            0x2002 => Self::Exit,
            0x2003 => Self::Standby,
            0x2004 => Self::Volume,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            Self::GuestActivateResponse => 0x0,
            Self::MemberActivateResponse => 0x1,
            Self::UserInfoResponse => 0x2,
            Self::StopListen => 0x10,
            Self::ExpectSpeechStart => 0x11,
            Self::ExpectSpeechStop => 0x12,
            Self::Speak => 0x20,
            Self::SetVolume => 0x21,
            Self::AdjustVolume => 0x22,
            Self::SetMute => 0x23,
            Self::ListenResult => 0x30,
            Self::Play => 0x40,
            Self::PlayOnce => 0x41,
            Self::ClearQueue => 0x42,
            Self::Render => 0x50,
            Self::Adjust => 0x60,
            Self::DataSync => 0x70,
            Self::Set => 0x80,
            Self::NetworkConfig => 0x100,
            Self::Setting => 0x1000,
            Self::ThrowException => 0x1001,
            Self::Success => 0x1002,
            Self::Pause => 0x2000,
            Self::Resume => 0x2001,
            Self::Exit => 0x2002,
            Self::Standby => 0x2003,
            Self::Volume => 0x2004,
            Self::Unknown(raw) => *raw,
        }
    }

    /// Activation responses carry a credential record in their payload
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            Self::GuestActivateResponse | Self::MemberActivateResponse
        )
    }
}

// ─────────────────────────────────────────────────────────
// Status Codes
// ─────────────────────────────────────────────────────────

/// Engine status surfaced to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    NetworkDisconnected,
    NetworkConnected,
    GatewayDisconnected,
    GatewayConnected,
    Unauthorized,
    Authorized,
    SpeakerUnmuted,
    SpeakerMuted,
    MicrophoneWakeup,
    MicrophoneStarted,
    MicrophoneStopped,
    Unknown(i32),
}

impl StatusCode {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::NetworkDisconnected,
            1 => Self::NetworkConnected,
            2 => Self::GatewayDisconnected,
            3 => Self::GatewayConnected,
            4 => Self::Unauthorized,
            5 => Self::Authorized,
            6 => Self::SpeakerUnmuted,
            7 => Self::SpeakerMuted,
            8 => Self::MicrophoneWakeup,
            9 => Self::MicrophoneStarted,
            10 => Self::MicrophoneStopped,
            other => Self::Unknown(other),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            Self::NetworkDisconnected => 0,
            Self::NetworkConnected => 1,
            Self::GatewayDisconnected => 2,
            Self::GatewayConnected => 3,
            Self::Unauthorized => 4,
            Self::Authorized => 5,
            Self::SpeakerUnmuted => 6,
            Self::SpeakerMuted => 7,
            Self::MicrophoneWakeup => 8,
            Self::MicrophoneStarted => 9,
            Self::MicrophoneStopped => 10,
            Self::Unknown(raw) => *raw,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Event Enum
// ─────────────────────────────────────────────────────────

/// Inbound event delivered to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Command {
        domain: Domain,
        code: CommandCode,
        payload: String,
    },
    Status {
        code: StatusCode,
    },
    AsrResult {
        text: String,
    },
    NluResult {
        text: String,
    },
    MemberQrCode {
        code: String,
    },
}

impl Event {
    /// Build a command event from raw SDK integers
    pub fn command_from_raw(domain: i32, code: u32, payload: impl Into<String>) -> Self {
        Self::Command {
            domain: Domain::from_raw(domain),
            code: CommandCode::from_raw(code),
            payload: payload.into(),
        }
    }

    pub fn status(code: StatusCode) -> Self {
        Self::Status { code }
    }

    /// Returns a short string label for this event type (for logging/debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Status { .. } => "status",
            Self::AsrResult { .. } => "asr_result",
            Self::NluResult { .. } => "nlu_result",
            Self::MemberQrCode { .. } => "member_qr_code",
        }
    }
}
