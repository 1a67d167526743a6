//! Core domain types
//!
//! Defines:
//! - `Credential` - cloud-assigned device identity plus access token
//! - `SessionPhase` - lifecycle phase of a session
//! - `FocusState` / `ConnectivityEdge` - derived platform signal transitions

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Device identity issued by the engine's cloud backend on activation.
///
/// Stored on disk as `{"uuid": "...", "accessToken": "..."}`, the same shape the
/// activation payload uses, so an activation response can be persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "uuid", alias = "deviceId")]
    pub device_id: String,

    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
}

impl Credential {
    pub fn new(device_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            access_token: Some(access_token.into()),
        }
    }

    /// Parse the payload of a guest/member activation response.
    ///
    /// Both `uuid` and `accessToken` must be present and non-empty strings.
    pub fn from_activation_payload(payload: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| Error::malformed_payload(format!("activation payload: {}", e)))?;

        let device_id = required_str(&value, "uuid")?;
        let access_token = required_str(&value, "accessToken")?;

        Ok(Self::new(device_id, access_token))
    }

    /// A credential is only usable when it carries a token
    pub fn is_authenticated(&self) -> bool {
        !self.device_id.is_empty()
            && self
                .access_token
                .as_deref()
                .is_some_and(|token| !token.is_empty())
    }
}

fn required_str<'a>(value: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    match value.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(Error::malformed_payload(format!(
            "missing or empty string field '{}'",
            key
        ))),
    }
}

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Created,
    Started,
    Released,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "not created",
            SessionPhase::Created => "stopped",
            SessionPhase::Started => "started",
            SessionPhase::Released => "released",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audio focus held by this device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    Gained,
    Lost,
    /// Focus temporarily taken by another stream (e.g. a notification)
    Transient,
}

/// A transition of an observed platform signal.
///
/// Derived by diffing the current platform state with the last known state;
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    NetworkUp,
    NetworkDown,
    VolumeChanged(u8),
    FocusGained,
    FocusLost,
    FocusTransient,
}

impl ConnectivityEdge {
    pub fn network(reachable: bool) -> Self {
        if reachable {
            Self::NetworkUp
        } else {
            Self::NetworkDown
        }
    }

    pub fn focus(state: FocusState) -> Self {
        match state {
            FocusState::Gained => Self::FocusGained,
            FocusState::Lost => Self::FocusLost,
            FocusState::Transient => Self::FocusTransient,
        }
    }
}
