//! Configuration types for genie-bridge
//!
//! Defines:
//! - `Settings` - Global settings loaded from `config.toml`
//! - One sub-struct per TOML section
//! - `SessionConfig` - The resolved values a session needs at runtime

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global settings from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub wakeup: WakeupSettings,
}

/// Cloud product registration handed to the engine on create
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub biz_type: String,

    #[serde(default)]
    pub biz_group: String,

    #[serde(default)]
    pub biz_secret: String,

    /// Path to a PEM file with the gateway CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Where the activation credential is persisted.
    /// Defaults to `<data_local_dir>/genie-bridge/user_info.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Fixed device identifier, bypassing MAC address lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Network interface whose MAC address identifies this device
    #[serde(default = "default_interface")]
    pub interface: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            id: None,
            interface: default_interface(),
        }
    }
}

fn default_interface() -> String {
    "wlan0".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectivitySettings {
    /// How often network reachability and volume are sampled
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

/// Parameters of the push-to-talk wake event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WakeupSettings {
    #[serde(default = "default_wake_word")]
    pub word: String,

    /// Direction of arrival, in degrees
    #[serde(default)]
    pub doa: i32,

    #[serde(default = "default_wake_confidence")]
    pub confidence: f64,
}

impl Default for WakeupSettings {
    fn default() -> Self {
        Self {
            word: default_wake_word(),
            doa: 0,
            confidence: default_wake_confidence(),
        }
    }
}

fn default_wake_word() -> String {
    "tian mao jing ling".to_string()
}

fn default_wake_confidence() -> f64 {
    0.618
}

/// Values a session needs once settings have been resolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub biz_type: String,
    pub biz_group: String,
    pub biz_secret: String,
    /// PEM contents, empty when no certificate is configured
    pub ca_cert: String,
    pub wakeup: WakeupSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device.interface, "wlan0");
        assert_eq!(settings.connectivity.poll_interval_ms, 2000);
        assert_eq!(settings.wakeup.word, "tian mao jing ling");
        assert_eq!(settings.wakeup.doa, 0);
        assert!((settings.wakeup.confidence - 0.618).abs() < f64::EPSILON);
        assert!(settings.storage.credential_file.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[engine]
biz_type = "speaker"

[wakeup]
doa = 90
"#,
        )
        .unwrap();

        assert_eq!(settings.engine.biz_type, "speaker");
        assert_eq!(settings.engine.biz_group, "");
        assert_eq!(settings.wakeup.doa, 90);
        assert_eq!(settings.wakeup.word, "tian mao jing ling");
        assert_eq!(settings.device.interface, "wlan0");
    }
}
