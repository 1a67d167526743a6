//! Settings parser for `config.toml`

use super::types::{SessionConfig, Settings};
use genie_core::prelude::*;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "genie-bridge";
const CONFIG_FILENAME: &str = "config.toml";
const CREDENTIAL_FILENAME: &str = "user_info.json";

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "GENIE_CONFIG";

// ─────────────────────────────────────────────────────────────────────────────
// Paths
// ─────────────────────────────────────────────────────────────────────────────

/// Location of `config.toml`.
///
/// `GENIE_CONFIG` wins, then `<config_dir>/genie-bridge/config.toml`, then the
/// current directory when no platform config dir exists.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILENAME)
}

/// Default credential file: `<data_local_dir>/genie-bridge/user_info.json`
pub fn default_credential_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CREDENTIAL_FILENAME)
}

impl Settings {
    /// Credential file from `[storage]`, or the platform default
    pub fn credential_path(&self) -> PathBuf {
        self.storage
            .credential_file
            .clone()
            .unwrap_or_else(default_credential_path)
    }

    /// Resolve the values a session needs.
    ///
    /// An unreadable CA certificate is logged and left empty; the engine
    /// decides whether it can connect without one.
    pub fn session_config(&self) -> SessionConfig {
        let ca_cert = match &self.engine.ca_cert {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(pem) => pem,
                Err(e) => {
                    warn!("Failed to read CA certificate {:?}: {}", path, e);
                    String::new()
                }
            },
            None => String::new(),
        };

        SessionConfig {
            biz_type: self.engine.biz_type.clone(),
            biz_group: self.engine.biz_group.clone(),
            biz_secret: self.engine.biz_secret.clone(),
            ca_cert,
            wakeup: self.wakeup.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / Save
// ─────────────────────────────────────────────────────────────────────────────

/// Load settings from `path`.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Save settings to `path` atomically (temp file, then rename)
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e)))?;
    }

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("{}{}", config_header(), content);

    let temp_path = dir.join(".config.toml.tmp");
    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", path);
    Ok(())
}

fn config_header() -> &'static str {
    "# genie-bridge configuration\n\n"
}
