//! Configuration file parsing for genie-bridge
//!
//! Supports:
//! - `config.toml` - Engine registration, storage, device and polling settings

pub mod settings;
pub mod types;

pub use settings::{
    default_config_path, default_credential_path, load_settings, save_settings, CONFIG_ENV,
};
pub use types::*;
