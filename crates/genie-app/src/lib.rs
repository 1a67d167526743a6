//! # genie-app - Session orchestration for genie-bridge
//!
//! This crate sits between the host application and the voice engine. It
//! owns the session lifecycle, serializes inbound engine events onto a single
//! delivery thread, intercepts activation responses to persist the device
//! credential, and turns polled platform signals into edge notifications.
//!
//! ## Public API
//!
//! - [`SessionController`] / [`SessionBuilder`]: lifecycle, listeners, control plane
//! - [`EventDispatcher`]: the serial delivery queue
//! - [`ConnectivityMonitor`], [`EdgeDetector`], [`spawn_poller`]: platform signals
//! - [`CredentialStore`]: durable credential file
//! - [`VolumeBridge`], [`AudioOutput`]: percent ⇄ device level conversion
//! - [`config`]: `config.toml` settings

pub mod config;
pub mod connectivity;
pub mod credential_store;
pub mod device_id;
pub mod dispatcher;
pub mod session;
pub mod volume;

pub use config::{load_settings, save_settings, SessionConfig, Settings};
pub use connectivity::{
    spawn_poller, ConnectivityMonitor, EdgeDetector, NetworkProbe, SignalSource, SysfsSignals,
};
pub use credential_store::CredentialStore;
pub use device_id::{DeviceIdResolver, InterfaceMacResolver, StaticDeviceId};
pub use dispatcher::{EventDispatcher, EventSender, Message, MessageHandler};
pub use session::{
    CommandListener, SessionBuilder, SessionController, StatusListener, TextListener,
};
pub use volume::{AudioOutput, SoftwareMixer, VolumeBridge};
