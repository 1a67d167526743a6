//! genie-bridge Library
//!
//! Hosts a voice-assistant session with no UI: stdin line commands drive the
//! session and every callback is written to stdout as NDJSON.

pub mod headless;

pub use headless::run_headless;
