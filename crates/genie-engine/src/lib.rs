//! # genie-engine - Voice Engine Boundary
//!
//! Defines the call surface the bridge uses to drive a voice engine and the
//! callback surface the engine uses to report back.
//!
//! Depends on [`genie_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Engine Boundary
//! - [`Engine`] - Lifecycle and control-plane calls into the engine
//! - [`EngineSink`] - Inbound callbacks (events, volume queries), callable from any thread
//! - [`EngineHandle`] - Opaque, never-reused token for one engine instance
//! - [`HandleParams`] - Device identity, business credentials, persisted credential
//!
//! ### Implementations
//! - [`LoopbackEngine`] - In-process engine answering from its own worker threads
//! - `test_utils::RecordingEngine` - Call-recording double (feature `test-helpers`)

pub mod engine;
pub mod loopback;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use engine::{Engine, EngineHandle, EngineSink, HandleParams};
pub use loopback::LoopbackEngine;
