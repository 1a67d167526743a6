//! # genie-core - Core Domain Types
//!
//! Foundation crate for the Genie session bridge. Provides domain types, error
//! handling, event definitions and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Events (`events`)
//! - [`Event`] - Inbound engine event (command, status, ASR/NLU result, QR code)
//! - [`Domain`], [`CommandCode`], [`StatusCode`] - SDK code enumerations
//!
//! ### Domain Types (`types`)
//! - [`Credential`] - Activated device identity and access token
//! - [`SessionPhase`] - Lifecycle phase (Idle, Created, Started, Released)
//! - [`ConnectivityEdge`], [`FocusState`] - Platform signal transitions
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error taxonomy with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use genie_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use events::{CommandCode, Domain, Event, StatusCode};
pub use types::{ConnectivityEdge, Credential, FocusState, SessionPhase};
