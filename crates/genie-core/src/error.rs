//! Bridge error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types organized by layer
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Session Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to create engine session: {reason}")]
    Init { reason: String },

    #[error("Failed to start engine session: {reason}")]
    Start { reason: String },

    #[error("Cannot {operation} while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("Session has been released")]
    Disposed,

    // ─────────────────────────────────────────────────────────────
    // Delivery Path Errors (absorbed and logged, never surfaced)
    // ─────────────────────────────────────────────────────────────
    #[error("Credential persistence error: {message}")]
    Persistence { message: String },

    #[error("Malformed command payload: {message}")]
    MalformedPayload { message: String },

    // ─────────────────────────────────────────────────────────────
    // Engine Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Engine error: {message}")]
    Engine { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn init(reason: impl Into<String>) -> Self {
        Self::Init {
            reason: reason.into(),
        }
    }

    pub fn start(reason: impl Into<String>) -> Self {
        Self::Start {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, phase: &'static str) -> Self {
        Self::InvalidState { operation, phase }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if the failed operation can simply be retried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Init { .. }
                | Error::Start { .. }
                | Error::Engine { .. }
                | Error::Persistence { .. }
                | Error::MalformedPayload { .. }
        )
    }

    /// Check if the session can no longer be used after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Disposed | Error::ChannelClosed)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
