//! File logging for the bridge
//!
//! Stdout belongs to the host protocol (NDJSON events), so every log line goes
//! to a daily-rolling file instead. On devices without a writable data
//! directory the location can be moved with `GENIE_LOG_DIR`.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "GENIE_LOG";

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV: &str = "GENIE_LOG_DIR";

const DEFAULT_FILTER: &str = "genie_bridge=info,genie_app=info,genie_engine=info,warn";

const LOG_FILE_PREFIX: &str = "genie.log";

/// Install the global subscriber.
///
/// Fails with [`Error::Config`] when a subscriber is already installed, so an
/// embedding host that set up its own tracing keeps it.
///
/// # Examples
/// ```bash
/// GENIE_LOG=genie_app::dispatcher=trace genie-bridge
/// GENIE_LOG_DIR=/tmp/genie genie-bridge
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        "genie-bridge {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `GENIE_LOG_DIR`, else `<data_local_dir>/genie-bridge/logs`
pub fn log_directory() -> PathBuf {
    match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("genie-bridge")
            .join("logs"),
    }
}

/// Prefix of the rolling log files; the appender adds a date suffix
pub fn current_log_file() -> PathBuf {
    log_directory().join(LOG_FILE_PREFIX)
}
