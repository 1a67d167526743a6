//! genie-bridge - drive a voice-assistant session from stdin
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use genie_app::config::{default_config_path, load_settings};

/// genie-bridge - session and event bridge for a voice-assistant engine
#[derive(Parser, Debug)]
#[command(name = "genie-bridge")]
#[command(about = "Session and event bridge for a voice-assistant engine", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device identifier, overriding the configured id and the MAC lookup
    #[arg(long, value_name = "ID")]
    device_id: Option<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    genie_core::logging::init()?;

    let config_path = args.config.unwrap_or_else(default_config_path);
    let settings = load_settings(&config_path);

    genie_bridge::run_headless(settings, args.device_id).await?;
    Ok(())
}
