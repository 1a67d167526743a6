//! Headless mode runner - stdin commands in, NDJSON events out
//!
//! Builds a session on the loopback engine, wires every listener to
//! [`HeadlessEvent::emit`], samples platform signals in the background, and
//! executes line commands from stdin until `quit` or EOF.

use std::io::BufRead;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use genie_app::config::Settings;
use genie_app::connectivity::{spawn_poller, NetworkProbe, SignalSource, SysfsSignals};
use genie_app::volume::percent_for_level;
use genie_app::{
    AudioOutput, CredentialStore, DeviceIdResolver, InterfaceMacResolver, SessionController,
    SoftwareMixer, StaticDeviceId,
};
use genie_core::Result;
use genie_core::{CommandCode, Domain, StatusCode};
use genie_engine::{Engine, LoopbackEngine};

use super::{HeadlessEvent, HostCommand};

/// Platform signals with an optional forced network state
pub struct HostSignals {
    sysfs: SysfsSignals,
    audio: Arc<dyn AudioOutput>,
    forced_network: Mutex<Option<bool>>,
}

impl HostSignals {
    pub fn new(sysfs: SysfsSignals, audio: Arc<dyn AudioOutput>) -> Self {
        Self {
            sysfs,
            audio,
            forced_network: Mutex::new(None),
        }
    }

    pub fn audio(&self) -> &Arc<dyn AudioOutput> {
        &self.audio
    }

    /// `Some` pins reachability, `None` returns to sampling sysfs
    pub fn force_network(&self, reachable: Option<bool>) {
        *self
            .forced_network
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = reachable;
    }

    fn forced(&self) -> Option<bool> {
        *self
            .forced_network
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NetworkProbe for HostSignals {
    fn is_reachable(&self) -> bool {
        self.forced().unwrap_or_else(|| self.sysfs.is_reachable())
    }
}

impl SignalSource for HostSignals {
    async fn network_reachable(&self) -> bool {
        match self.forced() {
            Some(reachable) => reachable,
            None => self.sysfs.network_reachable().await,
        }
    }

    async fn volume_percent(&self) -> Option<u8> {
        self.sysfs.volume_percent().await
    }
}

/// A session plus the host-side signal state the stdin commands act on
pub struct HeadlessHost {
    controller: SessionController,
    signals: Arc<HostSignals>,
}

impl HeadlessHost {
    /// Build the session and route every listener to stdout
    pub fn new(engine: Arc<dyn Engine>, settings: &Settings, signals: Arc<HostSignals>) -> Self {
        let controller =
            SessionController::builder(engine, CredentialStore::new(settings.credential_path()))
                .config(settings.session_config())
                .audio(signals.audio().clone())
                .network(signals.clone())
                .build();

        controller.on_command(Some(Box::new(
            |domain: Domain, code: CommandCode, payload: &str| {
                HeadlessEvent::command(domain, code, payload).emit();
            },
        )));
        controller.on_status(Some(Box::new(|code: StatusCode| {
            HeadlessEvent::status(code).emit();
        })));
        controller.on_asr_result(Some(Box::new(|text: &str| {
            HeadlessEvent::asr_result(text).emit();
        })));
        controller.on_nlu_result(Some(Box::new(|text: &str| {
            HeadlessEvent::nlu_result(text).emit();
        })));
        controller.on_member_qr_code(Some(Box::new(|code: &str| {
            HeadlessEvent::member_qr_code(code).emit();
        })));

        Self {
            controller,
            signals,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn signals(&self) -> &Arc<HostSignals> {
        &self.signals
    }

    /// Create and start the session.
    ///
    /// A create failure is fatal. A start failure is reported and can be
    /// retried with the `start` command.
    pub fn boot(&self, resolver: &dyn DeviceIdResolver) -> Result<()> {
        if let Err(e) = self.controller.create(resolver) {
            error!("Failed to create session: {}", e);
            HeadlessEvent::error(e.to_string(), true).emit();
            return Err(e);
        }

        self.start();
        Ok(())
    }

    fn start(&self) {
        match self.controller.start() {
            Ok(()) => {
                let handle = self
                    .controller
                    .engine_handle()
                    .map(|h| h.to_string())
                    .unwrap_or_default();
                let device_id = self
                    .controller
                    .credential()
                    .map(|c| c.device_id)
                    .unwrap_or_default();
                HeadlessEvent::session_started(&handle, &device_id).emit();
            }
            Err(e) => {
                warn!("Failed to start session: {}", e);
                HeadlessEvent::error(e.to_string(), false).emit();
            }
        }
    }

    /// Run one command. Returns `false` when the host should exit.
    pub fn execute(&self, command: HostCommand) -> bool {
        let result = match command {
            HostCommand::Quit => return false,
            HostCommand::Start => {
                self.start();
                Ok(())
            }
            HostCommand::Stop => self.controller.stop().map(|()| {
                HeadlessEvent::session_stopped().emit();
            }),
            HostCommand::Text(text) => self.controller.submit_text(&text),
            HostCommand::Wake => self.controller.start_record(),
            HostCommand::Silence => self.controller.stop_record(),
            HostCommand::Mute => self.controller.mute(),
            HostCommand::Unmute => self.controller.unmute(),
            HostCommand::UserInfo => self.controller.query_user_info(),
            HostCommand::Volume(percent) => {
                self.set_device_volume(percent);
                Ok(())
            }
            HostCommand::Network(forced) => {
                self.signals.force_network(forced);
                self.controller
                    .connectivity_monitor()
                    .on_network_changed(self.signals.is_reachable());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Command failed: {}", e);
            HeadlessEvent::error(e.to_string(), false).emit();
        }
        true
    }

    /// Act like the user turning the volume knob
    fn set_device_volume(&self, percent: u8) {
        let audio = self.signals.audio();
        let max = audio.max_level();
        let level = (percent as u32 * max + 50) / 100;
        audio.set_level(level);

        if let Some(applied) = percent_for_level(audio.level(), max) {
            self.controller
                .connectivity_monitor()
                .on_volume_changed(applied);
        }
    }

    pub fn shutdown(&self) {
        self.controller.release();
        HeadlessEvent::session_released().emit();
    }
}

/// Run in headless mode on the loopback engine
pub async fn run_headless(settings: Settings, device_id: Option<String>) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("genie-bridge starting in HEADLESS mode");
    info!("Credential file: {}", settings.credential_path().display());
    info!("═══════════════════════════════════════════════════════");

    let audio: Arc<dyn AudioOutput> = Arc::new(SoftwareMixer::default());
    let signals = Arc::new(HostSignals::new(SysfsSignals::new(audio.clone()), audio));
    let host = HeadlessHost::new(Arc::new(LoopbackEngine::new()), &settings, signals.clone());

    let resolver: Box<dyn DeviceIdResolver> = match device_id.or_else(|| settings.device.id.clone())
    {
        Some(id) => Box::new(StaticDeviceId(id)),
        None => Box::new(InterfaceMacResolver::new(settings.device.interface.clone())),
    };
    host.boot(resolver.as_ref())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = spawn_poller(
        signals,
        host.controller().connectivity_monitor(),
        Duration::from_millis(settings.connectivity.poll_interval_ms.max(1)),
        shutdown_rx,
    );

    let mut lines = spawn_stdin_reader();
    while let Some(line) = lines.recv().await {
        match HostCommand::parse(&line) {
            Ok(Some(command)) => {
                if !host.execute(command) {
                    info!("Quit requested");
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => {
                warn!("Stdin: {}", message);
                HeadlessEvent::error(message, false).emit();
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = poller.await {
        warn!("Signal poller ended abnormally: {}", e);
    }

    host.shutdown();
    info!("genie-bridge headless mode exiting");
    Ok(())
}

/// Forward stdin lines from a blocking thread; the channel closes on EOF
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        info!("Stdin reader exiting");
    });

    rx
}
