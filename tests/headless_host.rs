//! Headless host command handling against a recording engine

use std::sync::Arc;
use std::time::Duration;

use genie_app::config::Settings;
use genie_app::{AudioOutput, InterfaceMacResolver, SoftwareMixer, StaticDeviceId, SysfsSignals};
use genie_bridge::headless::runner::{HeadlessHost, HostSignals};
use genie_bridge::headless::HostCommand;
use genie_core::{Error, SessionPhase};
use genie_engine::test_utils::{EngineCall, RecordingEngine};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    dir: TempDir,
    engine: Arc<RecordingEngine>,
    host: HeadlessHost,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("net")).unwrap();

    let mut settings = Settings::default();
    settings.storage.credential_file = Some(dir.path().join("user_info.json"));

    let audio: Arc<dyn AudioOutput> = Arc::new(SoftwareMixer::new(15, 7));
    let signals = Arc::new(HostSignals::new(
        SysfsSignals::new(audio.clone()).with_net_root(dir.path().join("net")),
        audio,
    ));

    let engine = RecordingEngine::new();
    let host = HeadlessHost::new(engine.clone(), &settings, signals);
    Fixture { dir, engine, host }
}

fn booted() -> Fixture {
    let fx = fixture();
    fx.host.boot(&StaticDeviceId("dev-1".to_string())).unwrap();
    fx.engine.clear_calls();
    fx
}

#[test]
fn test_boot_creates_starts_and_pushes_platform_state() {
    let fx = fixture();
    fx.host.boot(&StaticDeviceId("dev-1".to_string())).unwrap();

    assert_eq!(fx.host.controller().phase(), SessionPhase::Started);
    let calls = fx.engine.calls();
    assert_eq!(
        calls[0],
        EngineCall::CreateHandle {
            device_id: "dev-1".to_string(),
            credential: None,
        }
    );
    assert!(calls.contains(&EngineCall::Start));
    // 7 of 15 steps
    assert!(calls.contains(&EngineCall::VolumeChanged(46)));
    // No interfaces under the fake net root
    assert!(calls.contains(&EngineCall::NetworkDown));
}

#[test]
fn test_boot_fails_without_device_id() {
    let fx = fixture();
    let resolver = InterfaceMacResolver::new("wlan0").with_root(fx.dir.path().join("net"));

    let err = fx.host.boot(&resolver).unwrap_err();
    assert!(matches!(err, Error::Init { .. }));
    assert_eq!(fx.host.controller().phase(), SessionPhase::Idle);
    assert!(fx.engine.calls().is_empty());
}

#[test]
fn test_control_commands_reach_engine() {
    let fx = booted();

    assert!(fx.host.execute(HostCommand::Text("hello".to_string())));
    assert!(fx.host.execute(HostCommand::Wake));
    assert!(fx.host.execute(HostCommand::Silence));
    assert!(fx.host.execute(HostCommand::Mute));
    assert!(fx.host.execute(HostCommand::UserInfo));

    assert_eq!(
        fx.engine.calls(),
        vec![
            EngineCall::TextRecognize("hello".to_string()),
            EngineCall::Wake {
                word: "tian mao jing ling".to_string(),
                doa: 0,
                confidence: 0.618,
            },
            EngineCall::Silence,
            EngineCall::MuteChanged(true),
            EngineCall::QueryUserInfo,
        ]
    );
}

#[test]
fn test_quit_ends_the_loop() {
    let fx = booted();
    assert!(!fx.host.execute(HostCommand::Quit));
    assert!(fx.engine.calls().is_empty());
}

#[test]
fn test_forced_network_produces_single_edges() {
    let fx = booted();

    fx.host.execute(HostCommand::Network(Some(true)));
    fx.host.execute(HostCommand::Network(Some(true)));
    assert!(fx.host.controller().flush(WAIT));
    assert_eq!(fx.engine.calls(), vec![EngineCall::NetworkUp]);

    // Back to sampling the empty net root
    fx.host.execute(HostCommand::Network(None));
    assert!(fx.host.controller().flush(WAIT));
    assert_eq!(
        fx.engine.calls(),
        vec![EngineCall::NetworkUp, EngineCall::NetworkDown]
    );
}

#[test]
fn test_volume_command_reports_applied_percent() {
    let fx = booted();

    fx.host.execute(HostCommand::Volume(80));
    assert!(fx.host.controller().flush(WAIT));

    assert_eq!(fx.host.signals().audio().level(), 12);
    assert_eq!(fx.engine.calls(), vec![EngineCall::VolumeChanged(80)]);
}

#[test]
fn test_stop_and_start_commands() {
    let fx = booted();

    assert!(fx.host.execute(HostCommand::Stop));
    assert_eq!(fx.host.controller().phase(), SessionPhase::Created);

    // Rejected while stopped, loop keeps running
    assert!(fx.host.execute(HostCommand::Text("ignored".to_string())));

    assert!(fx.host.execute(HostCommand::Start));
    assert_eq!(fx.host.controller().phase(), SessionPhase::Started);

    let calls = fx.engine.calls();
    assert_eq!(calls[0], EngineCall::Stop);
    assert_eq!(calls[1], EngineCall::Start);
    assert_eq!(
        fx.engine
            .count(|c| matches!(c, EngineCall::TextRecognize(_))),
        0
    );
}

#[test]
fn test_shutdown_destroys_engine_handle() {
    let fx = booted();
    fx.host.shutdown();

    assert_eq!(fx.host.controller().phase(), SessionPhase::Released);
    assert!(fx.engine.calls().contains(&EngineCall::Destroy));
}
