//! Host tests for the lifecycle controller.
//!
//! Every collaborator is an in-memory fake sharing one simulated clock:
//! `delay_ms` advances time, so a whole wake cycle runs instantly.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_futures::block_on;

use super::{
    Board, ButtonSource, Clock, ConfigStore, DeviceState, Devices, Display, Halt, Lifecycle,
    LinkStatus, NetworkClient, PowerController, ProvisioningPortal, Registration, SensorSource,
    Telemetry, TelemetryClient,
};
use crate::config::DEFAULT_DEVICE_TYPE;
use crate::error::{Error, NetError};
use crate::portal::form::SetupForm;
use crate::storage::record::truncated;
use crate::storage::DeviceConfig;
use crate::ui::screens::{text, InfoScreen};
use crate::ui::RawButtonPrimitive;
use crate::wake::WakeCause;

// ═══════════════════════════════════════════════════════════════════════════
// Fakes
// ═══════════════════════════════════════════════════════════════════════════

type Now = Rc<Cell<u64>>;

struct FakeClock {
    now: Now,
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    async fn delay_ms(&mut self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

/// Releases each primitive once the clock reaches its timestamp.
struct ScriptedButtons {
    now: Now,
    script: VecDeque<(u64, RawButtonPrimitive)>,
}

impl ScriptedButtons {
    fn at(&mut self, at_ms: u64, primitive: RawButtonPrimitive) {
        self.script.push_back((at_ms, primitive));
    }
}

impl ButtonSource for ScriptedButtons {
    fn try_next(&mut self) -> Option<RawButtonPrimitive> {
        match self.script.front() {
            Some(&(at, _)) if at <= self.now.get() => self.script.pop_front().map(|(_, p)| p),
            _ => None,
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    stored: DeviceConfig,
    fail_save: bool,
    saves: u32,
    clears: u32,
}

impl ConfigStore for MemoryStore {
    async fn load(&mut self) -> Result<DeviceConfig, Error> {
        Ok(self.stored.clone())
    }

    async fn save(&mut self, config: &DeviceConfig) -> Result<(), Error> {
        if self.fail_save {
            return Err(Error::Storage);
        }
        self.stored = config.clone();
        self.saves += 1;
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), Error> {
        self.stored = DeviceConfig::default();
        self.clears += 1;
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.stored.configured
    }
}

/// Comes up `connect_after_ms` after `begin_connect`, or never.
struct FakeNetwork {
    now: Now,
    connect_after_ms: Option<u64>,
    reject: bool,
    attempt_started: Option<u64>,
    connects: u32,
    disconnects: u32,
    last_ssid: String,
}

impl NetworkClient for FakeNetwork {
    async fn begin_connect(&mut self, ssid: &str, _password: &str) -> Result<(), Error> {
        self.attempt_started = Some(self.now.get());
        self.connects += 1;
        self.last_ssid = ssid.to_string();
        Ok(())
    }

    async fn link_status(&mut self) -> LinkStatus {
        let Some(started) = self.attempt_started else {
            return LinkStatus::Connecting;
        };
        if self.reject {
            return LinkStatus::Failed;
        }
        match self.connect_after_ms {
            Some(after) if self.now.get() - started >= after => LinkStatus::Up,
            _ => LinkStatus::Connecting,
        }
    }

    async fn disconnect(&mut self) {
        self.attempt_started = None;
        self.disconnects += 1;
    }
}

struct FakeApi {
    now: Now,
    fail_register: bool,
    fail_send: bool,
    registrations: u32,
    sent: Vec<(u64, Telemetry)>,
}

impl TelemetryClient for FakeApi {
    async fn register_device_if_needed(
        &mut self,
        config: &mut DeviceConfig,
    ) -> Result<Registration, Error> {
        if config.is_registered() {
            return Ok(Registration::AlreadyRegistered);
        }
        if self.fail_register {
            return Err(NetError::Status(500).into());
        }
        self.registrations += 1;
        config.device_id = truncated("node-42");
        Ok(Registration::Registered)
    }

    async fn send_telemetry(
        &mut self,
        config: &DeviceConfig,
        reading: &Telemetry,
    ) -> Result<(), Error> {
        if !config.is_registered() {
            return Err(Error::TelemetrySendFailure);
        }
        if self.fail_send {
            return Err(NetError::Connect.into());
        }
        self.sent.push((self.now.get(), *reading));
        Ok(())
    }
}

struct FakeSensor;

impl SensorSource for FakeSensor {
    async fn read_temperature(&mut self) -> f32 {
        21.5
    }

    async fn read_humidity(&mut self) -> f32 {
        40.0
    }

    async fn read_battery(&mut self) -> f32 {
        87.0
    }
}

#[derive(Default)]
struct RecordingDisplay {
    texts: Vec<String>,
    infos: Vec<(String, f32)>,
}

impl RecordingDisplay {
    fn showed(&self, message: &str) -> bool {
        self.texts.iter().any(|t| t == message)
    }

    fn last(&self) -> Option<&str> {
        self.texts.last().map(String::as_str)
    }
}

impl Display for RecordingDisplay {
    fn show_text(&mut self, text: &str) {
        self.texts.push(text.to_string());
    }

    fn show_info(&mut self, info: &InfoScreen<'_>) {
        self.infos.push((info.name.to_string(), info.temperature_c));
    }
}

#[derive(Default)]
struct FakePower {
    on: bool,
    on_calls: u32,
    off_calls: u32,
}

impl PowerController for FakePower {
    fn peripherals_on(&mut self) {
        self.on = true;
        self.on_calls += 1;
    }

    fn peripherals_off(&mut self) {
        self.on = false;
        self.off_calls += 1;
    }
}

/// Hands out `form` on the `submit_on_poll`-th poll.
#[derive(Default)]
struct FakePortal {
    fail_start: bool,
    running: bool,
    stopped: bool,
    polls: u32,
    submit_on_poll: Option<u32>,
    form: Option<SetupForm>,
}

impl ProvisioningPortal for FakePortal {
    async fn start(&mut self) -> Result<(), Error> {
        if self.fail_start {
            return Err(Error::WifiConnectFailed);
        }
        self.running = true;
        Ok(())
    }

    async fn poll(&mut self) -> Option<SetupForm> {
        self.polls += 1;
        match self.submit_on_poll {
            Some(n) if self.polls >= n => self.form.take(),
            _ => None,
        }
    }

    async fn stop(&mut self) {
        self.running = false;
        self.stopped = true;
    }
}

struct TestBoard;

impl Board for TestBoard {
    type Clock = FakeClock;
    type Buttons = ScriptedButtons;
    type Store = MemoryStore;
    type Network = FakeNetwork;
    type Api = FakeApi;
    type Sensor = FakeSensor;
    type Display = RecordingDisplay;
    type Power = FakePower;
    type Portal = FakePortal;
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn devices(stored: DeviceConfig) -> Devices<TestBoard> {
    let now: Now = Rc::new(Cell::new(0));
    Devices {
        clock: FakeClock { now: now.clone() },
        buttons: ScriptedButtons {
            now: now.clone(),
            script: VecDeque::new(),
        },
        store: MemoryStore {
            stored,
            ..Default::default()
        },
        network: FakeNetwork {
            now: now.clone(),
            connect_after_ms: Some(2_000),
            reject: false,
            attempt_started: None,
            connects: 0,
            disconnects: 0,
            last_ssid: String::new(),
        },
        api: FakeApi {
            now,
            fail_register: false,
            fail_send: false,
            registrations: 0,
            sent: Vec::new(),
        },
        sensor: FakeSensor,
        display: RecordingDisplay::default(),
        power: FakePower::default(),
        portal: FakePortal::default(),
    }
}

fn provisioned(device_id: &str, sleep_interval_secs: i32) -> DeviceConfig {
    DeviceConfig {
        wifi_ssid: truncated("greenhouse"),
        wifi_password: truncated("hunter22"),
        server_url: truncated("http://10.0.0.5:8080"),
        device_id: truncated(device_id),
        device_name: truncated("bench"),
        device_type: truncated(DEFAULT_DEVICE_TYPE),
        location_hint: truncated("shelf"),
        sleep_interval_secs,
        configured: true,
    }
}

fn submitted_form() -> SetupForm {
    SetupForm {
        ssid: truncated("attic"),
        password: truncated("pw"),
        server_url: truncated("http://192.168.1.20"),
        name: truncated("attic-node"),
        device_type: truncated(DEFAULT_DEVICE_TYPE),
        location: truncated("roof"),
        interval_secs: 120,
    }
}

fn run(devices: Devices<TestBoard>, wake: WakeCause) -> (Halt, Devices<TestBoard>) {
    let mut lifecycle = Lifecycle::new(devices, wake);
    let halt = block_on(lifecycle.run());
    (halt, lifecycle.into_devices())
}

// ═══════════════════════════════════════════════════════════════════════════
// Timer wake: report and sleep
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn timer_wake_registers_reports_and_sleeps() {
    let (halt, d) = run(devices(provisioned("", 600)), WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.connects, 1);
    assert_eq!(d.network.last_ssid, "greenhouse");
    assert_eq!(d.api.registrations, 1);
    assert_eq!(d.store.saves, 1);
    assert_eq!(d.store.stored.device_id.as_str(), "node-42");

    assert_eq!(d.api.sent.len(), 1);
    let (_, reading) = d.api.sent[0];
    assert_eq!(
        reading,
        Telemetry {
            temperature_c: 21.5,
            humidity_pct: 40.0,
            battery_pct: 87.0,
        }
    );

    assert!(d.display.showed(text::REGISTERING));
    assert!(d.display.showed(text::DATA_SENT));
    assert_eq!(d.display.last(), Some(text::SLEEPING));
    assert!(!d.power.on);
    assert_eq!(d.power.off_calls, 1);
}

#[test]
fn task_complete_holds_the_result_before_sleeping() {
    let (_, d) = run(devices(provisioned("node-7", 600)), WakeCause::Timer);

    let (sent_at, _) = d.api.sent[0];
    assert!(d.clock.now_ms() - sent_at >= 5_000);
}

#[test]
fn registered_device_skips_registration_and_save() {
    let (halt, d) = run(devices(provisioned("node-7", 600)), WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.api.registrations, 0);
    assert_eq!(d.store.saves, 0);
    assert_eq!(d.api.sent.len(), 1);
    assert!(d.display.showed(text::DATA_SENT));
}

#[test]
fn non_positive_interval_sleeps_for_default() {
    let (halt, _) = run(devices(provisioned("node-7", 0)), WakeCause::Timer);
    assert_eq!(halt, Halt::DeepSleep { seconds: 300 });

    let (halt, _) = run(devices(provisioned("node-7", -5)), WakeCause::Timer);
    assert_eq!(halt, Halt::DeepSleep { seconds: 300 });
}

#[test]
fn registration_failure_skips_telemetry() {
    let mut d = devices(provisioned("", 600));
    d.api.fail_register = true;

    let (halt, d) = run(d, WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert!(d.api.sent.is_empty());
    assert_eq!(d.store.saves, 0);
    assert!(d.display.showed(text::REG_FAILED));
    assert!(!d.display.showed(text::DATA_SENT));
}

#[test]
fn send_failure_is_shown_then_sleeps() {
    let mut d = devices(provisioned("node-7", 600));
    d.api.fail_send = true;

    let (halt, d) = run(d, WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert!(d.display.showed(text::SEND_FAILED));
}

// ═══════════════════════════════════════════════════════════════════════════
// WiFi failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn wifi_timeout_gives_up_and_sleeps() {
    let mut d = devices(provisioned("node-7", 600));
    d.network.connect_after_ms = None;

    let (halt, d) = run(d, WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.disconnects, 1);
    assert!(d.api.sent.is_empty());
    assert!(d.display.showed(text::WIFI_FAILED));
    // 15 s connect window plus the 5 s result hold.
    assert!(d.clock.now_ms() >= 20_000);
}

#[test]
fn rejected_association_fails_fast() {
    let mut d = devices(provisioned("node-7", 600));
    d.network.reject = true;

    let (halt, d) = run(d, WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.disconnects, 1);
    assert!(d.display.showed(text::WIFI_FAILED));
    assert!(d.clock.now_ms() < 15_000);
}

#[test]
fn long_press_during_wifi_wait_factory_resets() {
    let mut d = devices(provisioned("node-7", 600));
    d.network.connect_after_ms = None;
    d.buttons.at(3_000, RawButtonPrimitive::LongPressEnd);

    let (halt, d) = run(d, WakeCause::Timer);

    assert_eq!(halt, Halt::Restart);
    assert_eq!(d.store.clears, 1);
    assert_eq!(d.store.stored, DeviceConfig::default());
    assert_eq!(d.display.last(), Some(text::FACTORY_RESET));
    assert!(d.api.sent.is_empty());
    // Noticed at the 3 s poll, well before the 15 s timeout, then held 3 s.
    assert_eq!(d.clock.now_ms(), 6_000);
}

#[test]
fn unconfigured_timer_wake_routes_to_setup() {
    let mut lifecycle = Lifecycle::new(devices(DeviceConfig::default()), WakeCause::Timer);
    block_on(lifecycle.start());
    assert_eq!(lifecycle.state(), DeviceState::ConnectingWifi);

    let _ = block_on(lifecycle.tick());

    assert_eq!(lifecycle.state(), DeviceState::SetupStart);
    assert_eq!(lifecycle.devices().network.connects, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Button wake: info screen
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn info_screen_times_out_into_sleep() {
    let (halt, d) = run(devices(provisioned("node-7", 600)), WakeCause::ExternalPin);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.display.infos, vec![("bench".to_string(), 21.5)]);
    assert_eq!(d.network.connects, 0);
    let now = d.clock.now_ms();
    assert!((10_000..10_100).contains(&now), "slept at {now}");
}

#[test]
fn single_click_sleeps_early() {
    let mut d = devices(provisioned("node-7", 600));
    d.buttons.at(500, RawButtonPrimitive::Click);

    let (halt, d) = run(d, WakeCause::ExternalPin);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.connects, 0);
    assert!(d.clock.now_ms() < 1_000);
}

#[test]
fn double_click_reports_before_the_info_timeout() {
    let mut d = devices(provisioned("node-7", 600));
    d.network.connect_after_ms = Some(500);
    d.buttons.at(1_000, RawButtonPrimitive::DoubleClick);

    let (halt, d) = run(d, WakeCause::ExternalPin);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.connects, 1);
    assert_eq!(d.api.sent.len(), 1);
    let (sent_at, _) = d.api.sent[0];
    // Double resolves once the 700 ms window has passed.
    assert!(sent_at > 1_700 && sent_at < 10_000, "sent at {sent_at}");
    assert!(d.display.showed(text::DATA_SENT));
}

#[test]
fn triple_click_reprovisions_and_keeps_device_id() {
    let mut d = devices(provisioned("node-7", 600));
    d.buttons.at(500, RawButtonPrimitive::DoubleClick);
    d.buttons.at(900, RawButtonPrimitive::Click);
    d.portal.submit_on_poll = Some(3);
    d.portal.form = Some(submitted_form());

    let (halt, d) = run(d, WakeCause::ExternalPin);

    assert_eq!(halt, Halt::Restart);
    assert!(d.portal.stopped);
    assert_eq!(d.store.saves, 1);
    assert_eq!(d.store.stored.wifi_ssid.as_str(), "attic");
    assert_eq!(d.store.stored.device_id.as_str(), "node-7");
    assert_eq!(d.store.stored.sleep_interval_secs, 120);
    assert!(d.display.showed(text::SETUP_MODE));
    assert_eq!(d.display.last(), Some(text::RESTARTING));
}

// ═══════════════════════════════════════════════════════════════════════════
// Provisioning
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn cold_boot_without_config_runs_setup_then_restarts() {
    let mut d = devices(DeviceConfig::default());
    d.portal.submit_on_poll = Some(1);
    d.portal.form = Some(submitted_form());

    let (halt, d) = run(d, WakeCause::Undefined);

    assert_eq!(halt, Halt::Restart);
    assert!(d.store.stored.configured);
    assert_eq!(d.store.stored.device_name.as_str(), "attic-node");
    assert!(!d.store.stored.is_registered());
    assert_eq!(d.network.connects, 0);
    // Restart follows the 5 s confirmation hold.
    assert!(d.clock.now_ms() >= 5_000);
}

#[test]
fn cold_boot_with_config_connects() {
    let (halt, d) = run(devices(provisioned("node-7", 600)), WakeCause::Undefined);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.network.connects, 1);
    assert!(!d.display.showed(text::SETUP_MODE));
}

#[test]
fn failed_save_stays_in_setup() {
    let mut d = devices(DeviceConfig::default());
    d.store.fail_save = true;
    d.portal.submit_on_poll = Some(1);
    d.portal.form = Some(submitted_form());

    let mut lifecycle = Lifecycle::new(d, WakeCause::Undefined);
    block_on(lifecycle.start());
    for _ in 0..10 {
        assert!(block_on(lifecycle.tick()).is_continue());
    }

    assert_eq!(lifecycle.state(), DeviceState::SetupRunning);
    assert!(lifecycle.devices().display.showed(text::SAVE_FAILED));
    assert!(!lifecycle.config().configured);
}

#[test]
fn portal_start_failure_still_runs_setup() {
    let mut d = devices(DeviceConfig::default());
    d.portal.fail_start = true;

    let mut lifecycle = Lifecycle::new(d, WakeCause::Undefined);
    block_on(lifecycle.start());
    let _ = block_on(lifecycle.tick());
    let _ = block_on(lifecycle.tick());

    assert_eq!(lifecycle.state(), DeviceState::SetupRunning);
    assert!(!lifecycle.devices().portal.running);
}

#[test]
fn long_press_in_setup_clears_and_restarts() {
    let mut d = devices(DeviceConfig::default());
    d.buttons.at(2_000, RawButtonPrimitive::LongPressEnd);

    let (halt, d) = run(d, WakeCause::Undefined);

    assert_eq!(halt, Halt::Restart);
    assert_eq!(d.store.clears, 1);
    assert!(d.portal.polls > 0);
}

#[test]
fn long_press_wins_over_click_queued_behind_it() {
    // Both arrive while the tick loop was busy, so they drain together.
    let mut d = devices(provisioned("node-7", 600));
    d.buttons.at(500, RawButtonPrimitive::LongPressEnd);
    d.buttons.at(500, RawButtonPrimitive::Click);

    let (halt, d) = run(d, WakeCause::ExternalPin);

    assert_eq!(halt, Halt::Restart);
    assert_eq!(d.store.clears, 1);
    assert_eq!(d.display.last(), Some(text::FACTORY_RESET));
}

#[test]
fn start_powers_peripherals_once() {
    let mut lifecycle = Lifecycle::new(devices(provisioned("node-7", 600)), WakeCause::Timer);
    block_on(lifecycle.start());
    block_on(lifecycle.start());

    assert!(lifecycle.devices().power.on);
    assert_eq!(lifecycle.devices().power.on_calls, 1);
    assert_eq!(lifecycle.config().device_id.as_str(), "node-7");
}

#[test]
fn full_cycle_switches_rails_on_once() {
    let (halt, d) = run(devices(provisioned("node-7", 600)), WakeCause::Timer);

    assert_eq!(halt, Halt::DeepSleep { seconds: 600 });
    assert_eq!(d.power.on_calls, 1);
    assert_eq!(d.power.off_calls, 1);
}
