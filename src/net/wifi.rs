//! WiFi radio ownership and the station link.
//!
//! A single background task owns the `WifiController`. Everything else asks
//! it to join a network, host the setup access point, or stop, through
//! [`RadioControl`], and reads the outcome back from a lock-free state cell.
//! A newer request preempts one still in progress.

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_futures::select::{select, Either};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, WithTimeout};
use esp_radio::wifi::{AccessPointConfig, ClientConfig, ModeConfig, WifiController};
use heapless::String;

use crate::config::{PORTAL_AP_SSID, WIFI_CONNECT_TIMEOUT_MS};
use crate::error::Error;
use crate::lifecycle::{LinkStatus, NetworkClient};
use crate::storage::record::{truncated, PASSWORD_LEN, SSID_LEN};

/// What the radio is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum RadioState {
    Idle = 0,
    Joining = 1,
    /// Associated and the station stack holds an IPv4 config.
    Joined = 2,
    JoinFailed = 3,
    /// Setup access point is up.
    Hosting = 4,
    HostFailed = 5,
}

impl RadioState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Joining,
            2 => Self::Joined,
            3 => Self::JoinFailed,
            4 => Self::Hosting,
            5 => Self::HostFailed,
            _ => Self::Idle,
        }
    }
}

pub struct Credentials {
    pub ssid: String<SSID_LEN>,
    pub password: String<PASSWORD_LEN>,
}

pub enum RadioCommand {
    Join(Credentials),
    HostAccessPoint,
    Stop,
}

/// Shared between the radio task and its clients.
pub struct RadioControl {
    commands: Signal<CriticalSectionRawMutex, RadioCommand>,
    state: AtomicU8,
}

impl RadioControl {
    pub const fn new() -> Self {
        Self {
            commands: Signal::new(),
            state: AtomicU8::new(RadioState::Idle as u8),
        }
    }

    pub fn state(&self) -> RadioState {
        RadioState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Queue `command`, replacing any request the task has not picked up.
    pub fn request(&self, command: RadioCommand, pending: RadioState) {
        self.set(pending);
        self.commands.signal(command);
    }

    fn set(&self, state: RadioState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for RadioControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Run radio requests forever.
pub async fn radio_task(
    mut controller: WifiController<'static>,
    sta: Stack<'static>,
    control: &'static RadioControl,
) -> ! {
    let mut next = control.commands.wait().await;
    loop {
        match select(execute(&mut controller, sta, control, next), control.commands.wait()).await {
            Either::First(()) => next = control.commands.wait().await,
            Either::Second(preempting) => {
                info!("radio request preempted");
                next = preempting;
            }
        }
    }
}

async fn execute(
    controller: &mut WifiController<'static>,
    sta: Stack<'static>,
    control: &RadioControl,
    command: RadioCommand,
) {
    stop(controller).await;

    match command {
        RadioCommand::Join(credentials) => {
            let state = join(controller, sta, &credentials).await;
            control.set(state);
        }
        RadioCommand::HostAccessPoint => {
            let state = host(controller).await;
            control.set(state);
        }
        RadioCommand::Stop => control.set(RadioState::Idle),
    }
}

async fn stop(controller: &mut WifiController<'static>) {
    if matches!(controller.is_started(), Ok(true)) {
        if let Err(e) = controller.stop_async().await {
            warn!("wifi stop failed: {:?}", defmt::Debug2Format(&e));
        }
    }
}

async fn join(
    controller: &mut WifiController<'static>,
    sta: Stack<'static>,
    credentials: &Credentials,
) -> RadioState {
    let mode = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(credentials.ssid.as_str().into())
            .with_password(credentials.password.as_str().into()),
    );
    if let Err(e) = controller.set_config(&mode) {
        warn!("wifi set_config failed: {:?}", defmt::Debug2Format(&e));
        return RadioState::JoinFailed;
    }
    if let Err(e) = controller.start_async().await {
        warn!("wifi start failed: {:?}", defmt::Debug2Format(&e));
        return RadioState::JoinFailed;
    }

    info!("joining \"{}\"", credentials.ssid.as_str());
    if let Err(e) = controller.connect_async().await {
        warn!("wifi connect failed: {:?}", defmt::Debug2Format(&e));
        return RadioState::JoinFailed;
    }

    match sta
        .wait_config_up()
        .with_timeout(Duration::from_millis(WIFI_CONNECT_TIMEOUT_MS))
        .await
    {
        Ok(()) => {
            if let Some(config) = sta.config_v4() {
                info!("wifi up, address {}", config.address);
            }
            RadioState::Joined
        }
        Err(_) => {
            warn!("dhcp timeout");
            RadioState::JoinFailed
        }
    }
}

async fn host(controller: &mut WifiController<'static>) -> RadioState {
    let mode =
        ModeConfig::AccessPoint(AccessPointConfig::default().with_ssid(PORTAL_AP_SSID.into()));
    if let Err(e) = controller.set_config(&mode) {
        warn!("ap set_config failed: {:?}", defmt::Debug2Format(&e));
        return RadioState::HostFailed;
    }
    if let Err(e) = controller.start_async().await {
        warn!("ap start failed: {:?}", defmt::Debug2Format(&e));
        return RadioState::HostFailed;
    }
    info!("access point \"{}\" up", PORTAL_AP_SSID);
    RadioState::Hosting
}

/// [`NetworkClient`] over the radio task.
pub struct WifiLink {
    control: &'static RadioControl,
    sta: Stack<'static>,
}

impl WifiLink {
    pub fn new(control: &'static RadioControl, sta: Stack<'static>) -> Self {
        Self { control, sta }
    }
}

impl NetworkClient for WifiLink {
    async fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), Error> {
        if ssid.is_empty() {
            return Err(Error::ConfigurationMissing);
        }
        self.control.request(
            RadioCommand::Join(Credentials {
                ssid: truncated(ssid),
                password: truncated(password),
            }),
            RadioState::Joining,
        );
        Ok(())
    }

    async fn link_status(&mut self) -> LinkStatus {
        match self.control.state() {
            RadioState::Joined if self.sta.is_config_up() => LinkStatus::Up,
            RadioState::JoinFailed => LinkStatus::Failed,
            _ => LinkStatus::Connecting,
        }
    }

    async fn disconnect(&mut self) {
        self.control.request(RadioCommand::Stop, RadioState::Idle);
    }
}
