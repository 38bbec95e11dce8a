//! Device lifecycle controller.
//!
//! One cooperative state machine drives a wake cycle from boot to deep
//! sleep:
//!
//! ```text
//!   Boot ──configured──▶ ConnectingWifi ──up──▶ TelemetrySend ──▶ TaskComplete ──5s──▶ DeepSleep
//!     │                        └──fail/timeout──────────────────────▲
//!     └──unconfigured──▶ SetupStart ──▶ SetupRunning ──saved──▶ SetupComplete ──5s──▶ restart
//!
//!   InfoDisplay: Single → DeepSleep, Double → TelemetrySend,
//!                Triple → SetupStart, 10s idle → DeepSleep
//! ```
//!
//! A long press in any state (including during the WiFi wait) clears the
//! stored configuration and restarts.
//!
//! Deep sleep and restart never return on hardware, so they leave the
//! machine as a [`Halt`] for the runtime to execute.

pub mod traits;

#[cfg(test)]
mod tests;

use core::ops::ControlFlow;

use crate::config::{
    FACTORY_RESET_NOTICE_MS, INFO_DISPLAY_TIMEOUT_MS, SETUP_COMPLETE_DELAY_MS,
    TASK_COMPLETE_DELAY_MS, TICK_INTERVAL_MS, WIFI_CONNECT_TIMEOUT_MS, WIFI_POLL_INTERVAL_MS,
};
use crate::error::Error;
use crate::storage::DeviceConfig;
use crate::ui::clicks::ClickDisambiguator;
use crate::ui::screens::{text, InfoScreen};
use crate::ui::ButtonEvent;
use crate::wake::{self, WakeCause};

pub use traits::{
    Board, ButtonSource, Clock, ConfigStore, Devices, Display, LinkStatus, NetworkClient,
    PowerController, ProvisioningPortal, Registration, SensorSource, Telemetry, TelemetryClient,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Boot,
    InfoDisplay,
    SetupStart,
    SetupRunning,
    SetupComplete,
    ConnectingWifi,
    TelemetrySend,
    TaskComplete,
    DeepSleep,
}

/// Terminal outcome of a run; the runtime must act on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Halt {
    /// Peripherals are off; arm the timer for `seconds` plus the button
    /// wake and enter deep sleep.
    DeepSleep { seconds: u32 },
    /// Reset the chip.
    Restart,
}

enum WifiOutcome {
    Connected,
    Failed(Error),
    FactoryReset,
}

pub struct Lifecycle<B: Board> {
    devices: Devices<B>,
    clicks: ClickDisambiguator,
    state: DeviceState,
    /// Entry action of `state` already ran.
    entered: bool,
    /// Dwell timer start, armed on the first tick in a timed state.
    state_timer: Option<u64>,
    config: DeviceConfig,
    started: bool,
}

impl<B: Board> Lifecycle<B> {
    pub fn new(devices: Devices<B>, wake_cause: WakeCause) -> Self {
        let state = wake::classify(wake_cause);
        info!("wake cause {:?}, starting in {:?}", wake_cause, state);
        Self {
            devices,
            clicks: ClickDisambiguator::default(),
            state,
            entered: false,
            state_timer: None,
            config: DeviceConfig::default(),
            started: false,
        }
    }

    /// Replace the click disambiguator, e.g. one built with
    /// [`ClickDisambiguator::with_timing`].
    pub fn with_clicks(mut self, clicks: ClickDisambiguator) -> Self {
        self.clicks = clicks;
        self
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn devices(&self) -> &Devices<B> {
        &self.devices
    }

    pub fn into_devices(self) -> Devices<B> {
        self.devices
    }

    /// Power the peripherals and load the stored configuration. Runs once;
    /// `run` calls it.
    pub async fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        self.devices.power.peripherals_on();
        self.config = match self.devices.store.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!("config load failed: {:?}", e);
                DeviceConfig::default()
            }
        };
        info!("config loaded, configured={}", self.config.configured);
    }

    /// Tick until the machine halts.
    pub async fn run(&mut self) -> Halt {
        self.start().await;
        loop {
            if let ControlFlow::Break(halt) = self.tick().await {
                info!("halting: {:?}", halt);
                return halt;
            }
            self.devices.clock.delay_ms(TICK_INTERVAL_MS).await;
        }
    }

    /// One pass: drain the button, honor a long press, then run the
    /// current state's handler.
    pub async fn tick(&mut self) -> ControlFlow<Halt> {
        let event = self.poll_buttons();
        if event == Some(ButtonEvent::LongPress) {
            return self.factory_reset().await;
        }

        let first = !self.entered;
        self.entered = true;

        match self.state {
            DeviceState::Boot => self.on_boot(),
            DeviceState::InfoDisplay => self.on_info_display(first, event).await,
            DeviceState::SetupStart => self.on_setup_start().await,
            DeviceState::SetupRunning => self.on_setup_running().await,
            DeviceState::SetupComplete => self.on_setup_complete(first).await,
            DeviceState::ConnectingWifi => self.on_connecting_wifi().await,
            DeviceState::TelemetrySend => self.on_telemetry_send().await,
            DeviceState::TaskComplete => self.on_task_complete(),
            DeviceState::DeepSleep => self.on_deep_sleep(),
        }
    }

    fn enter(&mut self, next: DeviceState) {
        info!("{:?} -> {:?}", self.state, next);
        self.state = next;
        self.entered = false;
        self.state_timer = None;
    }

    /// Arms the dwell timer on first use; true once `limit_ms` has passed.
    fn dwell_elapsed(&mut self, limit_ms: u64) -> bool {
        let now = self.devices.clock.now_ms();
        let since = *self.state_timer.get_or_insert(now);
        now.saturating_sub(since) >= limit_ms
    }

    fn poll_buttons(&mut self) -> Option<ButtonEvent> {
        let now = self.devices.clock.now_ms();
        let mut event = None;
        // A long press must not be overwritten by clicks queued behind it.
        while let Some(primitive) = self.devices.buttons.try_next() {
            self.clicks.feed(primitive, now);
            event = self.clicks.take_event().or(event);
            if event == Some(ButtonEvent::LongPress) {
                break;
            }
        }
        if event != Some(ButtonEvent::LongPress) {
            self.clicks.poll(now);
            event = self.clicks.take_event().or(event);
        }
        if let Some(event) = event {
            debug!("button {:?} in {:?}", event, self.state);
        }
        event
    }

    fn on_boot(&mut self) -> ControlFlow<Halt> {
        if self.devices.store.is_configured() {
            self.enter(DeviceState::ConnectingWifi);
        } else {
            self.enter(DeviceState::SetupStart);
        }
        ControlFlow::Continue(())
    }

    async fn on_info_display(
        &mut self,
        first: bool,
        event: Option<ButtonEvent>,
    ) -> ControlFlow<Halt> {
        if first {
            let temperature_c = self.devices.sensor.read_temperature().await;
            let humidity_pct = self.devices.sensor.read_humidity().await;
            self.devices.display.show_info(&InfoScreen {
                name: &self.config.device_name,
                id: &self.config.device_id,
                server_url: &self.config.server_url,
                temperature_c,
                humidity_pct,
            });
        }

        match event {
            Some(ButtonEvent::Single) => self.enter(DeviceState::DeepSleep),
            Some(ButtonEvent::Double) => self.enter(DeviceState::TelemetrySend),
            Some(ButtonEvent::Triple) => self.enter(DeviceState::SetupStart),
            _ => {
                if self.dwell_elapsed(INFO_DISPLAY_TIMEOUT_MS) {
                    self.enter(DeviceState::DeepSleep);
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_setup_start(&mut self) -> ControlFlow<Halt> {
        self.devices.display.show_text(text::SETUP_MODE);
        if let Err(e) = self.devices.portal.start().await {
            error!("portal start failed: {:?}", e);
        }
        self.enter(DeviceState::SetupRunning);
        ControlFlow::Continue(())
    }

    async fn on_setup_running(&mut self) -> ControlFlow<Halt> {
        let Some(form) = self.devices.portal.poll().await else {
            return ControlFlow::Continue(());
        };

        let mut next = self.config.clone();
        form.apply_to(&mut next);
        match self.devices.store.save(&next).await {
            Ok(()) => {
                info!("configuration saved");
                self.config = next;
                self.enter(DeviceState::SetupComplete);
            }
            Err(e) => {
                error!("config save failed: {:?}", e);
                self.devices.display.show_text(text::SAVE_FAILED);
            }
        }
        ControlFlow::Continue(())
    }

    async fn on_setup_complete(&mut self, first: bool) -> ControlFlow<Halt> {
        if first {
            self.devices.portal.stop().await;
            self.devices.display.show_text(text::RESTARTING);
        }
        if self.dwell_elapsed(SETUP_COMPLETE_DELAY_MS) {
            return ControlFlow::Break(Halt::Restart);
        }
        ControlFlow::Continue(())
    }

    async fn on_connecting_wifi(&mut self) -> ControlFlow<Halt> {
        if !self.devices.store.is_configured() {
            warn!("{:?}: routing to setup", Error::ConfigurationMissing);
            self.enter(DeviceState::SetupStart);
            return ControlFlow::Continue(());
        }

        match self.connect_wifi().await {
            WifiOutcome::Connected => self.enter(DeviceState::TelemetrySend),
            WifiOutcome::Failed(_) => {
                self.devices.display.show_text(text::WIFI_FAILED);
                self.enter(DeviceState::TaskComplete);
            }
            WifiOutcome::FactoryReset => return self.factory_reset().await,
        }
        ControlFlow::Continue(())
    }

    /// Bounded wait for the link, polling the button between checks.
    async fn connect_wifi(&mut self) -> WifiOutcome {
        info!("connecting to {}", self.config.wifi_ssid.as_str());
        if let Err(e) = self
            .devices
            .network
            .begin_connect(&self.config.wifi_ssid, &self.config.wifi_password)
            .await
        {
            warn!("wifi connect could not start: {:?}", e);
            return WifiOutcome::Failed(e);
        }

        let started = self.devices.clock.now_ms();
        loop {
            if self.poll_buttons() == Some(ButtonEvent::LongPress) {
                return WifiOutcome::FactoryReset;
            }

            match self.devices.network.link_status().await {
                LinkStatus::Up => {
                    info!("wifi up");
                    return WifiOutcome::Connected;
                }
                LinkStatus::Failed => {
                    warn!("wifi connect failed");
                    self.devices.network.disconnect().await;
                    return WifiOutcome::Failed(Error::WifiConnectFailed);
                }
                LinkStatus::Connecting => {}
            }

            if self.devices.clock.now_ms().saturating_sub(started) >= WIFI_CONNECT_TIMEOUT_MS {
                warn!("wifi connect timed out");
                self.devices.network.disconnect().await;
                return WifiOutcome::Failed(Error::NetworkConnectTimeout);
            }
            self.devices.clock.delay_ms(WIFI_POLL_INTERVAL_MS).await;
        }
    }

    async fn on_telemetry_send(&mut self) -> ControlFlow<Halt> {
        self.devices.display.show_text(text::REGISTERING);

        // Reached from InfoDisplay without a link.
        if self.devices.network.link_status().await != LinkStatus::Up {
            match self.connect_wifi().await {
                WifiOutcome::Connected => {}
                WifiOutcome::Failed(_) => {
                    self.devices.display.show_text(text::WIFI_FAILED);
                    self.enter(DeviceState::TaskComplete);
                    return ControlFlow::Continue(());
                }
                WifiOutcome::FactoryReset => return self.factory_reset().await,
            }
        }

        let message = match self.send_report().await {
            Ok(()) => text::DATA_SENT,
            Err(Error::RegistrationFailure) => text::REG_FAILED,
            Err(_) => text::SEND_FAILED,
        };
        self.devices.display.show_text(message);
        self.enter(DeviceState::TaskComplete);
        ControlFlow::Continue(())
    }

    /// Register if needed, persist a new id, then send one reading.
    async fn send_report(&mut self) -> Result<(), Error> {
        let registration = self
            .devices
            .api
            .register_device_if_needed(&mut self.config)
            .await
            .map_err(|e| {
                warn!("registration failed: {:?}", e);
                Error::RegistrationFailure
            })?;

        if registration == Registration::Registered {
            info!("registered as {}", self.config.device_id.as_str());
            if let Err(e) = self.devices.store.save(&self.config).await {
                error!("could not persist device id: {:?}", e);
            }
        }

        let reading = Telemetry {
            temperature_c: self.devices.sensor.read_temperature().await,
            humidity_pct: self.devices.sensor.read_humidity().await,
            battery_pct: self.devices.sensor.read_battery().await,
        };
        self.devices
            .api
            .send_telemetry(&self.config, &reading)
            .await
            .map_err(|e| {
                warn!("telemetry failed: {:?}", e);
                Error::TelemetrySendFailure
            })
    }

    fn on_task_complete(&mut self) -> ControlFlow<Halt> {
        if self.dwell_elapsed(TASK_COMPLETE_DELAY_MS) {
            self.enter(DeviceState::DeepSleep);
        }
        ControlFlow::Continue(())
    }

    fn on_deep_sleep(&mut self) -> ControlFlow<Halt> {
        self.devices.display.show_text(text::SLEEPING);
        self.devices.power.peripherals_off();
        let seconds = self.config.effective_sleep_secs();
        info!("sleeping for {} s", seconds);
        ControlFlow::Break(Halt::DeepSleep { seconds })
    }

    async fn factory_reset(&mut self) -> ControlFlow<Halt> {
        warn!("long press: factory reset");
        if let Err(e) = self.devices.store.clear().await {
            error!("config clear failed: {:?}", e);
        }
        self.config = DeviceConfig::default();
        self.devices.display.show_text(text::FACTORY_RESET);
        self.devices.clock.delay_ms(FACTORY_RESET_NOTICE_MS).await;
        ControlFlow::Break(Halt::Restart)
    }
}
