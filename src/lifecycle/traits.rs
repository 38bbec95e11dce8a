//! Collaborator interfaces the lifecycle controller drives.
//!
//! The firmware implements these over esp-hal / embassy; host tests use
//! in-memory fakes with a simulated clock.

#![allow(async_fn_in_trait)]

use crate::error::Error;
use crate::portal::form::SetupForm;
use crate::storage::DeviceConfig;
use crate::ui::screens::InfoScreen;
use crate::ui::RawButtonPrimitive;

/// Monotonic milliseconds plus a cooperative delay.
pub trait Clock {
    fn now_ms(&self) -> u64;
    async fn delay_ms(&mut self, ms: u64);
}

/// Output side of the debounced-button source.
pub trait ButtonSource {
    /// Next primitive, if one is waiting. Never blocks.
    fn try_next(&mut self) -> Option<RawButtonPrimitive>;
}

/// Durable configuration storage.
pub trait ConfigStore {
    async fn load(&mut self) -> Result<DeviceConfig, Error>;
    async fn save(&mut self, config: &DeviceConfig) -> Result<(), Error>;
    /// Wipe every stored field.
    async fn clear(&mut self) -> Result<(), Error>;
    /// `configured` flag of the last loaded or saved record.
    fn is_configured(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Connecting,
    /// Associated and holding an IPv4 address.
    Up,
    /// The attempt ended without a link (rejected, AP lost).
    Failed,
}

/// Station-mode WiFi. The connect wait itself is owned by the controller.
pub trait NetworkClient {
    /// Start associating; returns before the link is up.
    async fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), Error>;
    async fn link_status(&mut self) -> LinkStatus;
    async fn disconnect(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Registration {
    /// The config already carried a device id; nothing was sent.
    AlreadyRegistered,
    /// The server assigned a new id, now stored in the config.
    Registered,
}

/// One telemetry record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Telemetry {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub battery_pct: f32,
}

/// The remote telemetry API.
pub trait TelemetryClient {
    /// Register with the server unless `config` already has a device id.
    /// On `Registered` the new id has been written into `config`; persisting
    /// it is up to the caller.
    async fn register_device_if_needed(
        &mut self,
        config: &mut DeviceConfig,
    ) -> Result<Registration, Error>;

    /// Fails without touching the network if `config` has no device id.
    async fn send_telemetry(
        &mut self,
        config: &DeviceConfig,
        reading: &Telemetry,
    ) -> Result<(), Error>;
}

/// Environmental readings. A failed read yields `f32::NAN`.
pub trait SensorSource {
    async fn read_temperature(&mut self) -> f32;
    async fn read_humidity(&mut self) -> f32;
    async fn read_battery(&mut self) -> f32;
}

pub trait Display {
    /// Clear and draw `text` centered; `\n` separates lines.
    fn show_text(&mut self, text: &str);
    fn show_info(&mut self, info: &InfoScreen<'_>);
}

/// Switched peripheral rails. Deep sleep and restart are terminal and are
/// executed by the runtime, not through this trait.
pub trait PowerController {
    fn peripherals_on(&mut self);
    fn peripherals_off(&mut self);
}

/// The setup access point and its web form.
pub trait ProvisioningPortal {
    async fn start(&mut self) -> Result<(), Error>;
    /// Service pending browser requests. Returns the submitted form once a
    /// save request has been answered.
    async fn poll(&mut self) -> Option<SetupForm>;
    async fn stop(&mut self);
}

/// A concrete set of collaborators.
pub trait Board {
    type Clock: Clock;
    type Buttons: ButtonSource;
    type Store: ConfigStore;
    type Network: NetworkClient;
    type Api: TelemetryClient;
    type Sensor: SensorSource;
    type Display: Display;
    type Power: PowerController;
    type Portal: ProvisioningPortal;
}

/// Owned collaborator instances for a [`Board`].
pub struct Devices<B: Board> {
    pub clock: B::Clock,
    pub buttons: B::Buttons,
    pub store: B::Store,
    pub network: B::Network,
    pub api: B::Api,
    pub sensor: B::Sensor,
    pub display: B::Display,
    pub power: B::Power,
    pub portal: B::Portal,
}
