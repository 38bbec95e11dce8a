//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Lifecycle timing

/// Period of the cooperative lifecycle tick (ms).
pub const TICK_INTERVAL_MS: u64 = 10;

/// How long the info screen stays up without input before sleeping (ms).
pub const INFO_DISPLAY_TIMEOUT_MS: u64 = 10_000;

/// Dwell on "Restarting..." after the portal saved a configuration (ms).
pub const SETUP_COMPLETE_DELAY_MS: u64 = 5_000;

/// Dwell on the telemetry result screen before sleeping (ms).
pub const TASK_COMPLETE_DELAY_MS: u64 = 5_000;

/// Upper bound on a WiFi association + DHCP attempt (ms).
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Interval between link checks while waiting for WiFi (ms).
pub const WIFI_POLL_INTERVAL_MS: u64 = 100;

/// How long "Factory Reset" stays on screen before the restart (ms).
pub const FACTORY_RESET_NOTICE_MS: u64 = 3_000;

/// Sleep interval used when the stored value is zero or negative (s).
pub const DEFAULT_SLEEP_INTERVAL_SECS: u32 = 300;

// Button
//
// The detector values mirror the OneButton defaults the first hardware
// revision shipped with. The disambiguation timeout must stay above
// `GestureTiming::max_triple_gap_ms()`; see `ui::gesture`.

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// Window after a release in which a second press makes a double click (ms).
pub const BUTTON_CLICK_WINDOW_MS: u64 = 400;

/// Hold time after which a press counts as a long press (ms).
pub const BUTTON_LONG_PRESS_MS: u64 = 800;

/// Longest time from the double-click notification until the third click
/// is released (ms). Hardware measurements put the full gap at ~635 ms.
pub const BUTTON_MAX_THIRD_CLICK_MS: u64 = 240;

/// How long a `DoubleClick` waits for a third click before resolving (ms).
pub const DISAMBIGUATION_TIMEOUT_MS: u64 = 700;

/// Button sampling period in the firmware button task (ms).
pub const BUTTON_SAMPLE_MS: u64 = 5;

// GPIO pin assignments (ESP32-C3 SuperMini)
//
// These are logical names; the `esp_hal::peripherals::GPIOn` types are
// selected in `main.rs`.  The button must sit on an RTC-capable pin
// (GPIO0-GPIO5) to wake the chip from deep sleep.
//
//   Button (active low)  → GPIO3
//   Battery sense (ADC1) → GPIO4   (1:2 divider)
//   OLED power rail      → GPIO6
//   Sensor power rail    → GPIO7
//   I²C SDA              → GPIO8
//   I²C SCL              → GPIO9

/// I²C bus frequency shared by the OLED and the AHT10 (kHz).
pub const I2C_FREQUENCY_KHZ: u32 = 400;

/// Settle time after switching the peripheral rails on (ms).
pub const RAIL_SETTLE_MS: u64 = 50;

// Battery

/// Cell voltage reported as 0 % (mV).
pub const BATTERY_EMPTY_MV: u32 = 3_300;

/// Cell voltage reported as 100 % (mV).
pub const BATTERY_FULL_MV: u32 = 4_200;

/// Ratio of the resistor divider in front of the ADC pin.
pub const BATTERY_DIVIDER_RATIO: u32 = 2;

/// ADC1 input voltage at full scale with 11 dB attenuation (mV).
pub const ADC_FULL_SCALE_MV: u32 = 2_500;

/// Largest 12-bit ADC reading.
pub const ADC_MAX_RAW: u32 = 4_095;

// Telemetry API

/// Path appended to the server URL for device registration.
pub const API_REGISTER_PATH: &str = "/api/devices";

/// Path appended to the server URL for telemetry ingest.
pub const API_INGEST_PATH: &str = "/api/ingest";

/// Socket timeout for API requests (ms).
pub const HTTP_TIMEOUT_MS: u64 = 10_000;

// Provisioning portal

/// SSID of the open access point raised in setup mode.
pub const PORTAL_AP_SSID: &str = "IoT-Node-Setup";

/// Address of the node on the setup network.
pub const PORTAL_AP_ADDRESS: [u8; 4] = [192, 168, 4, 1];

/// Prefix length of the setup network.
pub const PORTAL_AP_PREFIX_LEN: u8 = 24;

/// Port the setup form is served on.
pub const PORTAL_HTTP_PORT: u16 = 80;

/// How long one portal poll waits for a browser connection (ms).
pub const PORTAL_ACCEPT_WINDOW_MS: u64 = 50;

/// Location every unknown request is redirected to.
pub const PORTAL_REDIRECT_URL: &str = "http://192.168.4.1/";

/// Default for the device type field on the setup form.
pub const DEFAULT_DEVICE_TYPE: &str = "Temp/Humidity";

// Configuration storage

/// Flash offset where the configuration region starts (4 KB sectors).
/// Sits in the `nvs` partition of the default ESP-IDF partition table.
pub const STORAGE_FLASH_START: u32 = 0x9000;

/// Number of 4 KB sectors reserved for configuration storage.
pub const STORAGE_FLASH_SECTORS: u32 = 4;
