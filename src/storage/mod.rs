//! Persistent device configuration.
//!
//! - **record**: the `DeviceConfig` snapshot and its flash encoding
//! - **flash**: `ConfigStore` backed by `sequential-storage` on the ESP32 flash

pub mod record;

#[cfg(feature = "embedded")]
pub mod flash;

pub use record::DeviceConfig;
