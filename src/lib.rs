//! sensenode - firmware for a battery-powered temperature/humidity node.
//!
//! A wake cycle is: classify the wake reason, run the lifecycle state
//! machine (report over WiFi, show the info screen, or run the setup
//! portal), then deep-sleep until the next timer or button wake.
//!
//! Everything outside the `embedded` feature is plain `no_std` logic that
//! builds and tests on the host.
//!
//! Usage: `cargo test --lib` (host), `cargo run --release --features embedded`
//! (ESP32-C3, needs the riscv32imc target).

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod portal;
pub mod power_logic;
pub mod sensor_logic;
pub mod storage;
pub mod ui;
pub mod wake;

#[cfg(feature = "embedded")]
pub mod power;
#[cfg(feature = "embedded")]
pub mod sensor;

pub use error::Error;
pub use lifecycle::{DeviceState, Halt, Lifecycle};

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
