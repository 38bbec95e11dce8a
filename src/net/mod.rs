//! Networking - WiFi station link and the telemetry HTTP client.
//!
//! ## Components
//!
//! - **http**: URL, request, response and JSON helpers (host-testable)
//! - **wifi**: station-mode link driven by a background connection task
//! - **api**: `TelemetryClient` over `embassy-net` TCP sockets

pub mod http;

#[cfg(feature = "embedded")]
pub mod api;
#[cfg(feature = "embedded")]
pub mod wifi;
