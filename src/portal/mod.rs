//! Provisioning portal - soft-AP setup page for first-time configuration.
//!
//! - **form**: request routing and `x-www-form-urlencoded` parsing
//! - **dns**: wildcard DNS replies pointing every name at the portal
//! - **server**: the access point and single-connection HTTP server
//! - **captive**: DHCP server and DNS responder tasks for the AP stack

pub mod dns;
pub mod form;

#[cfg(feature = "embedded")]
pub mod captive;
#[cfg(feature = "embedded")]
pub mod server;
