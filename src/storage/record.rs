//! Device configuration record.
//!
//! The whole configuration is stored as one postcard-encoded value.
//! Strings are fixed-capacity; anything longer is truncated on the way in.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::power_logic;

pub const SSID_LEN: usize = 32;
pub const PASSWORD_LEN: usize = 64;
pub const SERVER_URL_LEN: usize = 256;
pub const DEVICE_ID_LEN: usize = 32;
pub const DEVICE_NAME_LEN: usize = 32;
pub const DEVICE_TYPE_LEN: usize = 32;
pub const LOCATION_LEN: usize = 64;

/// Upper bound of an encoded record: every string at capacity plus its
/// varint length prefix, a 5-byte varint and a bool, rounded up.
pub const MAX_RECORD_SIZE: usize = 640;

/// Configuration snapshot loaded at boot and replaced on save.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub wifi_ssid: String<SSID_LEN>,
    pub wifi_password: String<PASSWORD_LEN>,
    pub server_url: String<SERVER_URL_LEN>,
    /// Server-assigned identity; empty until registration succeeds.
    pub device_id: String<DEVICE_ID_LEN>,
    pub device_name: String<DEVICE_NAME_LEN>,
    pub device_type: String<DEVICE_TYPE_LEN>,
    pub location_hint: String<LOCATION_LEN>,
    /// Deep-sleep period as entered; see [`DeviceConfig::effective_sleep_secs`].
    pub sleep_interval_secs: i32,
    pub configured: bool,
}

impl DeviceConfig {
    pub fn is_registered(&self) -> bool {
        !self.device_id.is_empty()
    }

    pub fn effective_sleep_secs(&self) -> u32 {
        power_logic::effective_sleep_interval(self.sleep_interval_secs)
    }

    /// Encode into `buf`, returning the used prefix.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], Error> {
        postcard::to_slice(self, buf).map_err(|_| Error::BufferOverflow)
    }

    /// Decode a stored record. Corrupt or foreign data is an error, never a panic.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        postcard::from_bytes(bytes).map_err(|_| Error::Storage)
    }
}

/// Copy `s` into a fixed-capacity string, dropping whole chars that do not fit.
pub fn truncated<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceConfig {
        DeviceConfig {
            wifi_ssid: truncated("home-net"),
            wifi_password: truncated("hunter22"),
            server_url: truncated("http://192.168.1.100:4000"),
            device_id: truncated("3f2a"),
            device_name: truncated("Shelf"),
            device_type: truncated("Temp/Humidity"),
            location_hint: truncated("Pantry"),
            sleep_interval_secs: 600,
            configured: true,
        }
    }

    #[test]
    fn stored_record_decodes_to_same_config() {
        let config = sample();
        let mut buf = [0u8; MAX_RECORD_SIZE];
        let bytes = config.encode(&mut buf).unwrap();
        assert_eq!(DeviceConfig::decode(bytes).unwrap(), config);
    }

    #[test]
    fn full_capacity_record_fits_max_size() {
        let long = "x".repeat(300);
        let config = DeviceConfig {
            wifi_ssid: truncated(&long),
            wifi_password: truncated(&long),
            server_url: truncated(&long),
            device_id: truncated(&long),
            device_name: truncated(&long),
            device_type: truncated(&long),
            location_hint: truncated(&long),
            sleep_interval_secs: i32::MIN,
            configured: true,
        };
        let mut buf = [0u8; MAX_RECORD_SIZE];
        assert!(config.encode(&mut buf).is_ok());
    }

    #[test]
    fn small_buffer_is_overflow() {
        let mut buf = [0u8; 8];
        assert_eq!(sample().encode(&mut buf).err(), Some(Error::BufferOverflow));
    }

    #[test]
    fn garbage_decodes_to_error() {
        assert_eq!(DeviceConfig::decode(&[]), Err(Error::Storage));
        assert_eq!(DeviceConfig::decode(&[0xFF; 4]), Err(Error::Storage));
    }

    #[test]
    fn truncated_respects_char_boundaries() {
        let s: String<4> = truncated("ab\u{e9}cd");
        assert_eq!(s.as_str(), "ab\u{e9}");
        let s: String<3> = truncated("ab\u{e9}");
        assert_eq!(s.as_str(), "ab");
    }

    #[test]
    fn registration_and_sleep_helpers() {
        let mut config = sample();
        assert!(config.is_registered());
        assert_eq!(config.effective_sleep_secs(), 600);
        config.device_id.clear();
        config.sleep_interval_secs = 0;
        assert!(!config.is_registered());
        assert_eq!(config.effective_sleep_secs(), 300);
    }

    #[test]
    fn default_is_unconfigured() {
        let config = DeviceConfig::default();
        assert!(!config.configured);
        assert!(!config.is_registered());
        assert_eq!(config.effective_sleep_secs(), 300);
    }
}
