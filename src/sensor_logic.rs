//! AHT10 command set and measurement decoding.

use crate::error::Error;

/// Fixed I²C address of the AHT10.
pub const AHT10_ADDRESS: u8 = 0x38;

/// Calibrate / initialise command.
pub const CMD_INIT: [u8; 3] = [0xE1, 0x08, 0x00];

/// Start a measurement.
pub const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

/// Time the sensor needs between trigger and read-out (ms).
pub const MEASUREMENT_DELAY_MS: u64 = 80;

const STATUS_BUSY: u8 = 0x80;
const FULL_SCALE: f32 = (1u32 << 20) as f32;

/// One temperature / humidity sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Decode the 6-byte read-out: status, 20 bits humidity, 20 bits temperature.
pub fn decode_measurement(frame: &[u8; 6]) -> Result<Measurement, Error> {
    if frame[0] & STATUS_BUSY != 0 {
        return Err(Error::Sensor);
    }

    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    Ok(Measurement {
        temperature_c: raw_temperature as f32 / FULL_SCALE * 200.0 - 50.0,
        humidity_pct: raw_humidity as f32 / FULL_SCALE * 100.0,
    })
}
