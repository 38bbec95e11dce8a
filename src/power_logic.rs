use crate::config::{
    ADC_FULL_SCALE_MV, ADC_MAX_RAW, BATTERY_DIVIDER_RATIO, BATTERY_EMPTY_MV, BATTERY_FULL_MV,
    DEFAULT_SLEEP_INTERVAL_SECS,
};

/// Deep-sleep interval to use for a stored setting; non-positive values
/// fall back to the default.
pub fn effective_sleep_interval(stored_secs: i32) -> u32 {
    if stored_secs > 0 {
        stored_secs as u32
    } else {
        DEFAULT_SLEEP_INTERVAL_SECS
    }
}

/// Timer wake-up delay in microseconds for a sleep interval.
pub fn sleep_duration_us(seconds: u32) -> u64 {
    u64::from(seconds) * 1_000_000
}

/// Linear state of charge between the empty and full cell voltages, clamped
/// to 0-100.
pub fn battery_percent(cell_mv: u32) -> f32 {
    if cell_mv <= BATTERY_EMPTY_MV {
        return 0.0;
    }
    if cell_mv >= BATTERY_FULL_MV {
        return 100.0;
    }
    (cell_mv - BATTERY_EMPTY_MV) as f32 * 100.0 / (BATTERY_FULL_MV - BATTERY_EMPTY_MV) as f32
}

/// Cell voltage behind the divider for a raw 12-bit ADC reading.
pub fn cell_millivolts(raw: u16) -> u32 {
    let pin_mv = u32::from(raw).min(ADC_MAX_RAW) * ADC_FULL_SCALE_MV / ADC_MAX_RAW;
    pin_mv * BATTERY_DIVIDER_RATIO
}
