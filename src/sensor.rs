//! AHT10 temperature/humidity sensor and battery sense.

use embassy_time::Timer;
use embedded_hal::i2c::I2c;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO4};
use esp_hal::Blocking;

use crate::lifecycle::SensorSource;
use crate::power_logic;
use crate::sensor_logic::{
    decode_measurement, Measurement, AHT10_ADDRESS, CMD_INIT, CMD_TRIGGER, MEASUREMENT_DELAY_MS,
};

pub type BatteryAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type BatteryPin = AdcPin<GPIO4<'static>, ADC1<'static>>;

/// Readings from the sensor rail. Any failed read yields `f32::NAN`.
pub struct NodeSensors<I2C> {
    i2c: I2C,
    initialized: bool,
    adc: BatteryAdc,
    battery_pin: BatteryPin,
}

impl<I2C: I2c> NodeSensors<I2C> {
    pub fn new(i2c: I2C, adc: BatteryAdc, battery_pin: BatteryPin) -> Self {
        Self {
            i2c,
            initialized: false,
            adc,
            battery_pin,
        }
    }

    /// Calibrate once per power-up, then trigger and read one frame.
    async fn measure(&mut self) -> Option<Measurement> {
        if !self.initialized {
            if let Err(e) = self.i2c.write(AHT10_ADDRESS, &CMD_INIT) {
                warn!("aht10 init failed: {:?}", defmt::Debug2Format(&e));
                return None;
            }
            self.initialized = true;
        }

        if let Err(e) = self.i2c.write(AHT10_ADDRESS, &CMD_TRIGGER) {
            warn!("aht10 trigger failed: {:?}", defmt::Debug2Format(&e));
            return None;
        }
        Timer::after_millis(MEASUREMENT_DELAY_MS).await;

        let mut frame = [0u8; 6];
        if let Err(e) = self.i2c.read(AHT10_ADDRESS, &mut frame) {
            warn!("aht10 read failed: {:?}", defmt::Debug2Format(&e));
            return None;
        }

        match decode_measurement(&frame) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("aht10 frame rejected: {:?}", e);
                None
            }
        }
    }
}

impl<I2C: I2c> SensorSource for NodeSensors<I2C> {
    async fn read_temperature(&mut self) -> f32 {
        self.measure().await.map_or(f32::NAN, |m| m.temperature_c)
    }

    async fn read_humidity(&mut self) -> f32 {
        self.measure().await.map_or(f32::NAN, |m| m.humidity_pct)
    }

    async fn read_battery(&mut self) -> f32 {
        let raw = self.adc.read_blocking(&mut self.battery_pin);
        let cell_mv = power_logic::cell_millivolts(raw);
        debug!("battery raw={} cell={} mV", raw, cell_mv);
        power_logic::battery_percent(cell_mv)
    }
}
