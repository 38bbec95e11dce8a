//! Power management - switched rails, wake reason, deep sleep.
//!
//! ESP32-C3 power modes used by the node:
//! - Active: radio and peripherals on (~80 mA while WiFi transmits)
//! - Deep sleep: RTC domain only, wake on timer or button (~5 µA)
//!
//! The OLED and the sensor each sit behind a GPIO-switched rail so that
//! nothing but the RTC draws current while asleep.

use esp_hal::delay::Delay;
use esp_hal::gpio::{Output, RtcPinWithResistors};
use esp_hal::peripherals::{GPIO3, LPWR};
use esp_hal::rtc_cntl::sleep::{RtcioWakeupSource, TimerWakeupSource, WakeupLevel};
use esp_hal::rtc_cntl::{wakeup_cause, Rtc};
use esp_hal::system::SleepSource;

use crate::config::RAIL_SETTLE_MS;
use crate::lifecycle::PowerController;
use crate::power_logic;
use crate::wake::WakeCause;

/// Peripheral supply switches.
pub struct Rails {
    oled: Output<'static>,
    sensor: Output<'static>,
    delay: Delay,
}

impl Rails {
    pub fn new(oled: Output<'static>, sensor: Output<'static>) -> Self {
        Self {
            oled,
            sensor,
            delay: Delay::new(),
        }
    }
}

impl PowerController for Rails {
    fn peripherals_on(&mut self) {
        self.oled.set_high();
        self.sensor.set_high();
        self.delay.delay_millis(RAIL_SETTLE_MS as u32);
        info!("Power: peripheral rails on");
    }

    fn peripherals_off(&mut self) {
        self.oled.set_low();
        self.sensor.set_low();
        info!("Power: peripheral rails off");
    }
}

/// Why the chip is running, as reported by the RTC.
pub fn wake_cause() -> WakeCause {
    let source = wakeup_cause();
    info!("Power: wakeup source {:?}", defmt::Debug2Format(&source));
    match source {
        SleepSource::Timer => WakeCause::Timer,
        SleepSource::Gpio | SleepSource::Ext0 | SleepSource::Ext1 => WakeCause::ExternalPin,
        _ => WakeCause::Undefined,
    }
}

/// Arm the timer and the button (GPIO3, active low) and power down.
pub fn enter_deep_sleep(lpwr: LPWR<'static>, seconds: u32) -> ! {
    let mut rtc = Rtc::new(lpwr);
    let timer = TimerWakeupSource::new(core::time::Duration::from_micros(
        power_logic::sleep_duration_us(seconds),
    ));

    // The button task no longer runs; take the pin back for the RTC.
    let mut button = unsafe { GPIO3::steal() };
    // Keep the pull-up through sleep so the floating pin cannot wake us.
    button.rtcio_pullup(true);
    button.rtcio_pulldown(false);
    let mut wake_pins: [(&mut dyn RtcPinWithResistors, WakeupLevel); 1] =
        [(&mut button, WakeupLevel::Low)];
    let rtcio = RtcioWakeupSource::new(&mut wake_pins);

    info!("Power: deep sleep for {} s", seconds);
    rtc.sleep_deep(&[&timer, &rtcio])
}
