//! GPIO button input.
//!
//! One active-low button with the internal pull-up. An async task samples
//! the pin every [`BUTTON_SAMPLE_MS`], runs it through the
//! [`GestureDetector`], and queues the resulting primitives for the
//! lifecycle controller, which drains them without blocking.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Instant, Timer};
use esp_hal::gpio::Input;

use crate::config::BUTTON_SAMPLE_MS;
use crate::lifecycle::ButtonSource;
use crate::ui::gesture::{GestureDetector, GestureTiming};
use crate::ui::RawButtonPrimitive;

/// Queue depth; a full queue drops new primitives.
pub const QUEUE_DEPTH: usize = 4;

pub type ButtonChannel = Channel<CriticalSectionRawMutex, RawButtonPrimitive, QUEUE_DEPTH>;

/// Poll the button forever, pushing primitives into `tx`.
///
/// The detector is seeded with the level at task start, so a wake press
/// still held down is not reported as a click.
pub async fn button_task(
    pin: Input<'static>,
    timing: GestureTiming,
    tx: Sender<'static, CriticalSectionRawMutex, RawButtonPrimitive, QUEUE_DEPTH>,
) -> ! {
    let mut detector = GestureDetector::new(timing, pin.is_low());
    if detector.is_pressed() {
        info!("button held at boot");
    }
    loop {
        let now = Instant::now().as_millis();
        if let Some(primitive) = detector.update(pin.is_low(), now) {
            debug!("button primitive {:?}", primitive);
            if tx.try_send(primitive).is_err() {
                warn!("button queue full, dropped {:?}", primitive);
            }
        }
        Timer::after_millis(BUTTON_SAMPLE_MS).await;
    }
}

/// Controller side of the button queue.
pub struct QueuedButtons {
    rx: Receiver<'static, CriticalSectionRawMutex, RawButtonPrimitive, QUEUE_DEPTH>,
}

impl QueuedButtons {
    pub fn new(channel: &'static ButtonChannel) -> Self {
        Self {
            rx: channel.receiver(),
        }
    }
}

impl ButtonSource for QueuedButtons {
    fn try_next(&mut self) -> Option<RawButtonPrimitive> {
        self.rx.try_receive().ok()
    }
}
