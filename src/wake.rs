//! Boot-time routing by wake reason.

use crate::lifecycle::DeviceState;

/// Why the chip started running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeCause {
    /// The deep-sleep timer expired.
    Timer,
    /// The button pulled its RTC pin low during deep sleep.
    ExternalPin,
    /// Cold boot, reset, or any wake source we did not arm.
    Undefined,
}

/// Pick the first lifecycle state for a wake cause.
///
/// A timer wake goes straight to reporting; a button wake shows the info
/// screen; everything else boots normally.
pub fn classify(cause: WakeCause) -> DeviceState {
    match cause {
        WakeCause::Timer => DeviceState::ConnectingWifi,
        WakeCause::ExternalPin => DeviceState::InfoDisplay,
        WakeCause::Undefined => DeviceState::Boot,
    }
}
