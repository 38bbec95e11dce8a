//! User interface subsystem - one push button and a 128×64 OLED.
//!
//! ## Components
//!
//! - **Gesture**: debounced button primitives (click, double click, long press)
//! - **Clicks**: folds primitives into single/double/triple/long-press events
//! - **Screens**: text layout for the OLED, host-testable
//! - **Buttons** / **Display**: the embedded halves (GPIO task, SSD1306 driver)

pub mod clicks;
pub mod gesture;
pub mod screens;

#[cfg(feature = "embedded")]
pub mod buttons;
#[cfg(feature = "embedded")]
pub mod display;

/// Notifications produced by the debounced-button source.
///
/// A triple click is not among them: it only exists after
/// [`clicks::ClickDisambiguator`] has seen a `DoubleClick` followed by a
/// `Click`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RawButtonPrimitive {
    Click,
    DoubleClick,
    LongPressEnd,
}

/// Resolved button gestures, as consumed by the lifecycle controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Single,
    Double,
    Triple,
    LongPress,
}
