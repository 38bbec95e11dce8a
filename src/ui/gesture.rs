//! Debounced button gesture detector.
//!
//! Turns raw active-low samples into [`RawButtonPrimitive`]s:
//!
//! - one short press, then silence for the click window → `Click`
//! - second short press inside the click window → `DoubleClick`, reported
//!   as soon as it is released
//! - any press held past the long-press threshold → `LongPressEnd` on release
//!
//! Triple clicks are not recognised here. A third click shows up as a
//! separate `Click` after the window, which is why the disambiguation
//! timeout must cover [`GestureTiming::max_triple_gap_ms`].

use crate::config::{
    BUTTON_CLICK_WINDOW_MS, BUTTON_DEBOUNCE_MS, BUTTON_LONG_PRESS_MS, BUTTON_MAX_THIRD_CLICK_MS,
};
use crate::error::Error;
use crate::ui::RawButtonPrimitive;

/// Detector timing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GestureTiming {
    pub debounce_ms: u64,
    pub click_window_ms: u64,
    pub long_press_ms: u64,
    /// Longest time from a `DoubleClick` notification until the release of
    /// the click that follows it.
    pub max_third_click_ms: u64,
}

impl GestureTiming {
    pub const DEFAULT: Self = Self {
        debounce_ms: BUTTON_DEBOUNCE_MS,
        click_window_ms: BUTTON_CLICK_WINDOW_MS,
        long_press_ms: BUTTON_LONG_PRESS_MS,
        max_third_click_ms: BUTTON_MAX_THIRD_CLICK_MS,
    };

    /// Longest expected gap between `DoubleClick` and the `Click` that
    /// completes a triple: the third click itself, its release debounce,
    /// then the full click window before `Click` is reported.
    pub const fn max_triple_gap_ms(&self) -> u64 {
        self.max_third_click_ms + self.debounce_ms + self.click_window_ms
    }

    /// Check that a disambiguation timeout can see every triple click.
    pub fn validate_disambiguation(&self, timeout_ms: u64) -> Result<(), Error> {
        if timeout_ms > self.max_triple_gap_ms() {
            Ok(())
        } else {
            Err(Error::TimingMismatch)
        }
    }
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Button down. `clicks` counts completed short presses before this one.
    Pressed { since_ms: u64, clicks: u8 },
    /// Button down past the long-press threshold.
    Held,
    /// Button already down when sampling started (the wake press).
    HeldFromBoot,
    /// One short press completed; waiting out the click window.
    Released { at_ms: u64 },
}

/// Button gesture detector - feed it every sample.
#[derive(Clone, Debug)]
pub struct GestureDetector {
    timing: GestureTiming,
    phase: Phase,
    /// Last debounced level (true = pressed).
    stable_low: bool,
    /// Level of the most recent raw sample.
    raw_low: bool,
    /// When the raw level last changed.
    raw_since_ms: u64,
}

impl GestureDetector {
    /// `initially_low` is the pin level at the first sample. A press that is
    /// already down is not a click; holding it past the long-press threshold
    /// (counted from boot) still reports `LongPressEnd`.
    pub const fn new(timing: GestureTiming, initially_low: bool) -> Self {
        Self {
            timing,
            phase: if initially_low {
                Phase::HeldFromBoot
            } else {
                Phase::Idle
            },
            stable_low: initially_low,
            raw_low: initially_low,
            raw_since_ms: 0,
        }
    }

    /// Whether the debounced level is "pressed".
    pub fn is_pressed(&self) -> bool {
        self.stable_low
    }

    /// Process one sample. `is_low` is the raw pin level (active low).
    pub fn update(&mut self, is_low: bool, now_ms: u64) -> Option<RawButtonPrimitive> {
        match self.debounce(is_low, now_ms) {
            Some(true) => {
                self.on_press(now_ms);
                None
            }
            Some(false) => self.on_release(now_ms),
            None => self.on_hold(now_ms),
        }
    }

    /// Returns the new level once a change has been stable for the debounce time.
    fn debounce(&mut self, is_low: bool, now_ms: u64) -> Option<bool> {
        if is_low != self.raw_low {
            self.raw_low = is_low;
            self.raw_since_ms = now_ms;
            return None;
        }

        if is_low != self.stable_low
            && now_ms.saturating_sub(self.raw_since_ms) >= self.timing.debounce_ms
        {
            self.stable_low = is_low;
            return Some(is_low);
        }

        None
    }

    fn on_press(&mut self, now_ms: u64) {
        let clicks = match self.phase {
            Phase::Released { .. } => 1,
            _ => 0,
        };
        self.phase = Phase::Pressed {
            since_ms: now_ms,
            clicks,
        };
    }

    fn on_release(&mut self, now_ms: u64) -> Option<RawButtonPrimitive> {
        let (next, emitted) = match self.phase {
            Phase::Held => (Phase::Idle, Some(RawButtonPrimitive::LongPressEnd)),
            Phase::Pressed { since_ms, .. }
                if now_ms.saturating_sub(since_ms) >= self.timing.long_press_ms =>
            {
                (Phase::Idle, Some(RawButtonPrimitive::LongPressEnd))
            }
            Phase::Pressed { clicks: 0, .. } => (Phase::Released { at_ms: now_ms }, None),
            Phase::Pressed { .. } => (Phase::Idle, Some(RawButtonPrimitive::DoubleClick)),
            Phase::HeldFromBoot => (Phase::Idle, None),
            other => (other, None),
        };
        self.phase = next;
        emitted
    }

    fn on_hold(&mut self, now_ms: u64) -> Option<RawButtonPrimitive> {
        match self.phase {
            Phase::Pressed { since_ms, .. }
                if now_ms.saturating_sub(since_ms) >= self.timing.long_press_ms =>
            {
                self.phase = Phase::Held;
                None
            }
            Phase::HeldFromBoot if now_ms >= self.timing.long_press_ms => {
                self.phase = Phase::Held;
                None
            }
            Phase::Released { at_ms }
                if now_ms.saturating_sub(at_ms) > self.timing.click_window_ms =>
            {
                self.phase = Phase::Idle;
                Some(RawButtonPrimitive::Click)
            }
            _ => None,
        }
    }
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(GestureTiming::DEFAULT, false)
    }
}
