//! Click disambiguation - single / double / triple / long press.
//!
//! The gesture detector reports a double click the moment it happens, and a
//! third click only as an ordinary `Click` some time later. To tell a double
//! click from the first two thirds of a triple click, a `DoubleClick` is held
//! back for [`DISAMBIGUATION_TIMEOUT_MS`]: a `Click` arriving in that window
//! upgrades it to `Triple`, otherwise it resolves to `Double`.
//!
//! Resolved events land in a single-slot mailbox. A newer event overwrites an
//! unread one, so the reader has to drain it every tick.

use crate::config::DISAMBIGUATION_TIMEOUT_MS;
use crate::error::Error;
use crate::ui::gesture::GestureTiming;
use crate::ui::{ButtonEvent, RawButtonPrimitive};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClickPhase {
    Idle,
    /// A `DoubleClick` arrived at `since_ms` and may still become a triple.
    DoubleClickPending { since_ms: u64 },
}

#[derive(Clone, Debug)]
pub struct ClickDisambiguator {
    timeout_ms: u64,
    phase: ClickPhase,
    mailbox: Option<ButtonEvent>,
}

impl ClickDisambiguator {
    pub const fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            phase: ClickPhase::Idle,
            mailbox: None,
        }
    }

    /// Build a disambiguator whose timeout is checked against the detector
    /// that feeds it.
    pub fn with_timing(timing: &GestureTiming, timeout_ms: u64) -> Result<Self, Error> {
        timing.validate_disambiguation(timeout_ms)?;
        Ok(Self::new(timeout_ms))
    }

    pub fn phase(&self) -> ClickPhase {
        self.phase
    }

    pub fn has_event(&self) -> bool {
        self.mailbox.is_some()
    }

    /// Feed one primitive from the debounced-button source.
    pub fn feed(&mut self, primitive: RawButtonPrimitive, now_ms: u64) {
        match (self.phase, primitive) {
            (_, RawButtonPrimitive::LongPressEnd) => {
                self.phase = ClickPhase::Idle;
                self.emit(ButtonEvent::LongPress);
            }
            (ClickPhase::Idle, RawButtonPrimitive::Click) => self.emit(ButtonEvent::Single),
            (ClickPhase::DoubleClickPending { .. }, RawButtonPrimitive::Click) => {
                self.phase = ClickPhase::Idle;
                self.emit(ButtonEvent::Triple);
            }
            // A fresh double click restarts the window; the earlier one is folded in.
            (_, RawButtonPrimitive::DoubleClick) => {
                self.phase = ClickPhase::DoubleClickPending { since_ms: now_ms };
            }
        }
    }

    /// Resolve a pending double click once the timeout has strictly elapsed.
    pub fn poll(&mut self, now_ms: u64) {
        if let ClickPhase::DoubleClickPending { since_ms } = self.phase {
            if now_ms.saturating_sub(since_ms) > self.timeout_ms {
                self.phase = ClickPhase::Idle;
                self.emit(ButtonEvent::Double);
            }
        }
    }

    /// Take the unread event, leaving the mailbox empty.
    pub fn take_event(&mut self) -> Option<ButtonEvent> {
        self.mailbox.take()
    }

    fn emit(&mut self, event: ButtonEvent) {
        if let Some(lost) = self.mailbox.replace(event) {
            debug!("click event {:?} overwritten by {:?}", lost, event);
        }
    }
}

impl Default for ClickDisambiguator {
    fn default() -> Self {
        Self::new(DISAMBIGUATION_TIMEOUT_MS)
    }
}
