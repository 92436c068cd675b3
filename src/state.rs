//! The run state of the control loop and the cell sharing it with the wake
//! interrupt.
//!
//! The main loop is the only writer of the run state, except for exactly one
//! transition: the external wake interrupt may move the state from
//! [`RunState::Sleep`] to [`RunState::Wake`]. Every access goes through a
//! critical section, which on the ATtiny85 masks interrupts for the duration
//! of the access, so the interrupt can never observe or produce a torn
//! update and its write is visible to the main loop as soon as it returns.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

use crate::config::WakeEdge;

/// The different states of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Power-on: the sensor still needs to be identified and configured.
    ///
    /// Transitions to [`RunState::Sleep`] once the sensor is set up.
    Start = 0,
    /// The core is powered down, waiting for the proximity interrupt.
    ///
    /// Only the wake interrupt moves this state on, to [`RunState::Wake`].
    Sleep = 1,
    /// Woken up: the ambient light is measured once.
    ///
    /// Transitions to [`RunState::LowLight`] or [`RunState::HighLight`].
    Wake = 2,
    /// It is dark: the light is on and proximity is polled.
    LowLight = 3,
    /// It is bright enough: the light stays off and proximity is polled.
    HighLight = 4,
    /// Something came close: the light is switched off.
    ///
    /// The next state will always be [`RunState::Sleep`].
    Closed = 5,
}

/// Interrupt-safe storage of the [`RunState`].
pub struct RunStateCell(Mutex<Cell<RunState>>);

impl RunStateCell {
    /// Create a new cell, usable in a `static`.
    pub const fn new(initial: RunState) -> Self {
        Self(Mutex::new(Cell::new(initial)))
    }

    /// Read the current state.
    pub fn get(&self) -> RunState {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    /// Overwrite the current state. Reserved for the control loop.
    pub fn set(&self, state: RunState) {
        critical_section::with(|cs| self.0.borrow(cs).set(state));
    }

    /// Check for [`RunState::Sleep`] inside an already established critical
    /// section.
    ///
    /// This is what a low-power implementation uses to decide, with
    /// interrupts still masked, whether it may commit to powering down.
    pub fn is_sleeping(&self, cs: CriticalSection<'_>) -> bool {
        self.0.borrow(cs).get() == RunState::Sleep
    }

    /// Request the transition out of [`RunState::Sleep`].
    ///
    /// This is the whole job of the wake interrupt. The state only changes if
    /// the loop is currently sleeping; any other state is left untouched, so
    /// an edge arriving in the middle of a measurement has no effect. Returns
    /// whether the state was changed.
    pub fn request_wake(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.0.borrow(cs);
            if cell.get() == RunState::Sleep {
                cell.set(RunState::Wake);
                true
            } else {
                false
            }
        })
    }
}

/// Body of the wake interrupt handler.
///
/// First withdraws a pending commitment to low-power mode, then requests the
/// transition out of [`RunState::Sleep`]. No bus traffic or measurement ever
/// happens here, that is left to the control loop.
pub fn on_wake<F: FnOnce()>(state: &RunStateCell, cancel_power_down: F) -> bool {
    cancel_power_down();
    state.request_wake()
}

/// Body of a pin change interrupt on the wake input.
///
/// A pin change fires on both edges of the line. Only a change that left the
/// line at the level `edge` leads to is handed to [`on_wake`], the opposite
/// edge (the sensor releasing its output) is ignored.
pub fn on_pin_change<F: FnOnce()>(
    state: &RunStateCell,
    edge: WakeEdge,
    line_high: bool,
    cancel_power_down: F,
) -> bool {
    edge.reached(line_high) && on_wake(state, cancel_power_down)
}
