//! # Button Tasks
//! This module contains the tasks for the buttons. Each button has its own
//! task, but all four share one debounce clock: a press accepted on any
//! button closes the acceptance window for every button, matching the
//! single interrupt timestamp the board wiring was designed around.

use crate::event::{send_event, Event};
use defmt::{info, Format};
use embassy_rp::gpio::Input;
use embassy_time::Instant;
use portable_atomic::{AtomicU64, Ordering};

/// Minimum spacing between accepted presses, shared across all buttons.
const DEBOUNCE_WINDOW_MS: u64 = 200;

/// The buttons of the system
#[derive(Debug, Format, Eq, PartialEq, Clone, Copy)]
pub enum Button {
    /// Start or stop logging
    StartStop,
    /// Silence an active alarm
    Silence,
    /// Cycle the sampling interval
    Interval,
    /// Reset the run-time reference
    Reset,
}

/// The shared "last accepted press" clock.
///
/// A press is accepted only if more than [`DEBOUNCE_WINDOW_MS`] has passed
/// since the last accepted press on any button, and the clock advances on
/// acceptance only. The compare-and-swap keeps two near-simultaneous edges
/// on different buttons from both claiming the same window.
pub struct DebounceGate {
    /// Milliseconds since boot of the last accepted press
    last_accepted_ms: AtomicU64,
}

impl DebounceGate {
    /// A fresh gate. The clock starts at zero, so presses inside the first
    /// window after boot are swallowed.
    pub const fn new() -> Self {
        Self {
            last_accepted_ms: AtomicU64::new(0),
        }
    }

    /// Try to accept a press observed at `now_ms`.
    pub fn try_accept(&self, now_ms: u64) -> bool {
        let last = self.last_accepted_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) <= DEBOUNCE_WINDOW_MS {
            return false;
        }
        self.last_accepted_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// The debounce clock shared by every button task.
static DEBOUNCE_GATE: DebounceGate = DebounceGate::new();

/// Turns debounced presses of one button into its system event.
pub struct ButtonManager<'a> {
    /// The input pin for the button
    input: Input<'a>,
    /// The event to send when a press is accepted
    event: Event,
    /// The button being managed
    button: Button,
}

impl<'a> ButtonManager<'a> {
    /// Create a new `ButtonManager`
    pub const fn new(input: Input<'a>, event: Event, button: Button) -> Self {
        Self {
            input,
            event,
            button,
        }
    }

    /// Wait for rising edges (the buttons are wired pull-down, so a press
    /// drives the pin high) and forward the ones the shared gate accepts.
    pub async fn handle_presses(&mut self) {
        loop {
            self.input.wait_for_rising_edge().await;
            if DEBOUNCE_GATE.try_accept(Instant::now().as_millis()) {
                info!("{} button pressed", self.button);
                send_event(self.event.clone()).await;
            }
        }
    }
}

#[embassy_executor::task(pool_size = 4)]
pub async fn button_handler(input: Input<'static>, event: Event, button: Button) {
    let mut btn = ButtonManager::new(input, event, button);
    info!("{} button task started", button);
    btn.handle_presses().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_inside_boot_window_is_swallowed() {
        let gate = DebounceGate::new();
        assert!(!gate.try_accept(100));
    }

    #[test]
    fn spaced_presses_are_both_accepted() {
        let gate = DebounceGate::new();
        assert!(gate.try_accept(250));
        assert!(gate.try_accept(550));
    }

    #[test]
    fn rapid_second_press_is_rejected() {
        let gate = DebounceGate::new();
        assert!(gate.try_accept(250));
        assert!(!gate.try_accept(300));
        assert!(!gate.try_accept(449));
    }

    #[test]
    fn window_is_measured_from_last_accepted_press() {
        let gate = DebounceGate::new();
        assert!(gate.try_accept(250));
        // rejected presses do not extend the window
        assert!(!gate.try_accept(400));
        assert!(gate.try_accept(451));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let gate = DebounceGate::new();
        assert!(gate.try_accept(250));
        assert!(!gate.try_accept(450));
        assert!(gate.try_accept(452));
    }

    #[test]
    fn one_clock_covers_all_buttons() {
        // Both "buttons" consult the same gate, so a press on one
        // suppresses an immediate press on the other.
        let gate = DebounceGate::new();
        assert!(gate.try_accept(250)); // silence button
        assert!(!gate.try_accept(260)); // interval button, 10 ms later
    }
}
