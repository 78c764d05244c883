//! # State of the system
//! This module describes the state of the system and the operations that can
//! be performed on it: the logging flag, the cyclic sample schedule, the
//! run-time clock reference and the alarm engine with its hysteresis window.
//!
//! All of it is owned by the orchestrator task behind [`SYSTEM_STATE`];
//! every mutation travels through the event channel, so no reading is ever
//! paired with a half-updated alarm decision.

use crate::clock::{ClockSnapshot, RunClock, RunTime};
use defmt::Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;

/// Type alias for the system state protected by a mutex.
///
/// The state is wrapped in an `Option` to allow for the possibility of the
/// state being uninitialized; the orchestrator fills it in before any other
/// task can observe it.
type SystemStateType = Mutex<CriticalSectionRawMutex, Option<SystemState>>;

/// Global instance of the system state, initialized by the orchestrator.
pub static SYSTEM_STATE: SystemStateType = Mutex::new(None);

/// Lower edge of the safe band for the derived control output, in volts.
pub const SAFE_BAND_LOW_VOLTS: f32 = 0.65;
/// Upper edge of the safe band for the derived control output, in volts.
pub const SAFE_BAND_HIGH_VOLTS: f32 = 2.65;

/// The ordered set of sampling intervals the interval button cycles
/// through, in seconds.
pub const SAMPLE_INTERVALS_SECS: [u64; 3] = [1, 2, 5];

/// One converted sensor sample, immutable once published.
#[derive(Debug, Format, Clone, PartialEq)]
pub struct Reading {
    /// Wall-clock time of the sample; `None` when the RTC registers did not
    /// decode as valid BCD this cycle
    pub clock: Option<ClockSnapshot>,
    /// Humidity sensor output in volts
    pub humidity_volts: f32,
    /// Ambient temperature in degrees Celsius
    pub temperature_celsius: f32,
    /// Light level as the raw 10-bit ADC count
    pub light_raw: u16,
    /// Derived control output in volts
    pub dac_output_volts: f32,
}

impl Reading {
    /// Whether the derived control output lies outside the safe band.
    pub fn is_out_of_band(&self) -> bool {
        self.dac_output_volts < SAFE_BAND_LOW_VOLTS || self.dac_output_volts > SAFE_BAND_HIGH_VOLTS
    }
}

/// Cyclic index into the configured sampling intervals.
#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub struct SampleSchedule {
    /// Current position in [`SAMPLE_INTERVALS_SECS`]
    index: usize,
}

impl SampleSchedule {
    /// Start at the first (shortest) interval.
    pub const fn new() -> Self {
        Self { index: 0 }
    }

    /// Advance to the next interval, wrapping past the last one, and
    /// return the newly selected interval in seconds.
    pub const fn cycle(&mut self) -> u64 {
        self.index = (self.index + 1) % SAMPLE_INTERVALS_SECS.len();
        SAMPLE_INTERVALS_SECS[self.index]
    }

    /// The currently selected interval.
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(SAMPLE_INTERVALS_SECS[self.index])
    }

    /// The current index, mostly useful for diagnostics.
    pub const fn index(&self) -> usize {
        self.index
    }
}

/// The state of the alarm.
#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    /// No alarm is being raised
    Idle,
    /// The alarm is latched on and sounding until explicitly silenced
    Active,
}

/// Outcome of evaluating one reading against the alarm engine.
#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub enum AlarmDecision {
    /// No transition this cycle
    Unchanged,
    /// The alarm just transitioned Idle -> Active
    Raised,
}

/// Threshold and hysteresis decision logic for the latched alarm.
///
/// A trigger is suppressed while the previous one is still recent: the
/// engine re-arms only once the elapsed time since the last trigger has a
/// non-zero hours component or a minutes component above two. Silencing
/// the alarm does not touch that window; only the reset button clears the
/// trigger history.
#[derive(Debug, Format, Clone, Copy, PartialEq, Eq)]
pub struct AlarmEngine {
    /// Current alarm state
    state: AlarmState,
    /// Run-time seconds at the last Idle -> Active transition; `None`
    /// before the first trigger or after a reset
    last_trigger: Option<i32>,
}

impl AlarmEngine {
    /// A fresh engine: idle, never triggered.
    pub const fn new() -> Self {
        Self {
            state: AlarmState::Idle,
            last_trigger: None,
        }
    }

    /// Current alarm state.
    pub const fn state(&self) -> AlarmState {
        self.state
    }

    /// Whether the alarm is currently latched on.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, AlarmState::Active)
    }

    /// Whether a trigger has occurred since startup or the last reset.
    pub const fn has_triggered(&self) -> bool {
        self.last_trigger.is_some()
    }

    /// Elapsed run-time since the last trigger, or `None` if the alarm has
    /// never triggered.
    pub fn recency(&self, run_time: &RunTime) -> Option<RunTime> {
        self.last_trigger
            .map(|origin| RunTime::from_seconds(run_time.total_seconds() - origin))
    }

    /// Evaluate one reading.
    ///
    /// Transitions Idle -> Active iff the reading's control output is out
    /// of band and the re-trigger window is open. Readings without a valid
    /// clock are non-actionable: the run-time they would anchor the
    /// recency origin to is unknown.
    pub fn evaluate(&mut self, reading: &Reading, run_time: &RunTime) -> AlarmDecision {
        if reading.clock.is_none() {
            return AlarmDecision::Unchanged;
        }
        if self.state == AlarmState::Idle
            && reading.is_out_of_band()
            && self.retrigger_window_open(run_time)
        {
            self.state = AlarmState::Active;
            self.last_trigger = Some(run_time.total_seconds());
            return AlarmDecision::Raised;
        }
        AlarmDecision::Unchanged
    }

    /// Silence the alarm. Returns true if it was active.
    ///
    /// This is the only Active -> Idle transition; an in-band reading never
    /// clears the latch. The trigger history is left untouched, so a
    /// subsequent breach still honors the hysteresis window measured from
    /// the trigger, not from the silence.
    pub const fn silence(&mut self) -> bool {
        match self.state {
            AlarmState::Active => {
                self.state = AlarmState::Idle;
                true
            }
            AlarmState::Idle => false,
        }
    }

    /// Forget the trigger history (reset button). The next out-of-band
    /// reading triggers regardless of how recent the previous alarm was.
    pub const fn clear_history(&mut self) {
        self.last_trigger = None;
    }

    /// The hysteresis gate: open when no trigger has happened yet, or when
    /// the elapsed time since the last one has left the holdoff window.
    fn retrigger_window_open(&self, run_time: &RunTime) -> bool {
        match self.last_trigger {
            None => true,
            Some(origin) => {
                let recency = RunTime::from_seconds(run_time.total_seconds() - origin);
                recency.hours > 0 || recency.minutes > 2
            }
        }
    }
}

/// All the mutable state of the system, owned by the orchestrator.
#[derive(Debug, Format, Clone, PartialEq)]
pub struct SystemState {
    /// Whether the sampler is currently logging
    pub logging_active: bool,
    /// The cyclic sampling interval selection
    pub schedule: SampleSchedule,
    /// The latched alarm and its hysteresis window
    pub alarm: AlarmEngine,
    /// The run-time reference clock
    pub run_clock: RunClock,
    /// Last published reading, kept as last-known-good for the display
    pub last_reading: Option<Reading>,
    /// Run-time paired with `last_reading`
    pub last_run_time: Option<RunTime>,
}

impl SystemState {
    /// Create the initial state, anchored at the startup reference
    /// snapshot. Logging starts inactive; the operator starts it with the
    /// start/stop button.
    pub const fn new(reference: ClockSnapshot) -> Self {
        Self {
            logging_active: false,
            schedule: SampleSchedule::new(),
            alarm: AlarmEngine::new(),
            run_clock: RunClock::new(reference),
            last_reading: None,
            last_run_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_with_output(dac_output_volts: f32) -> Reading {
        Reading {
            clock: Some(ClockSnapshot::new(10, 0, 0)),
            humidity_volts: 1.2,
            temperature_celsius: 22.5,
            light_raw: 512,
            dac_output_volts,
        }
    }

    #[test]
    fn interval_cycling_wraps_back_to_start() {
        let mut schedule = SampleSchedule::new();
        assert_eq!(schedule.index(), 0);
        assert_eq!(schedule.cycle(), 2);
        assert_eq!(schedule.cycle(), 5);
        assert_eq!(schedule.cycle(), 1);
        assert_eq!(schedule.index(), 0);
    }

    #[test]
    fn interval_duration_tracks_index() {
        let mut schedule = SampleSchedule::new();
        assert_eq!(schedule.interval(), Duration::from_secs(1));
        schedule.cycle();
        assert_eq!(schedule.interval(), Duration::from_secs(2));
    }

    #[test]
    fn in_band_reading_does_not_trigger() {
        let mut engine = AlarmEngine::new();
        let decision = engine.evaluate(&reading_with_output(1.5), &RunTime::from_seconds(60));
        assert_eq!(decision, AlarmDecision::Unchanged);
        assert!(!engine.is_active());
        assert!(!engine.has_triggered());
    }

    #[test]
    fn first_out_of_band_reading_triggers() {
        let mut engine = AlarmEngine::new();
        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60));
        assert_eq!(decision, AlarmDecision::Raised);
        assert!(engine.is_active());
        assert!(engine.has_triggered());
    }

    #[test]
    fn low_side_breach_triggers_too() {
        let mut engine = AlarmEngine::new();
        let decision = engine.evaluate(&reading_with_output(0.3), &RunTime::from_seconds(0));
        assert_eq!(decision, AlarmDecision::Raised);
    }

    #[test]
    fn recent_trigger_suppresses_retrigger() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60));
        assert!(engine.silence());

        // Same breach again with zero recency: the window is still closed.
        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60));
        assert_eq!(decision, AlarmDecision::Unchanged);
        assert!(!engine.is_active());
        assert!(engine.has_triggered());
    }

    #[test]
    fn window_reopens_after_three_minutes() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60));
        engine.silence();

        // 2 minutes 59 seconds later: minutes component is 2, still closed.
        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60 + 179));
        assert_eq!(decision, AlarmDecision::Unchanged);

        // 3 minutes later: minutes component is 3, open again.
        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60 + 180));
        assert_eq!(decision, AlarmDecision::Raised);
    }

    #[test]
    fn window_reopens_after_an_hour_regardless_of_minutes() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(0));
        engine.silence();

        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(3600));
        assert_eq!(decision, AlarmDecision::Raised);
    }

    #[test]
    fn alarm_latches_until_silenced() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(0));
        assert!(engine.is_active());

        // Readings back inside the safe band do not clear the latch.
        let decision = engine.evaluate(&reading_with_output(1.5), &RunTime::from_seconds(600));
        assert_eq!(decision, AlarmDecision::Unchanged);
        assert!(engine.is_active());

        assert!(engine.silence());
        assert!(!engine.is_active());
        // Silencing twice is a no-op.
        assert!(!engine.silence());
    }

    #[test]
    fn silence_preserves_recency_origin() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(100));
        engine.silence();
        let recency = engine.recency(&RunTime::from_seconds(160));
        assert_eq!(recency, Some(RunTime::from_seconds(60)));
    }

    #[test]
    fn reset_clears_history_and_rearms_immediately() {
        let mut engine = AlarmEngine::new();
        engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(60));
        engine.silence();
        engine.clear_history();
        assert!(!engine.has_triggered());
        assert_eq!(engine.recency(&RunTime::from_seconds(61)), None);

        // With the history gone the very next breach triggers.
        let decision = engine.evaluate(&reading_with_output(3.0), &RunTime::from_seconds(61));
        assert_eq!(decision, AlarmDecision::Raised);
    }

    #[test]
    fn invalid_clock_reading_is_non_actionable() {
        let mut engine = AlarmEngine::new();
        let mut reading = reading_with_output(3.0);
        reading.clock = None;
        let decision = engine.evaluate(&reading, &RunTime::from_seconds(0));
        assert_eq!(decision, AlarmDecision::Unchanged);
        assert!(!engine.is_active());
        assert!(!engine.has_triggered());
    }

    #[test]
    fn band_edges_are_inside_the_safe_band() {
        assert!(!reading_with_output(SAFE_BAND_LOW_VOLTS).is_out_of_band());
        assert!(!reading_with_output(SAFE_BAND_HIGH_VOLTS).is_out_of_band());
        assert!(reading_with_output(0.64).is_out_of_band());
        assert!(reading_with_output(2.66).is_out_of_band());
    }
}
