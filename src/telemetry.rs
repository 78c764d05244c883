//! # Telemetry records
//! Builds the fixed-width text record emitted once per sample cycle, and
//! names the discrete channels used by value-based telemetry sinks.
//!
//! A record always pairs a reading with the alarm state decided for that
//! same cycle; the orchestrator assembles it under the state lock right
//! after the alarm decision.

use crate::clock::{ClockSnapshot, RunTime};
use crate::state::Reading;
use core::fmt::Write as _;
use defmt::Format;
use heapless::String;

/// Maximum rendered length of one record line.
pub const RECORD_CAPACITY: usize = 80;

/// Channel for the composite record line.
pub const CHANNEL_RECORD: u8 = 0;
/// Channel for the discrete temperature value.
pub const CHANNEL_TEMPERATURE: u8 = 1;
/// Channel for the discrete humidity value.
pub const CHANNEL_HUMIDITY: u8 = 2;
/// Channel for the alarm indicator (1 raised, 0 silenced).
pub const CHANNEL_ALARM: u8 = 3;
/// Channel for the discrete light value.
pub const CHANNEL_LIGHT: u8 = 4;

/// Column header published when logging starts.
pub const RECORD_HEADER: &str = "RTC Time\tSys Time\tHumidity\tTemp\tLight\tDac out\tAlarm";

/// One sample cycle, paired with the alarm state decided for it.
#[derive(Debug, Format, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// The published reading
    pub reading: Reading,
    /// Run-time derived from the reading's snapshot; `None` when the
    /// snapshot was invalid
    pub run_time: Option<RunTime>,
    /// Whether the alarm was active after this cycle's decision
    pub alarm_active: bool,
}

impl TelemetryRecord {
    /// Render the fixed-width record line.
    ///
    /// Invalid clock values render as `--:--:--` placeholders so a bad RTC
    /// read is visible in the log rather than crashing the cycle.
    pub fn render(&self) -> String<RECORD_CAPACITY> {
        let mut line = String::new();
        // capacity is sized for the widest record, so the writes cannot fail
        let _ = match self.reading.clock {
            Some(clock) => write_clock(&mut line, &clock),
            None => line.push_str("--:--:--").map_err(|_| ()),
        };
        let _ = line.push('\t');
        let _ = match self.run_time {
            Some(run) => write_run_time(&mut line, &run),
            None => line.push_str("--:--:--").map_err(|_| ()),
        };
        let _ = write!(
            line,
            "\t{:.2} V\t{:.2} C\t{:4}\t{:.2}V\t{}",
            self.reading.humidity_volts,
            self.reading.temperature_celsius,
            self.reading.light_raw,
            self.reading.dac_output_volts,
            if self.alarm_active { '*' } else { ' ' },
        );
        line
    }
}

/// Write a wall-clock snapshot as `HH:MM:SS`.
fn write_clock(line: &mut String<RECORD_CAPACITY>, clock: &ClockSnapshot) -> Result<(), ()> {
    write!(
        line,
        "{:02}:{:02}:{:02}",
        clock.hours, clock.minutes, clock.seconds
    )
    .map_err(|_| ())
}

/// Write a run-time as `HH:MM:SS`; negative elapsed time keeps its sign on
/// the hours field.
fn write_run_time(line: &mut String<RECORD_CAPACITY>, run: &RunTime) -> Result<(), ()> {
    write!(
        line,
        "{:02}:{:02}:{:02}",
        run.hours, run.minutes, run.seconds
    )
    .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> Reading {
        Reading {
            clock: Some(ClockSnapshot::new(10, 30, 0)),
            humidity_volts: 1.65,
            temperature_celsius: 23.5,
            light_raw: 512,
            dac_output_volts: 0.83,
        }
    }

    #[test]
    fn renders_full_record() {
        let record = TelemetryRecord {
            reading: sample_reading(),
            run_time: Some(RunTime::from_seconds(3600)),
            alarm_active: false,
        };
        assert_eq!(
            record.render().as_str(),
            "10:30:00\t01:00:00\t1.65 V\t23.50 C\t 512\t0.83V\t "
        );
    }

    #[test]
    fn alarm_marker_is_an_asterisk() {
        let record = TelemetryRecord {
            reading: sample_reading(),
            run_time: Some(RunTime::from_seconds(0)),
            alarm_active: true,
        };
        assert!(record.render().as_str().ends_with("\t*"));
    }

    #[test]
    fn invalid_clock_renders_placeholders() {
        let mut reading = sample_reading();
        reading.clock = None;
        let record = TelemetryRecord {
            reading,
            run_time: None,
            alarm_active: false,
        };
        assert!(record.render().as_str().starts_with("--:--:--\t--:--:--\t"));
    }

    #[test]
    fn negative_run_time_keeps_its_sign() {
        let record = TelemetryRecord {
            reading: sample_reading(),
            run_time: Some(RunTime::from_seconds(-3600)),
            alarm_active: false,
        };
        let line = record.render();
        assert!(line.as_str().contains("\t-1:00:00\t"), "line: {line}");
    }

    #[test]
    fn light_column_is_four_wide() {
        let mut reading = sample_reading();
        reading.light_raw = 7;
        let record = TelemetryRecord {
            reading,
            run_time: Some(RunTime::from_seconds(0)),
            alarm_active: false,
        };
        assert!(record.render().as_str().contains("\t   7\t"));
    }
}
