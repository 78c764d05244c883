//! # Display task
//! This module contains the task that shows the live state on the OLED
//! display: the last paired reading and run-time, the sampling interval
//! and the alarm state.
//!
//! The task waits on an update signal from the orchestrator, then renders
//! from the system state. Because the orchestrator writes the reading, the
//! run-time and the alarm decision under one lock, the display can never
//! show a reading next to a different cycle's alarm state.

use crate::state::{SystemState, SYSTEM_STATE};
use core::fmt::Write as _;
use defmt::{error, info, warn, Debug2Format};
use embassy_rp::i2c::{Config as I2cConfig, I2c};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X13, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;
use ssd1306_async::{prelude::*, I2CDisplayInterface, Ssd1306};

use super::resources::{DisplayResources, Irqs};

/// Signal that the display must be redrawn from the system state
static DISPLAY_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signals the display task to redraw
pub fn signal_display_update() {
    DISPLAY_SIGNAL.signal(());
}

/// Capacity of one rendered display line (21 visible columns plus slack).
const LINE_CAPACITY: usize = 24;

#[embassy_executor::task]
pub async fn display(r: DisplayResources) {
    info!("Display task started");

    let mut config = I2cConfig::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(r.i2c0, r.scl, r.sda, Irqs, config);

    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    if let Err(e) = display.init().await {
        error!("Failed to initialize display: {}", Debug2Format(&e));
        return;
    }
    let _ = display.set_brightness(Brightness::DIM).await;

    let text_style = MonoTextStyleBuilder::new()
        .font(&FONT_6X13)
        .text_color(BinaryColor::On)
        .build();

    loop {
        // Wait for a signal to update the display
        DISPLAY_SIGNAL.wait().await;

        // get the state of the system out of the mutex and quickly drop the mutex
        let state_guard = SYSTEM_STATE.lock().await;
        let Some(state) = state_guard.clone() else {
            error!("System state not initialized");
            continue;
        };
        drop(state_guard);

        display.clear();

        let lines = [
            clock_line(&state),
            sensor_line(&state),
            output_line(&state),
            status_line(&state),
        ];
        for (row, line) in lines.iter().enumerate() {
            Text::with_baseline(
                line,
                Point::new(0, row as i32 * 16),
                text_style,
                Baseline::Top,
            )
            .draw(&mut display)
            .unwrap();
        }

        // finally: send the display buffer to the display
        if let Err(e) = display.flush().await {
            warn!("Display flush failed: {}", Debug2Format(&e));
        }
    }
}

/// Wall clock and run-time of the last cycle.
fn clock_line(state: &SystemState) -> String<LINE_CAPACITY> {
    let mut line = String::new();
    match state.last_reading.as_ref().and_then(|r| r.clock) {
        Some(clock) => {
            let _ = write!(
                line,
                "{:02}:{:02}:{:02}",
                clock.hours, clock.minutes, clock.seconds
            );
        }
        None => {
            let _ = line.push_str("--:--:--");
        }
    }
    match state.last_run_time {
        Some(run) => {
            let _ = write!(
                line,
                " r{:02}:{:02}:{:02}",
                run.hours, run.minutes, run.seconds
            );
        }
        None => {
            let _ = line.push_str(" r--:--:--");
        }
    }
    line
}

/// Humidity and temperature of the last cycle.
fn sensor_line(state: &SystemState) -> String<LINE_CAPACITY> {
    let mut line = String::new();
    match state.last_reading.as_ref() {
        Some(reading) => {
            let _ = write!(
                line,
                "{:.2}V {:.1}C",
                reading.humidity_volts, reading.temperature_celsius
            );
        }
        None => {
            let _ = line.push_str("no reading yet");
        }
    }
    line
}

/// Light level and derived control output of the last cycle.
fn output_line(state: &SystemState) -> String<LINE_CAPACITY> {
    let mut line = String::new();
    if let Some(reading) = state.last_reading.as_ref() {
        let _ = write!(
            line,
            "L{:4} dac {:.2}V",
            reading.light_raw, reading.dac_output_volts
        );
    }
    line
}

/// Alarm and logging status.
fn status_line(state: &SystemState) -> String<LINE_CAPACITY> {
    let mut line = String::new();
    if state.alarm.is_active() {
        let _ = line.push_str("* ALARM *");
    } else if state.logging_active {
        let _ = write!(
            line,
            "logging, every {}s",
            state.schedule.interval().as_secs()
        );
    } else {
        let _ = line.push_str("logging stopped");
    }
    line
}
