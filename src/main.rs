// we are in an environment with constrained resources, so we do not use the standard library and we define a different entry point.
#![no_std]
#![no_main]

use defmt::{info, unwrap, Debug2Format};
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::i2c::{Config as I2cConfig, I2c};
use {defmt_rtt as _, panic_probe as _}; // global logger and panic handler

use crate::clock::{ClockSnapshot, TIMEZONE_OFFSET_HOURS};
use crate::drivers::mcp7940n::{Mcp7940n, RtcError};
use crate::event::Event;
use crate::task::buttons::{button_handler, Button};
use crate::task::resources::*;
use crate::task::sensors::RTC_MUTEX;
use crate::task::{display, orchestrate, sensors, sound, uplink, watchdog};

mod clock;
mod drivers;
mod event;
mod state;
mod task;
mod telemetry;

// Entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Program start");

    // Initialize the peripherals for the RP2040 and split them into the
    // per-task resource groups
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    // Bring up the external RTC and establish the run-time reference. A
    // monitor without its clock cannot derive run-time or alarm recency,
    // so a failure here is fatal.
    let reference = match init_run_clock(r.rtc).await {
        Ok(snapshot) => snapshot,
        Err(e) => defmt::panic!("RTC bringup failed: {}", Debug2Format(&e)),
    };
    info!(
        "System start time {:02}:{:02}:{:02}",
        reference.hours, reference.minutes, reference.seconds
    );

    // the orchestrator owns the system state; everything else talks to it
    // through the event channel
    spawner.spawn(unwrap!(orchestrate::orchestrator(reference)));

    info!("init buttons");
    spawner.spawn(unwrap!(button_handler(
        Input::new(r.btn_start_stop.button_pin, Pull::Down),
        Event::StartStopButton,
        Button::StartStop,
    )));
    spawner.spawn(unwrap!(button_handler(
        Input::new(r.btn_silence.button_pin, Pull::Down),
        Event::SilenceButton,
        Button::Silence,
    )));
    spawner.spawn(unwrap!(button_handler(
        Input::new(r.btn_interval.button_pin, Pull::Down),
        Event::IntervalButton,
        Button::Interval,
    )));
    spawner.spawn(unwrap!(button_handler(
        Input::new(r.btn_reset.button_pin, Pull::Down),
        Event::ResetButton,
        Button::Reset,
    )));

    spawner.spawn(unwrap!(sensors::sampler(r.converters)));
    spawner.spawn(unwrap!(sound::sounder(r.buzzer)));
    spawner.spawn(unwrap!(display::display(r.display)));
    spawner.spawn(unwrap!(uplink::uplink(r.uplink)));
    spawner.spawn(unwrap!(watchdog::watchdog_task(r.watchdog.watchdog)));

    info!("---SETUP COMPLETE---");
}

/// Bring up the RTC: make sure its oscillator runs, apply the timezone
/// offset to the kept time, write the adjusted time back and park the
/// driver in the shared mutex. Returns the run-time reference snapshot.
async fn init_run_clock(
    r: RtcResources,
) -> Result<ClockSnapshot, RtcError<embassy_rp::i2c::Error>> {
    let i2c = I2c::new_blocking(r.i2c1, r.scl_pin, r.sda_pin, I2cConfig::default());
    let mut rtc = Mcp7940n::new(i2c);

    rtc.start_oscillator()?;
    let reference = rtc
        .read_snapshot()?
        .with_timezone_offset(TIMEZONE_OFFSET_HOURS);
    rtc.write_snapshot(&reference)?;

    *(RTC_MUTEX.lock().await) = Some(rtc);
    Ok(reference)
}
