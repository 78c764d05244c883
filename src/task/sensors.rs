//! # Sensor sampler task
//! This module contains the periodic sampling loop: read the four analog
//! channels, convert them to physical units, tag the result with the
//! current RTC snapshot, latch the derived control output onto the DAC and
//! publish the reading to the orchestrator.
//!
//! The loop blocks on a resume signal while logging is inactive and checks
//! a halt signal at its sleep point, so stopping takes effect without
//! polling. A failed peripheral access skips the cycle's publication and
//! raises a fault event instead; the loop itself keeps running.

use crate::drivers::mcp3008::{AdcChannel, Mcp3008, FULL_SCALE};
use crate::drivers::mcp4812::Mcp4812;
use crate::drivers::mcp7940n::{Mcp7940n, RtcError};
use crate::event::{send_event, Event, SampleFault};
use crate::state::{Reading, SYSTEM_STATE};
use core::cell::RefCell;
use defmt::{debug, info, warn, Debug2Format};
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::peripherals::{I2C1, SPI0};
use embassy_rp::spi::{self, Spi};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::blocking_mutex::NoopMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};

use super::resources::ConverterResources;

/// ADC reference rail in volts.
const ADC_REFERENCE_VOLTS: f32 = 3.3;
/// Temperature sensor output at zero degrees, in volts.
const TEMP_OFFSET_VOLTS: f32 = 0.5;
/// Temperature sensor slope in volts per degree Celsius.
const TEMP_VOLTS_PER_DEGREE: f32 = 0.010;

/// Type alias for the RTC mutex.
type RtcType = Mutex<CriticalSectionRawMutex, Option<Mcp7940n<I2c<'static, I2C1, i2c::Blocking>>>>;
/// The RTC mutex, which is used to access the clock chip from startup, the
/// sampler and the orchestrator's reset handling.
pub static RTC_MUTEX: RtcType = Mutex::new(None);

/// Signal that resumes a sampler blocked on inactive logging
static SAMPLER_RESUME_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signal that cuts the inter-cycle sleep short when logging stops
static SAMPLER_HALT_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signals the sampler to resume after logging was started
pub fn signal_sampler_resume() {
    SAMPLER_RESUME_SIGNAL.signal(());
}

/// Signals the sampler to halt after logging was stopped
pub fn signal_sampler_halt() {
    SAMPLER_HALT_SIGNAL.signal(());
}

/// The SPI device handed to each converter driver on the shared bus.
type ConverterDevice<'a> =
    SpiDevice<'a, NoopRawMutex, Spi<'static, SPI0, spi::Blocking>, Output<'static>>;

/// Convert a raw humidity count to sensor output volts.
fn humidity_volts(raw: u16) -> f32 {
    f32::from(raw) / f32::from(FULL_SCALE) * ADC_REFERENCE_VOLTS
}

/// Convert a raw temperature count to degrees Celsius using the fixed
/// sensor calibration.
fn temperature_celsius(raw: u16) -> f32 {
    (f32::from(raw) * ADC_REFERENCE_VOLTS / 1024.0 - TEMP_OFFSET_VOLTS) / TEMP_VOLTS_PER_DEGREE
}

/// Derive the control output in volts from the light count and the
/// humidity voltage.
fn dac_output_volts(light_raw: u16, humidity_volts: f32) -> f32 {
    f32::from(light_raw) / f32::from(FULL_SCALE) * humidity_volts
}

/// Scale a control voltage back to DAC counts.
fn control_counts(volts: f32) -> u16 {
    (volts / ADC_REFERENCE_VOLTS * f32::from(FULL_SCALE)) as u16
}

#[embassy_executor::task]
pub async fn sampler(r: ConverterResources) {
    info!("Sampler task started");

    let mut spi_config = spi::Config::default();
    spi_config.frequency = 1_000_000;
    let spi = Spi::new_blocking(r.spi, r.clk_pin, r.mosi_pin, r.miso_pin, spi_config);
    let spi_bus: NoopMutex<RefCell<Spi<'static, SPI0, spi::Blocking>>> =
        NoopMutex::new(RefCell::new(spi));

    let mut adc = Mcp3008::new(SpiDevice::new(
        &spi_bus,
        Output::new(r.adc_cs_pin, Level::High),
    ));
    let mut dac = Mcp4812::new(SpiDevice::new(
        &spi_bus,
        Output::new(r.dac_cs_pin, Level::High),
    ));

    loop {
        // clear a halt left over from the stop press that got us here
        if SAMPLER_HALT_SIGNAL.signaled() {
            SAMPLER_HALT_SIGNAL.reset();
        }

        // block on the resume signal while logging is inactive
        while !logging_active().await {
            SAMPLER_RESUME_SIGNAL.wait().await;
        }

        match take_sample(&mut adc, &mut dac).await {
            Ok(reading) => send_event(Event::Sample(reading)).await,
            Err(fault) => send_event(Event::Fault(fault)).await,
        }

        // sleep out the configured interval, waking early when logging stops
        let interval = current_interval().await;
        if let Either::Second(()) = select(Timer::after(interval), SAMPLER_HALT_SIGNAL.wait()).await
        {
            continue;
        }
    }
}

/// Run one full sample cycle.
///
/// A bus failure on any channel aborts the cycle with the fault naming the
/// channel; an undecodable RTC value only invalidates the reading's clock.
async fn take_sample(
    adc: &mut Mcp3008<ConverterDevice<'_>>,
    dac: &mut Mcp4812<ConverterDevice<'_>>,
) -> Result<Reading, SampleFault> {
    let raw_humidity = read_counts(adc, AdcChannel::Humidity, SampleFault::Humidity)?;
    let raw_temperature = read_counts(adc, AdcChannel::Temperature, SampleFault::Temperature)?;
    let raw_light = read_counts(adc, AdcChannel::Light, SampleFault::Light)?;
    let raw_loopback = read_counts(adc, AdcChannel::DacReadback, SampleFault::DacReadback)?;
    debug!("dac loopback at {} counts", raw_loopback);

    let clock = read_clock().await?;

    let humidity = humidity_volts(raw_humidity);
    let reading = Reading {
        clock,
        humidity_volts: humidity,
        temperature_celsius: temperature_celsius(raw_temperature),
        light_raw: raw_light,
        dac_output_volts: dac_output_volts(raw_light, humidity),
    };

    // latch the derived control output; output is best effort and must not
    // suppress the reading
    if let Err(e) = dac.write_output(control_counts(reading.dac_output_volts)) {
        warn!("DAC write failed: {}", Debug2Format(&e));
    }

    Ok(reading)
}

/// Read one ADC channel, mapping a bus failure to the cycle fault.
fn read_counts(
    adc: &mut Mcp3008<ConverterDevice<'_>>,
    channel: AdcChannel,
    fault: SampleFault,
) -> Result<u16, SampleFault> {
    adc.read_channel(channel).map_err(|e| {
        warn!("ADC read failed on {}: {}", channel, Debug2Format(&e));
        fault
    })
}

/// Read the RTC snapshot for this cycle.
///
/// `Ok(None)` marks a cycle whose registers held undecodable BCD: the
/// reading is still published, but without a clock it is non-actionable
/// for the alarm engine.
async fn read_clock() -> Result<Option<crate::clock::ClockSnapshot>, SampleFault> {
    let mut rtc_guard = RTC_MUTEX.lock().await;
    let Some(rtc) = rtc_guard.as_mut() else {
        warn!("RTC not initialized");
        return Err(SampleFault::Clock);
    };
    match rtc.read_snapshot() {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(RtcError::Clock(e)) => {
            warn!("RTC registers undecodable: {}", e);
            Ok(None)
        }
        Err(RtcError::Bus(e)) => {
            warn!("RTC read failed: {}", Debug2Format(&e));
            Err(SampleFault::Clock)
        }
    }
}

/// Whether logging is currently active.
async fn logging_active() -> bool {
    let guard = SYSTEM_STATE.lock().await;
    guard.as_ref().is_some_and(|state| state.logging_active)
}

/// The currently configured sampling interval.
async fn current_interval() -> Duration {
    let guard = SYSTEM_STATE.lock().await;
    guard
        .as_ref()
        .map_or(Duration::from_secs(1), |state| state.schedule.interval())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humidity_spans_the_reference_rail() {
        assert!((humidity_volts(0) - 0.0).abs() < 1e-6);
        assert!((humidity_volts(1023) - 3.3).abs() < 1e-6);
    }

    #[test]
    fn temperature_conversion_matches_calibration() {
        // 512 counts -> 1.65 V -> (1.65 - 0.5) / 0.010
        let celsius = temperature_celsius(512);
        assert!((celsius - 115.0).abs() < 0.05, "got {celsius}");
    }

    #[test]
    fn dac_output_scales_humidity_by_light() {
        let humidity = humidity_volts(1023);
        assert!((dac_output_volts(1023, humidity) - 3.3).abs() < 1e-5);
        assert!((dac_output_volts(0, humidity) - 0.0).abs() < 1e-6);
        assert!((dac_output_volts(511, 2.0) - 0.999).abs() < 0.001);
    }

    #[test]
    fn control_counts_round_trip_the_rail() {
        assert_eq!(control_counts(0.0), 0);
        assert_eq!(control_counts(3.3), 1023);
        assert_eq!(control_counts(1.65), 511);
    }
}
