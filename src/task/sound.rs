//! # Sound task
//! This module contains the task that pulses the buzzer while the alarm is
//! active and drives the alarm indicator LED alongside it.
//!
//! The task blocks on the start signal while the alarm is idle and checks
//! the stop signal inside every pulse hold, so a silence press is honored
//! within one pulse period.

use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use super::resources::BuzzerResources;

/// Buzzer tone frequency while the alarm sounds.
const BUZZER_TONE_HZ: u32 = 2200;

/// Length of one tone or silence phase of the pulse pattern.
const PULSE_HOLD: Duration = Duration::from_millis(40);

/// Signal for starting the alarm sound
static SOUND_START_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signal for stopping the alarm sound
static SOUND_STOP_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signals the sounder to start pulsing
pub fn signal_sound_start() {
    SOUND_START_SIGNAL.signal(());
}

/// Signals the sounder to stop pulsing
pub fn signal_sound_stop() {
    SOUND_STOP_SIGNAL.signal(());
}

#[embassy_executor::task]
pub async fn sounder(r: BuzzerResources) {
    info!("Sounder task started");

    let tone = tone_config();
    let mut silent = tone.clone();
    silent.compare_a = 0;

    let mut pwm = Pwm::new_output_a(r.pwm_slice, r.buzzer_pin, silent.clone());
    let mut indicator = Output::new(r.indicator_pin, Level::Low);

    // power-on chirp so a wiring fault is audible before the first alarm
    pwm.set_config(&tone);
    Timer::after(PULSE_HOLD).await;
    pwm.set_config(&silent);
    info!("Buzzer test complete");

    loop {
        // wait for the signal to start sounding
        SOUND_START_SIGNAL.wait().await;
        // a silence press from before this activation is stale
        SOUND_STOP_SIGNAL.reset();
        indicator.set_high();

        'pulsing: loop {
            pwm.set_config(&tone);
            if silenced_during(PULSE_HOLD).await {
                break 'pulsing;
            }
            pwm.set_config(&silent);
            if silenced_during(PULSE_HOLD).await {
                break 'pulsing;
            }
        }

        pwm.set_config(&silent);
        indicator.set_low();
        info!("Sounder idle");
    }
}

/// Hold the current buzzer phase, cutting it short if the stop signal
/// arrives. Returns true when the alarm was silenced.
async fn silenced_during(hold: Duration) -> bool {
    matches!(
        select(Timer::after(hold), SOUND_STOP_SIGNAL.wait()).await,
        Either::Second(())
    )
}

/// PWM configuration producing a 50% duty square wave at the buzzer tone.
fn tone_config() -> PwmConfig {
    let mut config = PwmConfig::default();
    let top = (embassy_rp::clocks::clk_sys_freq() / BUZZER_TONE_HZ) as u16;
    config.top = top;
    config.compare_a = top / 2;
    config
}
