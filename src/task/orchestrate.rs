//! # Orchestrate Tasks
//! Task to orchestrate the state transitions of the system.
//!
//! All mutations of the system state happen here, serialized by the event
//! channel, so the alarm decision for a reading and the telemetry record
//! built from it always belong to the same sample cycle.

use defmt::{info, warn, Debug2Format};

use crate::{
    clock::ClockSnapshot,
    event::{receive_event, Event, SampleFault},
    state::{AlarmDecision, SystemState, SYSTEM_STATE},
    task::{
        display::signal_display_update,
        sensors::{signal_sampler_halt, signal_sampler_resume, RTC_MUTEX},
        sound::{signal_sound_start, signal_sound_stop},
        uplink::{send_frame, TelemetryFrame},
    },
    telemetry::TelemetryRecord,
};

/// This task is responsible for the state transitions of the system. It
/// acts as the main task of the system: it receives events from the other
/// tasks and reacts to them by changing the state of the system.
#[embassy_executor::task]
pub async fn orchestrator(reference: ClockSnapshot) {
    info!("Orchestrate task starting");
    // initialize the system state and put it into the mutex
    {
        *(SYSTEM_STATE.lock().await) = Some(SystemState::new(reference));
    }

    loop {
        // receive the events, halting the task until an event is received
        let event = receive_event().await;

        // Lock the mutex to get a mutable reference to the system state
        let mut system_state_guard = SYSTEM_STATE.lock().await;
        let Some(system_state) = system_state_guard.as_mut() else {
            warn!("System state not initialized");
            continue;
        };

        // react to the events
        handle_event(event, system_state).await;

        drop(system_state_guard);
    }
}

/// Handles a single event by updating the system state and signaling
/// appropriate tasks.
async fn handle_event(event: Event, system_state: &mut SystemState) {
    match event {
        Event::StartStopButton => {
            handle_start_stop(system_state).await;
        }
        Event::SilenceButton => {
            handle_silence(system_state).await;
        }
        Event::IntervalButton => {
            let interval_secs = system_state.schedule.cycle();
            info!("Sample interval changed to {}s", interval_secs);
        }
        Event::ResetButton => {
            handle_reset(system_state).await;
        }
        Event::Sample(reading) => {
            handle_sample(reading, system_state).await;
        }
        Event::Fault(fault) => {
            handle_fault(fault).await;
        }
    }
}

/// Toggles logging and moves the sampler between its blocked and running
/// states.
async fn handle_start_stop(system_state: &mut SystemState) {
    system_state.logging_active = !system_state.logging_active;
    if system_state.logging_active {
        info!("Logging started");
        // the sink gets the column header before the first record
        send_frame(TelemetryFrame::Header).await;
        signal_sampler_resume();
    } else {
        info!("Logging stopped");
        signal_sampler_halt();
    }
    signal_display_update();
}

/// Clears an active alarm. The trigger history stays: a new breach still
/// honors the hysteresis window measured from the trigger.
async fn handle_silence(system_state: &mut SystemState) {
    if system_state.alarm.silence() {
        info!("Alarm silenced");
        signal_sound_stop();
        send_frame(TelemetryFrame::AlarmIndicator(false)).await;
        signal_display_update();
    }
}

/// Re-anchors the run-time reference at the current RTC time and forgets
/// the alarm trigger history.
async fn handle_reset(system_state: &mut SystemState) {
    let Some(snapshot) = read_rtc_snapshot().await else {
        warn!("Reference reset skipped, RTC unavailable");
        return;
    };
    system_state.run_clock.set_reference(snapshot);
    system_state.alarm.clear_history();
    system_state.last_run_time = None;
    info!(
        "Run-time reference reset to {:02}:{:02}:{:02}",
        snapshot.hours, snapshot.minutes, snapshot.seconds
    );
    // the sink starts a fresh block, like the console clear on the device
    send_frame(TelemetryFrame::Header).await;
    signal_display_update();
}

/// Handles one published reading: alarm decision, telemetry record and
/// display refresh, all against this cycle's state.
async fn handle_sample(reading: crate::state::Reading, system_state: &mut SystemState) {
    // run-time derived from the same snapshot the reading carries
    let run_time = reading
        .clock
        .map(|snapshot| system_state.run_clock.elapsed(&snapshot));

    if let Some(run) = run_time {
        if run.is_negative() {
            // surfaced, not corrected: the RTC moved behind the reference
            warn!("RTC behind the run-time reference: {}", run);
        }
        if system_state.alarm.evaluate(&reading, &run) == AlarmDecision::Raised {
            info!(
                "Alarm raised, control output {} V out of band",
                reading.dac_output_volts
            );
            signal_sound_start();
            send_frame(TelemetryFrame::AlarmIndicator(true)).await;
        }
    }

    let record = TelemetryRecord {
        reading: reading.clone(),
        run_time,
        alarm_active: system_state.alarm.is_active(),
    };
    send_frame(TelemetryFrame::Record(record)).await;

    // keep the cycle as last-known-good for the display
    system_state.last_reading = Some(reading);
    system_state.last_run_time = run_time;
    signal_display_update();
}

/// Surfaces a skipped cycle alongside the regular records.
async fn handle_fault(fault: SampleFault) {
    warn!("Sample cycle skipped: {}", fault);
    send_frame(TelemetryFrame::Warning(fault)).await;
}

/// Reads a fresh snapshot from the RTC, if it is reachable.
async fn read_rtc_snapshot() -> Option<ClockSnapshot> {
    let mut rtc_guard = RTC_MUTEX.lock().await;
    let rtc = rtc_guard.as_mut()?;
    match rtc.read_snapshot() {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("RTC read failed: {}", Debug2Format(&e));
            None
        }
    }
}
