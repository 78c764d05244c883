//! Events and system channel for sending and receiving events

use crate::state::Reading;
use defmt::Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// System event channel for sending and receiving events
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Event, EVENT_CHANNEL_CAPACITY> =
    Channel::new();

/// The capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Sends an event to the system channel
pub async fn send_event(event: Event) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Receives the next event from the system channel
pub async fn receive_event() -> Event {
    EVENT_CHANNEL.receiver().receive().await
}

/// The sensor or register whose read failed for one sample cycle.
#[derive(PartialEq, Eq, Debug, Format, Clone, Copy)]
pub enum SampleFault {
    /// The humidity ADC channel did not respond
    Humidity,
    /// The temperature ADC channel did not respond
    Temperature,
    /// The light ADC channel did not respond
    Light,
    /// The DAC readback ADC channel did not respond
    DacReadback,
    /// The RTC could not be read over the bus
    Clock,
}

impl SampleFault {
    /// Short name of the failed source for telemetry warning lines.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Humidity => "humidity channel",
            Self::Temperature => "temperature channel",
            Self::Light => "light channel",
            Self::DacReadback => "dac readback channel",
            Self::Clock => "rtc",
        }
    }
}

/// The event type used in the system, representing various system events
#[derive(PartialEq, Debug, Format, Clone)]
pub enum Event {
    /// The start/stop button was pressed: toggle logging
    StartStopButton,
    /// The silence button was pressed: clear an active alarm
    SilenceButton,
    /// The interval button was pressed: cycle the sampling interval
    IntervalButton,
    /// The reset button was pressed: re-anchor the run-time reference and
    /// forget the alarm trigger history
    ResetButton,
    /// The sampler published a converted reading for this cycle
    Sample(Reading),
    /// The sampler skipped a cycle after a failed peripheral access
    Fault(SampleFault),
}
