//! # Telemetry uplink task
//! This module contains the task that drains telemetry frames onto the
//! serial uplink. Every frame is prefixed with its channel number so the
//! remote side can route the composite record line and the discrete values
//! separately; whatever transport sits behind the UART is not this task's
//! concern.

use crate::event::SampleFault;
use crate::telemetry::{
    TelemetryRecord, CHANNEL_ALARM, CHANNEL_HUMIDITY, CHANNEL_LIGHT, CHANNEL_RECORD,
    CHANNEL_TEMPERATURE, RECORD_HEADER,
};
use core::fmt::Write as _;
use defmt::{info, warn, Debug2Format};
use embassy_rp::uart::{BufferedUart, Config as UartConfig};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_io_async::Write as _;
use heapless::String;
use static_cell::StaticCell;

use super::resources::{Irqs, UplinkResources};

/// One frame bound for the uplink.
#[derive(Debug, defmt::Format, Clone, PartialEq)]
pub enum TelemetryFrame {
    /// The column header, published when logging starts and after a reset
    Header,
    /// One sample cycle: the record line plus its discrete values
    Record(TelemetryRecord),
    /// Alarm indicator transition (raised or silenced)
    AlarmIndicator(bool),
    /// A skipped sample cycle, surfaced alongside the records
    Warning(SampleFault),
}

/// Frames queued for the uplink task.
static UPLINK_CHANNEL: Channel<CriticalSectionRawMutex, TelemetryFrame, 4> = Channel::new();

/// Queue a frame for the uplink.
pub async fn send_frame(frame: TelemetryFrame) {
    UPLINK_CHANNEL.sender().send(frame).await;
}

/// Longest framed line the uplink writes at once.
const FRAME_CAPACITY: usize = 96;

#[embassy_executor::task]
pub async fn uplink(r: UplinkResources) {
    info!("Uplink task started");

    static TX_BUFFER: StaticCell<[u8; 256]> = StaticCell::new();
    static RX_BUFFER: StaticCell<[u8; 16]> = StaticCell::new();
    let mut config = UartConfig::default();
    config.baudrate = 115_200;
    let mut uart = BufferedUart::new(
        r.uart,
        r.tx_pin,
        r.rx_pin,
        Irqs,
        TX_BUFFER.init([0; 256]),
        RX_BUFFER.init([0; 16]),
        config,
    );

    loop {
        let frame = UPLINK_CHANNEL.receiver().receive().await;
        match frame {
            TelemetryFrame::Header => {
                publish_line(&mut uart, CHANNEL_RECORD, RECORD_HEADER).await;
            }
            TelemetryFrame::Record(record) => {
                publish_record(&mut uart, &record).await;
            }
            TelemetryFrame::AlarmIndicator(raised) => {
                publish_line(&mut uart, CHANNEL_ALARM, if raised { "1" } else { "0" }).await;
            }
            TelemetryFrame::Warning(fault) => {
                let mut line: String<48> = String::new();
                let _ = write!(line, "! sample skipped: {}", fault.description());
                publish_line(&mut uart, CHANNEL_RECORD, line.as_str()).await;
            }
        }
    }
}

/// Publish a record line followed by its discrete channel values.
async fn publish_record(uart: &mut BufferedUart, record: &TelemetryRecord) {
    publish_line(uart, CHANNEL_RECORD, record.render().as_str()).await;

    let mut value: String<16> = String::new();
    let _ = write!(value, "{:.2}", record.reading.temperature_celsius);
    publish_line(uart, CHANNEL_TEMPERATURE, value.as_str()).await;

    value.clear();
    let _ = write!(value, "{:.2}", record.reading.humidity_volts);
    publish_line(uart, CHANNEL_HUMIDITY, value.as_str()).await;

    value.clear();
    let _ = write!(value, "{}", record.reading.light_raw);
    publish_line(uart, CHANNEL_LIGHT, value.as_str()).await;
}

/// Frame one payload with its channel prefix and write it out.
async fn publish_line(uart: &mut BufferedUart, channel: u8, payload: &str) {
    let mut framed: String<FRAME_CAPACITY> = String::new();
    if write!(framed, "V{channel} {payload}\r\n").is_err() {
        warn!("uplink frame too long, dropped");
        return;
    }
    if let Err(e) = uart.write_all(framed.as_bytes()).await {
        warn!("uplink write failed: {}", Debug2Format(&e));
    }
}
