//! Watchdog task to reset the system if the executor stops running
//!
//! The sampler and sounder legitimately block for long stretches (logging
//! stopped, alarm idle), so per-task health tracking would report them as
//! hung. The watchdog therefore only guards executor liveness: it starts
//! the hardware watchdog and keeps feeding it from its own task; if the
//! executor locks up, the feed stops and the chip resets.

use defmt::info;
use embassy_rp::{peripherals::WATCHDOG, watchdog::Watchdog, Peri};
use embassy_time::{Duration, Timer};

/// Hardware watchdog timeout (the RP2040 maximum is just over 8 seconds)
const HARDWARE_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(8000);

/// How often the watchdog is fed
const FEED_INTERVAL: Duration = Duration::from_secs(2);

/// Watchdog task that keeps the hardware watchdog fed while the executor
/// is alive.
#[embassy_executor::task]
pub async fn watchdog_task(watchdog: Peri<'static, WATCHDOG>) {
    info!(
        "Watchdog started - timeout {}ms, fed every {}s",
        HARDWARE_WATCHDOG_TIMEOUT.as_millis(),
        FEED_INTERVAL.as_secs()
    );

    let mut wd = Watchdog::new(watchdog);
    wd.pause_on_debug(true); // a halted debug session is not a hang
    wd.start(HARDWARE_WATCHDOG_TIMEOUT);

    loop {
        Timer::after(FEED_INTERVAL).await;
        wd.feed();
    }
}
