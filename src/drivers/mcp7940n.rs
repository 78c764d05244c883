//! # MCP7940N RTC driver
//! Register access for the battery-backed I2C real-time clock. The
//! time-keeping registers hold BCD; all decoding and encoding goes through
//! the codec in [`crate::clock`] so an undecodable register surfaces as an
//! error instead of a silently wrong snapshot.

use crate::clock::{decode_bcd, encode_decimal, ClockError, ClockSnapshot};
use embedded_hal::i2c::I2c;

/// Seven-bit bus address of the clock.
pub const ADDRESS: u8 = 0x6F;

/// Seconds register, also holds the oscillator-start bit.
const REG_SECONDS: u8 = 0x00;

/// Oscillator-start bit in the seconds register.
const ST_BIT: u8 = 0x80;

/// Errors from the clock chip.
#[derive(Debug, PartialEq, Eq)]
pub enum RtcError<E> {
    /// The I2C transaction failed
    Bus(E),
    /// A time register held a value outside the BCD domain
    Clock(ClockError),
}

impl<E> From<ClockError> for RtcError<E> {
    fn from(err: ClockError) -> Self {
        Self::Clock(err)
    }
}

/// Build the burst-write frame for the three time registers, seconds
/// first. The oscillator-start bit rides on the seconds byte so a time
/// write never stops the clock.
fn time_register_frame<E>(snapshot: &ClockSnapshot) -> Result<[u8; 4], RtcError<E>> {
    Ok([
        REG_SECONDS,
        encode_decimal(snapshot.seconds)? | ST_BIT,
        encode_decimal(snapshot.minutes)?,
        encode_decimal(snapshot.hours)?,
    ])
}

/// MCP7940N behind any `embedded-hal` I2C bus.
pub struct Mcp7940n<I2C> {
    /// The bus the clock is wired to
    i2c: I2C,
}

impl<I2C: I2c> Mcp7940n<I2C> {
    /// Wrap the bus; no traffic happens until the first call.
    pub const fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Make sure the oscillator is running, without disturbing the kept
    /// time. A clock coming up from a drained battery has the bit clear.
    pub fn start_oscillator(&mut self) -> Result<(), RtcError<I2C::Error>> {
        let mut seconds = [0u8];
        self.i2c
            .write_read(ADDRESS, &[REG_SECONDS], &mut seconds)
            .map_err(RtcError::Bus)?;
        if seconds[0] & ST_BIT == 0 {
            self.i2c
                .write(ADDRESS, &[REG_SECONDS, seconds[0] | ST_BIT])
                .map_err(RtcError::Bus)?;
        }
        Ok(())
    }

    /// Decode the current time registers into a snapshot.
    pub fn read_snapshot(&mut self) -> Result<ClockSnapshot, RtcError<I2C::Error>> {
        let mut regs = [0u8; 3];
        self.i2c
            .write_read(ADDRESS, &[REG_SECONDS], &mut regs)
            .map_err(RtcError::Bus)?;
        Ok(ClockSnapshot {
            seconds: decode_bcd(regs[0])?,
            minutes: decode_bcd(regs[1])?,
            hours: decode_bcd(regs[2])?,
        })
    }

    /// Write a snapshot back into the time registers, BCD-encoded.
    pub fn write_snapshot(&mut self, snapshot: &ClockSnapshot) -> Result<(), RtcError<I2C::Error>> {
        let frame = time_register_frame(snapshot)?;
        self.i2c.write(ADDRESS, &frame).map_err(RtcError::Bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_frame_is_bcd_with_oscillator_bit() {
        let snapshot = ClockSnapshot::new(14, 37, 52);
        let frame: [u8; 4] = time_register_frame::<()>(&snapshot).unwrap();
        assert_eq!(frame, [REG_SECONDS, 0x80 | 0x52, 0x37, 0x14]);
    }

    #[test]
    fn write_frame_rejects_invalid_snapshot() {
        // Snapshots are validated at construction in production code; a
        // corrupted one must still be refused at the register edge.
        let snapshot = ClockSnapshot {
            hours: 10,
            minutes: 60,
            seconds: 0,
        };
        assert_eq!(
            time_register_frame::<()>(&snapshot),
            Err(RtcError::Clock(ClockError::OutOfDomain(60)))
        );
    }
}
