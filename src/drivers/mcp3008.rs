//! # MCP3008 ADC driver
//! Minimal single-shot driver for the 10-bit, 8-channel SPI ADC that
//! carries the analog sensors. One full conversion is a three byte
//! transfer: start bit, single-ended channel select, and two clock bytes
//! during which the conversion result shifts out.

use embedded_hal::spi::SpiDevice;

/// The analog channels as wired on the sensor board.
#[derive(Debug, defmt::Format, Clone, Copy, PartialEq, Eq)]
pub enum AdcChannel {
    /// Light-dependent resistor divider
    Light = 0,
    /// Temperature sensor output
    Temperature = 1,
    /// DAC output loopback, read for diagnostics
    DacReadback = 2,
    /// Humidity sensor output
    Humidity = 7,
}

/// Full-scale ADC count (10 bit).
pub const FULL_SCALE: u16 = 1023;

/// Build the three byte command frame for a single-ended conversion.
const fn command_frame(channel: u8) -> [u8; 3] {
    // start bit, then single-ended mode + channel in the top nibble
    [0x01, 0x80 | (channel << 4), 0x00]
}

/// MCP3008 on a shared SPI bus.
pub struct Mcp3008<SPI> {
    /// The chip-selected SPI device for this ADC
    spi: SPI,
}

impl<SPI: SpiDevice> Mcp3008<SPI> {
    /// Wrap an SPI device whose chip select addresses the ADC.
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Run one conversion and return the 10-bit count.
    pub fn read_channel(&mut self, channel: AdcChannel) -> Result<u16, SPI::Error> {
        let tx = command_frame(channel as u8);
        let mut rx = [0u8; 3];
        self.spi.transfer(&mut rx, &tx)?;
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frame_selects_channel() {
        assert_eq!(command_frame(0), [0x01, 0x80, 0x00]);
        assert_eq!(command_frame(1), [0x01, 0x90, 0x00]);
        assert_eq!(command_frame(7), [0x01, 0xF0, 0x00]);
    }

    #[test]
    fn channel_numbers_match_board_wiring() {
        assert_eq!(AdcChannel::Light as u8, 0);
        assert_eq!(AdcChannel::Temperature as u8, 1);
        assert_eq!(AdcChannel::DacReadback as u8, 2);
        assert_eq!(AdcChannel::Humidity as u8, 7);
    }
}
