//! Bit-banged SPI channel
//!
//! AVR serial programming runs SPI mode 0: data is set up while the clock
//! is low and sampled by both sides on the rising edge, most significant
//! bit first. The clock idles low.
//!
//! The half period is a hard lower bound taken from the device datasheet
//! (the target must see at least four of its own clock cycles per SCK
//! phase). Shortening it makes the target miss transitions.

use super::{Level, LineDriver, Pin};
use crate::isp::opcodes::{BYTE_GAP_US, HALF_PERIOD_US};

/// The three data lines of one programming port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiLines {
    /// Clock
    pub sck: Pin,
    /// Programmer to device
    pub mosi: Pin,
    /// Device to programmer
    pub miso: Pin,
}

/// Exchange one byte (MSB first)
///
/// A stuck line has no way to report itself here; it shows up as wrong
/// bits that later verification catches.
pub fn exchange<D: LineDriver + ?Sized>(driver: &mut D, lines: &SpiLines, out: u8) -> u8 {
    let mut input = 0u8;
    for i in (0..8).rev() {
        let mask = 1u8 << i;
        // Setup edge. Already low on the first bit.
        driver.drive(lines.sck, Level::Low);
        driver.drive(lines.mosi, Level::from_bit(out & mask != 0));
        driver.delay_us(HALF_PERIOD_US);
        // Sample edge
        driver.drive(lines.sck, Level::High);
        if driver.read(lines.miso).is_high() {
            input |= mask;
        }
        driver.delay_us(HALF_PERIOD_US);
    }
    driver.drive(lines.sck, Level::Low);
    driver.delay_us(BYTE_GAP_US);
    input
}

/// Exchange a full 4-byte instruction
pub fn transact<D: LineDriver + ?Sized>(
    driver: &mut D,
    lines: &SpiLines,
    bytes: &[u8; 4],
) -> [u8; 4] {
    let mut response = [0u8; 4];
    for (slot, &byte) in response.iter_mut().zip(bytes.iter()) {
        *slot = exchange(driver, lines, byte);
    }
    response
}
