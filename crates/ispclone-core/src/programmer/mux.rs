//! Port multiplexer
//!
//! Two programming ports share one bit-banged channel. [`BitbangIsp`]
//! rebinds the channel's four logical lines to whichever port is in focus
//! and leaves the other port alone.

use super::bitbang::{self, SpiLines};
use super::{Direction, IspMaster, Level, LineDriver, Pin, TriggerLine};
use crate::chip::Port;
use crate::isp::opcodes::{RESET_PULSE_US, RESET_SETTLE_MS};
use crate::isp::{IspCommand, ECHO_BYTE};

/// The four physical lines making up one programming port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
    /// Target RESET
    pub reset: Pin,
    /// Programmer to device
    pub mosi: Pin,
    /// Device to programmer
    pub miso: Pin,
    /// Clock
    pub sck: Pin,
}

impl PortBinding {
    /// Create a binding from pin numbers
    pub const fn new(reset: u8, mosi: u8, miso: u8, sck: u8) -> Self {
        Self {
            reset: Pin(reset),
            mosi: Pin(mosi),
            miso: Pin(miso),
            sck: Pin(sck),
        }
    }

    fn spi_lines(&self) -> SpiLines {
        SpiLines {
            sck: self.sck,
            mosi: self.mosi,
            miso: self.miso,
        }
    }
}

/// Socket port on PA0..PA3
pub const DEFAULT_SOCKET_BINDING: PortBinding = PortBinding::new(0, 1, 2, 3);
/// Bus port on PA4..PA7
pub const DEFAULT_BUS_BINDING: PortBinding = PortBinding::new(4, 5, 6, 7);

/// Bit-banged ISP master over two ports
pub struct BitbangIsp<D> {
    driver: D,
    socket: PortBinding,
    bus: PortBinding,
    focus: Port,
}

impl<D: LineDriver> BitbangIsp<D> {
    /// Create a master over `driver`, focused on the socket port
    pub fn new(driver: D, socket: PortBinding, bus: PortBinding) -> Self {
        let mut isp = Self {
            driver,
            socket,
            bus,
            focus: Port::Socket,
        };
        isp.reset_interface();
        isp
    }

    /// Lines bound to `port`
    pub fn binding(&self, port: Port) -> &PortBinding {
        match port {
            Port::Socket => &self.socket,
            Port::Bus => &self.bus,
        }
    }

    /// Borrow the line driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutably borrow the line driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Consume the master and return the line driver
    pub fn into_inner(self) -> D {
        self.driver
    }

    /// Put the focused port into its idle state
    ///
    /// MISO input, everything else output, clock low, reset released.
    fn reset_interface(&mut self) {
        let b = *self.binding(self.focus);
        self.driver.set_direction(b.sck, Direction::Output);
        self.driver.drive(b.sck, Level::Low);
        self.driver.set_direction(b.miso, Direction::Input);
        self.driver.set_direction(b.mosi, Direction::Output);
        self.driver.set_direction(b.reset, Direction::Output);
        self.driver.drive(b.reset, Level::High);
    }
}

impl<D: LineDriver> IspMaster for BitbangIsp<D> {
    fn focus(&mut self, port: Port) {
        log::trace!("isp: focus -> {}", port);
        self.focus = port;
        self.reset_interface();
    }

    fn focused(&self) -> Port {
        self.focus
    }

    fn enter_programming_mode(&mut self) -> u8 {
        self.reset_interface();
        let b = *self.binding(self.focus);

        // A positive pulse on RESET while SCK is low resynchronises the
        // serial interface; holding it low afterwards keeps the device in
        // programming mode.
        self.driver.drive(b.sck, Level::Low);
        self.driver.drive(b.reset, Level::Low);
        self.driver.delay_us(RESET_PULSE_US);
        self.driver.drive(b.reset, Level::High);
        self.driver.delay_us(RESET_PULSE_US);
        self.driver.drive(b.reset, Level::Low);
        self.driver.delay_ms(RESET_SETTLE_MS);

        let response = self.transact(&IspCommand::programming_enable())[ECHO_BYTE];
        self.transact(&IspCommand::load_extended_address(0));

        log::trace!("isp: programming enable on {} -> 0x{:02X}", self.focus, response);
        response
    }

    fn transact(&mut self, cmd: &IspCommand) -> [u8; 4] {
        let lines = self.binding(self.focus).spi_lines();
        let response = bitbang::transact(&mut self.driver, &lines, &cmd.bytes);
        log::trace!("isp: {:02X?} -> {:02X?}", cmd.bytes, response);
        response
    }

    fn delay_ms(&mut self, ms: u32) {
        self.driver.delay_ms(ms);
    }
}

// The trigger signal lives on the same GPIO bank as the ports
impl<D: LineDriver + TriggerLine> TriggerLine for BitbangIsp<D> {
    fn is_asserted(&mut self) -> bool {
        self.driver.is_asserted()
    }

    fn latch(&mut self) -> bool {
        self.driver.latch()
    }

    fn release(&mut self) {
        self.driver.release();
    }
}
