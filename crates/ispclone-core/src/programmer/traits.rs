//! Programmer trait definitions
//!
//! The protocol layer never touches hardware directly. Backends implement
//! [`LineDriver`] for the programming ports, [`TriggerLine`] for the shared
//! bus signal, [`Indicators`] for the LEDs and [`PeriodicTimer`] for the
//! timer that drives blinking and the presence re-check.

use bitflags::bitflags;

use crate::chip::Port;
use crate::isp::IspCommand;

/// Physical line number on the backend's GPIO bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(pub u8);

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven or read low
    Low,
    /// Driven or read high
    High,
}

impl Level {
    /// Level for a bit value
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Check for a high level
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

/// Direction of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// High impedance, readable
    Input,
    /// Actively driven
    Output,
}

/// Raw line access used by the bit-banged channel
///
/// This is the only hardware dependency of the protocol engine. A host
/// backend maps it onto a GPIO character device, the simulator onto
/// emulated chips.
pub trait LineDriver {
    /// Configure a line as input or output
    fn set_direction(&mut self, pin: Pin, direction: Direction);

    /// Drive an output line
    fn drive(&mut self, pin: Pin, level: Level);

    /// Sample an input line
    fn read(&mut self, pin: Pin) -> Level;

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Wait for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

/// The shared open-drain trigger signal
///
/// Any node on the bus pulls the line low to request a copy. The copier
/// that observes it first latches it low itself so nobody else starts a
/// second cycle.
pub trait TriggerLine {
    /// Check whether the line is currently pulled low
    fn is_asserted(&mut self) -> bool;

    /// Drive the line low
    ///
    /// Returns `false` if the line could not be driven; the caller does not
    /// own the cycle in that case.
    fn latch(&mut self) -> bool;

    /// Return the line to high impedance
    fn release(&mut self);
}

bitflags! {
    /// Indicator LEDs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Leds: u8 {
        /// Green: chip detected / copy in progress
        const READY = 1 << 0;
        /// Red: last cycle failed
        const ERROR = 1 << 1;
    }
}

/// Indicator LEDs
///
/// Methods take `&self` because the timer callback toggles LEDs while the
/// main flow owns everything else. Implementations provide their own
/// interior mutability.
pub trait Indicators: Sync {
    /// Switch the given LEDs on or off
    fn set(&self, leds: Leds, on: bool);

    /// Invert the given LEDs
    fn toggle(&self, leds: Leds);
}

/// One-shot timer whose expiry runs the controller's timer callback
///
/// The callback decides whether to re-arm, so "periodic" behaviour comes
/// from the callback asking for another period.
pub trait PeriodicTimer {
    /// Arm the timer to expire after `period_ms`, replacing any pending expiry
    fn enable(&mut self, period_ms: u32);

    /// Cancel any pending expiry
    fn disable(&mut self);
}

/// ISP master: a focusable pair of programming ports
///
/// Exactly one port is bound to the bit channel at a time. Every
/// transaction goes to the focused port.
pub trait IspMaster {
    /// Bind the bit channel to `port` and reset the port to idle
    fn focus(&mut self, port: Port);

    /// Port currently bound to the bit channel
    fn focused(&self) -> Port;

    /// Strobe reset and send Programming Enable
    ///
    /// Returns the byte echoed where the device acknowledges the command
    /// (`0x53` when the device is in sync).
    fn enter_programming_mode(&mut self) -> u8;

    /// Exchange one 4-byte instruction
    fn transact(&mut self, cmd: &IspCommand) -> [u8; 4];

    /// Wait for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32);
}

impl<M: IspMaster + ?Sized> IspMaster for &mut M {
    fn focus(&mut self, port: Port) {
        (**self).focus(port)
    }

    fn focused(&self) -> Port {
        (**self).focused()
    }

    fn enter_programming_mode(&mut self) -> u8 {
        (**self).enter_programming_mode()
    }

    fn transact(&mut self, cmd: &IspCommand) -> [u8; 4] {
        (**self).transact(cmd)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

impl<T: TriggerLine + ?Sized> TriggerLine for &mut T {
    fn is_asserted(&mut self) -> bool {
        (**self).is_asserted()
    }

    fn latch(&mut self) -> bool {
        (**self).latch()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

impl<T: PeriodicTimer + ?Sized> PeriodicTimer for &mut T {
    fn enable(&mut self, period_ms: u32) {
        (**self).enable(period_ms)
    }

    fn disable(&mut self) {
        (**self).disable()
    }
}
