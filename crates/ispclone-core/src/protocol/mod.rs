//! Protocol implementations
//!
//! This module contains the instruction sequences of the AVR serial
//! programming protocol.

mod avr;

pub use avr::*;
