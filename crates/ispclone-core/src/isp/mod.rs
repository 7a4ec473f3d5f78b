//! ISP instruction types
//!
//! This module provides the 4-byte instruction framing and the AVR serial
//! programming opcodes used by the protocol layer.

mod command;
pub mod opcodes;

pub use command::{Fuse, IspCommand, DATA_BYTE, ECHO_BYTE};
