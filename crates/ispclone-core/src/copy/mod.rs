//! Chip cloning
//!
//! This module provides the session context and the three copy engines
//! (program memory, fuses, EEPROM). Each engine writes the target and
//! verifies it before moving on to the next page or chunk, and aborts on
//! the first mismatch.

mod context;
mod operations;

pub use context::*;
pub use operations::*;
