//! Error types for ispclone-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::chip::Port;
use crate::isp::Fuse;

/// Memory area a verification failure was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    /// Program memory, addressed in bytes
    Flash,
    /// EEPROM, addressed in bytes
    Eeprom,
    /// A fuse byte
    Fuse(Fuse),
}

/// Details about a read-back mismatch on the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Memory area being verified
    pub memory: Memory,
    /// Byte address of the first mismatch (0 for fuses)
    pub address: u32,
    /// Value read from the source
    pub expected: u8,
    /// Value read back from the target
    pub found: u8,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Chip errors
    /// No chip with a known signature answered on the given port
    IdentificationFailed(Port),
    /// Programming Enable was not echoed (strict mode only)
    ProgrammingEnableFailed {
        /// Port that was being initialised
        port: Port,
        /// The byte found where the echo was expected
        response: u8,
    },

    // Operation errors
    /// Read-back after a write did not match the source
    VerifyFailed(VerifyFailure),
    /// Negotiated parameters leave nothing to copy
    Negotiation,
    /// A page does not fit in the staging buffer
    BufferTooSmall,
    /// Copy started before both chips were identified
    ChipNotIdentified(Port),

    // Bus errors
    /// The trigger line could not be driven low at the start of a cycle
    TriggerLatchFailed,
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flash => write!(f, "flash"),
            Self::Eeprom => write!(f, "EEPROM"),
            Self::Fuse(fuse) => write!(f, "{}", fuse.name()),
        }
    }
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} verify failed at 0x{:04X}: expected 0x{:02X}, found 0x{:02X}",
            self.memory, self.address, self.expected, self.found
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentificationFailed(port) => write!(
                f,
                "no supported chip on {} port (no response or unknown signature)",
                port
            ),
            Self::ProgrammingEnableFailed { port, response } => write!(
                f,
                "programming enable not acknowledged on {} port: expected 0x53 echo, got 0x{:02X}",
                port, response
            ),
            Self::VerifyFailed(failure) => write!(f, "{}", failure),
            Self::Negotiation => {
                write!(f, "negotiated copy parameters are empty: no pages to copy")
            }
            Self::BufferTooSmall => write!(f, "buffer too small: page does not fit in staging buffer"),
            Self::ChipNotIdentified(port) => {
                write!(f, "chip on {} port used before it was identified", port)
            }
            Self::TriggerLatchFailed => write!(f, "trigger line could not be latched low"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
