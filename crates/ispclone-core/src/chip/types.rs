//! Chip type definitions

use core::fmt;

/// One of the two programming ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    /// The ZIF socket holding the chip to be programmed
    Socket,
    /// The bus connector leading to the reference node
    Bus,
}

impl Port {
    /// The other port
    pub const fn other(self) -> Self {
        match self {
            Port::Socket => Port::Bus,
            Port::Bus => Port::Socket,
        }
    }

    /// Lower-case name
    pub const fn name(self) -> &'static str {
        match self {
            Port::Socket => "socket",
            Port::Bus => "bus",
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a supported device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// Part name
    pub name: &'static str,
    /// Signature bytes 0..3, byte 0 in the least significant position
    pub signature: u32,
    /// Program memory page size in words
    pub page_size: u8,
    /// Number of program memory pages
    pub page_count: u8,
    /// Accessible EEPROM size in bytes
    ///
    /// This is capped at 256 because EEPROM instructions carry an 8-bit
    /// address, even on parts with more EEPROM.
    pub eeprom_size: u16,
}

impl ChipInfo {
    /// Program memory size in bytes
    pub const fn flash_size(&self) -> usize {
        self.page_size as usize * 2 * self.page_count as usize
    }

    /// Device parameters for this part
    pub const fn params(&self) -> DeviceParams {
        DeviceParams {
            signature: self.signature,
            page_size: self.page_size,
            page_count: self.page_count,
            eeprom_size: self.eeprom_size,
        }
    }
}

/// Memory geometry discovered by identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceParams {
    /// 24-bit signature
    pub signature: u32,
    /// Words per program memory page
    pub page_size: u8,
    /// Program memory pages
    pub page_count: u8,
    /// EEPROM bytes
    pub eeprom_size: u16,
}

/// Identification state of the chip on one port
///
/// Two of these live for the whole session. Only the parameters change,
/// every time the port is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipRecord {
    /// Port the chip sits on
    pub port: Port,
    /// Result of the last identification, `None` if it failed or never ran
    pub params: Option<DeviceParams>,
}

impl ChipRecord {
    /// Record for a port with nothing identified yet
    pub const fn new(port: Port) -> Self {
        Self { port, params: None }
    }
}
