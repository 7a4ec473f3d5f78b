//! Supported device table and identification
//!
//! The table is closed: supporting another part means adding a row here.

use super::types::{ChipInfo, DeviceParams, Port};
use crate::programmer::IspMaster;
use crate::protocol;

/// Signature of the ATtiny84
pub const SIGNATURE_ATTINY84: u32 = 0x0C931E;
/// Signature of the ATtiny44
pub const SIGNATURE_ATTINY44: u32 = 0x07921E;

/// All supported devices
pub static CHIPS: &[ChipInfo] = &[
    ChipInfo {
        name: "ATtiny84",
        signature: SIGNATURE_ATTINY84,
        page_size: 32,
        page_count: 128,
        // 512 bytes on chip, only 256 addressable
        eeprom_size: 256,
    },
    ChipInfo {
        name: "ATtiny44",
        signature: SIGNATURE_ATTINY44,
        page_size: 32,
        page_count: 64,
        eeprom_size: 256,
    },
];

/// Look up a device by its 24-bit signature
pub fn find_by_signature(signature: u32) -> Option<&'static ChipInfo> {
    CHIPS.iter().find(|chip| chip.signature == signature)
}

/// Look up a device by name (case-insensitive)
pub fn find_by_name(name: &str) -> Option<&'static ChipInfo> {
    CHIPS.iter().find(|chip| chip.name.eq_ignore_ascii_case(name))
}

/// Read the signature on `port` and map it to device parameters
///
/// Leaves `port` focused and in programming mode. Returns `None` for an
/// empty port or an unknown part.
pub fn identify<M: IspMaster + ?Sized>(master: &mut M, port: Port) -> Option<DeviceParams> {
    master.focus(port);
    // A missing echo surfaces as an unknown signature below
    master.enter_programming_mode();
    let signature = protocol::read_signature(master);

    match find_by_signature(signature) {
        Some(chip) => {
            log::debug!("{} port: {} (signature 0x{:06X})", port, chip.name, signature);
            Some(chip.params())
        }
        None => {
            log::debug!("{} port: unknown signature 0x{:06X}", port, signature);
            None
        }
    }
}
