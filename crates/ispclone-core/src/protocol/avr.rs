//! AVR serial programming instruction sequences
//!
//! Unless noted otherwise these functions assume the focused device is
//! already in programming mode. Write instructions block for the device's
//! worst-case write cycle time, since the copier never polls RDY/BSY.

use crate::error::{Error, Result};
use crate::isp::opcodes;
use crate::isp::{Fuse, IspCommand, DATA_BYTE};
use crate::programmer::IspMaster;

/// Number of signature bytes that identify a device
pub const SIGNATURE_LEN: u8 = 3;

/// Enter programming mode on the focused port
///
/// A missing echo is logged. With `strict` it is also returned as
/// [`Error::ProgrammingEnableFailed`]; otherwise the caller relies on
/// identification and verification to catch a bad link.
pub fn enter_programming_mode<M: IspMaster + ?Sized>(master: &mut M, strict: bool) -> Result<u8> {
    let response = master.enter_programming_mode();
    if response != opcodes::PROG_ENABLE_ARG {
        log::warn!(
            "{} port: programming enable echo 0x{:02X}, expected 0x{:02X}",
            master.focused(),
            response,
            opcodes::PROG_ENABLE_ARG
        );
        if strict {
            return Err(Error::ProgrammingEnableFailed {
                port: master.focused(),
                response,
            });
        }
    }
    Ok(response)
}

/// Read the 24-bit device signature (byte 0 least significant)
pub fn read_signature<M: IspMaster + ?Sized>(master: &mut M) -> u32 {
    (0..SIGNATURE_LEN).fold(0u32, |sig, index| {
        let byte = master.transact(&IspCommand::read_signature(index))[DATA_BYTE];
        sig | (byte as u32) << (8 * index as u32)
    })
}

/// Erase program memory and EEPROM
pub fn chip_erase<M: IspMaster + ?Sized>(master: &mut M) {
    master.transact(&IspCommand::chip_erase());
    master.delay_ms(opcodes::CHIP_ERASE_MS);
}

/// Read one program memory word
pub fn read_flash_word<M: IspMaster + ?Sized>(master: &mut M, word_addr: u16) -> u16 {
    let low = master.transact(&IspCommand::read_flash_low(word_addr))[DATA_BYTE];
    let high = master.transact(&IspCommand::read_flash_high(word_addr))[DATA_BYTE];
    u16::from_le_bytes([low, high])
}

/// Load one word into the device's page buffer
pub fn load_flash_word<M: IspMaster + ?Sized>(master: &mut M, word_addr: u16, value: u16) {
    let [low, high] = value.to_le_bytes();
    master.transact(&IspCommand::load_flash_low(word_addr, low));
    master.transact(&IspCommand::load_flash_high(word_addr, high));
}

/// Commit the page buffer to the page at `word_addr`
pub fn write_flash_page<M: IspMaster + ?Sized>(master: &mut M, word_addr: u16) {
    master.transact(&IspCommand::write_page(word_addr));
    master.delay_ms(opcodes::WRITE_PAGE_MS);
}

/// Read one EEPROM byte
///
/// The instruction carries an 8-bit address, so only the first 256 bytes
/// of EEPROM are reachable.
pub fn read_eeprom<M: IspMaster + ?Sized>(master: &mut M, addr: u8) -> u8 {
    master.transact(&IspCommand::read_eeprom(addr))[DATA_BYTE]
}

/// Write one EEPROM byte
pub fn write_eeprom<M: IspMaster + ?Sized>(master: &mut M, addr: u8, value: u8) {
    master.transact(&IspCommand::write_eeprom(addr, value));
    master.delay_ms(opcodes::WRITE_EEPROM_MS);
}

/// Read a fuse byte
pub fn read_fuse<M: IspMaster + ?Sized>(master: &mut M, fuse: Fuse) -> u8 {
    master.transact(&IspCommand::read_fuse(fuse))[DATA_BYTE]
}

/// Write a fuse byte
pub fn write_fuse<M: IspMaster + ?Sized>(master: &mut M, fuse: Fuse, value: u8) {
    master.transact(&IspCommand::write_fuse(fuse, value));
    master.delay_ms(opcodes::WRITE_FUSE_MS);
}
