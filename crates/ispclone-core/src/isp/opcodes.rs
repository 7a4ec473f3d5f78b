//! AVR serial programming instruction bytes
//!
//! Every instruction is four bytes long. The first byte selects the
//! instruction family; some families carry a sub-command in the second
//! byte (fuse and erase commands share `0xAC` with programming enable).

// ============================================================================
// Programming mode
// ============================================================================

/// Programming Enable, first byte
pub const PROG_ENABLE: u8 = 0xAC;
/// Programming Enable, second byte (echoed back in response byte 2)
pub const PROG_ENABLE_ARG: u8 = 0x53;
/// Load Extended Address byte
pub const LOAD_EXT_ADDR: u8 = 0x4D;

// ============================================================================
// Identification
// ============================================================================

/// Read Signature Byte
pub const READ_SIGNATURE: u8 = 0x30;

// ============================================================================
// Erase
// ============================================================================

/// Chip Erase, first byte
pub const CHIP_ERASE: u8 = 0xAC;
/// Chip Erase, second byte
pub const CHIP_ERASE_ARG: u8 = 0x80;

// ============================================================================
// Program memory
// ============================================================================

/// Read Program Memory, low byte of word
pub const READ_FLASH_LOW: u8 = 0x20;
/// Read Program Memory, high byte of word
pub const READ_FLASH_HIGH: u8 = 0x28;
/// Load Program Memory Page, low byte of word
pub const LOAD_FLASH_LOW: u8 = 0x40;
/// Load Program Memory Page, high byte of word
pub const LOAD_FLASH_HIGH: u8 = 0x48;
/// Write Program Memory Page
pub const WRITE_FLASH_PAGE: u8 = 0x4C;

// ============================================================================
// EEPROM
// ============================================================================

/// Read EEPROM Memory
pub const READ_EEPROM: u8 = 0xA0;
/// Write EEPROM Memory
pub const WRITE_EEPROM: u8 = 0xC0;

// ============================================================================
// Fuses
// ============================================================================

/// Read Fuse bits (low) / Read Extended Fuse bits
pub const READ_FUSE: u8 = 0x50;
/// Read Fuse High bits
pub const READ_FUSE_HIGH: u8 = 0x58;
/// Write fuse family, first byte
pub const WRITE_FUSE: u8 = 0xAC;
/// Write Fuse bits (low), second byte
pub const WRITE_FUSE_LOW_ARG: u8 = 0xA0;
/// Write Fuse High bits, second byte
pub const WRITE_FUSE_HIGH_ARG: u8 = 0xA8;
/// Write Extended Fuse bits, second byte
pub const WRITE_FUSE_EXT_ARG: u8 = 0xA4;

// ============================================================================
// Timing (datasheet minimums)
// ============================================================================

/// Half period of the bit-banged clock in microseconds
pub const HALF_PERIOD_US: u32 = 4;
/// Gap after each byte in microseconds
pub const BYTE_GAP_US: u32 = 20;
/// Reset strobe width in microseconds
pub const RESET_PULSE_US: u32 = 10;
/// Settle time after the reset strobe before Programming Enable
pub const RESET_SETTLE_MS: u32 = 20;
/// t_WD_ERASE
pub const CHIP_ERASE_MS: u32 = 10;
/// t_WD_FLASH
pub const WRITE_PAGE_MS: u32 = 5;
/// t_WD_EEPROM
pub const WRITE_EEPROM_MS: u32 = 4;
/// t_WD_FUSE
pub const WRITE_FUSE_MS: u32 = 5;
