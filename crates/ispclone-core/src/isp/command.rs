//! ISP instruction framing

use super::opcodes;

/// Response byte carrying the Programming Enable echo
pub const ECHO_BYTE: usize = 2;
/// Response byte carrying read data
pub const DATA_BYTE: usize = 3;

/// A configuration fuse byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fuse {
    /// Low fuse (clock source, start-up time)
    Low,
    /// High fuse (brown-out, reset disable, SPI enable)
    High,
    /// Extended fuse (self-programming enable)
    Extended,
}

impl Fuse {
    /// All fuses in read/write order
    pub const ALL: [Fuse; 3] = [Fuse::Low, Fuse::High, Fuse::Extended];

    /// Short name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Fuse::Low => "lfuse",
            Fuse::High => "hfuse",
            Fuse::Extended => "efuse",
        }
    }
}

/// A single 4-byte ISP instruction
///
/// The device shifts its response out while the instruction is shifted in,
/// so every transaction is exactly four bytes in each direction. Where the
/// answer lands depends on the instruction, see [`ECHO_BYTE`] and
/// [`DATA_BYTE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IspCommand {
    /// Raw instruction bytes, sent first to last
    pub bytes: [u8; 4],
}

impl IspCommand {
    /// Create a command from raw bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self { bytes }
    }

    /// Programming Enable (`AC 53 00 00`)
    pub const fn programming_enable() -> Self {
        Self::new([opcodes::PROG_ENABLE, opcodes::PROG_ENABLE_ARG, 0x00, 0x00])
    }

    /// Load Extended Address byte
    pub const fn load_extended_address(ext: u8) -> Self {
        Self::new([opcodes::LOAD_EXT_ADDR, 0x00, ext, 0x00])
    }

    /// Read signature byte `index`
    pub const fn read_signature(index: u8) -> Self {
        Self::new([opcodes::READ_SIGNATURE, 0x00, index, 0x00])
    }

    /// Chip Erase
    pub const fn chip_erase() -> Self {
        Self::new([opcodes::CHIP_ERASE, opcodes::CHIP_ERASE_ARG, 0x00, 0x00])
    }

    /// Read the low byte of the program memory word at `word_addr`
    pub const fn read_flash_low(word_addr: u16) -> Self {
        let [hi, lo] = word_addr.to_be_bytes();
        Self::new([opcodes::READ_FLASH_LOW, hi, lo, 0x00])
    }

    /// Read the high byte of the program memory word at `word_addr`
    pub const fn read_flash_high(word_addr: u16) -> Self {
        let [hi, lo] = word_addr.to_be_bytes();
        Self::new([opcodes::READ_FLASH_HIGH, hi, lo, 0x00])
    }

    /// Load the low byte of a word into the page buffer
    ///
    /// Only the low address byte is sent; the page buffer is indexed by
    /// the word offset within the page.
    pub const fn load_flash_low(word_addr: u16, value: u8) -> Self {
        Self::new([opcodes::LOAD_FLASH_LOW, 0x00, word_addr as u8, value])
    }

    /// Load the high byte of a word into the page buffer
    pub const fn load_flash_high(word_addr: u16, value: u8) -> Self {
        Self::new([opcodes::LOAD_FLASH_HIGH, 0x00, word_addr as u8, value])
    }

    /// Commit the page buffer to the page containing `word_addr`
    pub const fn write_page(word_addr: u16) -> Self {
        let [hi, lo] = word_addr.to_be_bytes();
        Self::new([opcodes::WRITE_FLASH_PAGE, hi, lo, 0x00])
    }

    /// Read EEPROM byte
    pub const fn read_eeprom(addr: u8) -> Self {
        Self::new([opcodes::READ_EEPROM, 0x00, addr, 0x00])
    }

    /// Write EEPROM byte
    pub const fn write_eeprom(addr: u8, value: u8) -> Self {
        Self::new([opcodes::WRITE_EEPROM, 0x00, addr, value])
    }

    /// Read a fuse byte
    pub const fn read_fuse(fuse: Fuse) -> Self {
        let (op, arg) = match fuse {
            Fuse::Low => (opcodes::READ_FUSE, 0x00),
            Fuse::High => (opcodes::READ_FUSE_HIGH, 0x08),
            Fuse::Extended => (opcodes::READ_FUSE, 0x08),
        };
        Self::new([op, arg, 0x00, 0x00])
    }

    /// Write a fuse byte
    pub const fn write_fuse(fuse: Fuse, value: u8) -> Self {
        let arg = match fuse {
            Fuse::Low => opcodes::WRITE_FUSE_LOW_ARG,
            Fuse::High => opcodes::WRITE_FUSE_HIGH_ARG,
            Fuse::Extended => opcodes::WRITE_FUSE_EXT_ARG,
        };
        Self::new([opcodes::WRITE_FUSE, arg, 0x00, value])
    }
}
