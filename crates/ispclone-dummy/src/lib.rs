//! ispclone-dummy - Simulated ATtiny targets for testing
//!
//! This crate provides an in-memory ATtiny that answers AVR serial
//! programming instructions ([`DummyAvr`]), a copier board that connects
//! two of them to the bit-banged channel at the line level
//! ([`DummyBoard`]), and stand-ins for the LEDs and the timer. It's useful
//! for testing and development without real hardware.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use ispclone_core::chip::{self, ChipInfo};
use ispclone_core::isp::{opcodes, Fuse};
use ispclone_core::programmer::{Indicators, Leds, PeriodicTimer};

mod board;

pub use board::DummyBoard;

/// Factory fuse values (low, high, extended)
pub const FACTORY_FUSES: [u8; 3] = [0x62, 0xDF, 0xFF];

/// Write faults to inject on the emulated chip
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    flash: Option<usize>,
    eeprom: Option<u8>,
    fuse: Option<Fuse>,
}

/// Emulated ATtiny
///
/// Instructions are only honoured after a Programming Enable while reset
/// is held low. Program memory follows flash semantics: a page write can
/// only clear bits, so pages must be erased first.
#[derive(Debug, Clone)]
pub struct DummyAvr {
    chip: &'static ChipInfo,
    flash: Vec<u8>,
    page_buffer: Vec<u16>,
    eeprom: Vec<u8>,
    fuses: [u8; 3],
    enabled: bool,
    faults: Faults,
}

impl DummyAvr {
    /// Create an erased chip with factory fuses
    pub fn new(chip: &'static ChipInfo) -> Self {
        Self {
            chip,
            flash: vec![0xFF; chip.flash_size()],
            page_buffer: vec![0xFFFF; chip.page_size as usize],
            eeprom: vec![0xFF; chip.eeprom_size as usize],
            fuses: FACTORY_FUSES,
            enabled: false,
            faults: Faults::default(),
        }
    }

    /// Create an erased chip by part name
    pub fn by_name(name: &str) -> Option<Self> {
        chip::find_by_name(name).map(Self::new)
    }

    /// Create a chip holding a deterministic image derived from `seed`
    pub fn with_test_image(chip: &'static ChipInfo, seed: u8) -> Self {
        let mut avr = Self::new(chip);
        for (i, b) in avr.flash.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8;
        }
        for (i, b) in avr.eeprom.iter_mut().enumerate() {
            *b = (i as u8).wrapping_add(seed);
        }
        avr.fuses = [0xE2, 0x5F, 0xFE];
        avr
    }

    /// Device description
    pub fn chip(&self) -> &'static ChipInfo {
        self.chip
    }

    /// Program memory contents
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable program memory contents
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// EEPROM contents
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// Mutable EEPROM contents
    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    /// Fuse value
    pub fn fuse(&self, fuse: Fuse) -> u8 {
        self.fuses[fuse_index(fuse)]
    }

    /// Fuse values in low, high, extended order
    pub fn fuses(&self) -> [u8; 3] {
        self.fuses
    }

    /// Set a fuse value directly
    pub fn set_fuse(&mut self, fuse: Fuse, value: u8) {
        self.fuses[fuse_index(fuse)] = value;
    }

    /// Flip bit 0 of program memory byte `addr` whenever its page is written
    pub fn inject_flash_fault(&mut self, addr: usize) {
        self.faults.flash = Some(addr);
    }

    /// Flip bit 7 of EEPROM byte `addr` whenever it is written
    pub fn inject_eeprom_fault(&mut self, addr: u8) {
        self.faults.eeprom = Some(addr);
    }

    /// Flip bit 0 of `fuse` whenever it is written
    pub fn inject_fuse_fault(&mut self, fuse: Fuse) {
        self.faults.fuse = Some(fuse);
    }

    /// Check whether Programming Enable has been accepted
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Leave programming mode (reset released)
    pub fn reset(&mut self) {
        self.enabled = false;
        self.page_buffer.fill(0xFFFF);
    }

    /// Byte shifted out while byte `received.len()` of an instruction
    /// comes in
    ///
    /// The device echoes the previous instruction byte, except in the
    /// last slot where read instructions return their data.
    pub fn output_byte(&self, received: &[u8]) -> u8 {
        match *received {
            [] => 0x00,
            [b0] => {
                if self.enabled || b0 == opcodes::PROG_ENABLE {
                    b0
                } else {
                    0xFF
                }
            }
            [b0, b1] => {
                if self.enabled || b0 == opcodes::PROG_ENABLE {
                    b1
                } else {
                    0xFF
                }
            }
            [b0, b1, b2] => self.read_data(b0, b1, b2),
            _ => 0x00,
        }
    }

    /// Run a complete instruction
    pub fn execute(&mut self, cmd: [u8; 4]) {
        if cmd[0] == opcodes::PROG_ENABLE && cmd[1] == opcodes::PROG_ENABLE_ARG {
            self.enabled = true;
            return;
        }
        if !self.enabled {
            return;
        }

        let word_addr = u16::from_be_bytes([cmd[1], cmd[2]]) as usize;
        match (cmd[0], cmd[1]) {
            (opcodes::CHIP_ERASE, opcodes::CHIP_ERASE_ARG) => {
                log::debug!("dummy {}: chip erase", self.chip.name);
                self.flash.fill(0xFF);
                self.eeprom.fill(0xFF);
            }
            (opcodes::LOAD_FLASH_LOW, _) => {
                let w = self.buffer_word(cmd[2]);
                *w = (*w & 0xFF00) | cmd[3] as u16;
            }
            (opcodes::LOAD_FLASH_HIGH, _) => {
                let w = self.buffer_word(cmd[2]);
                *w = (*w & 0x00FF) | (cmd[3] as u16) << 8;
            }
            (opcodes::WRITE_FLASH_PAGE, _) => self.write_page(word_addr),
            (opcodes::WRITE_EEPROM, _) => {
                let addr = cmd[2];
                let mut value = cmd[3];
                if self.faults.eeprom == Some(addr) {
                    value ^= 0x80;
                }
                if let Some(b) = self.eeprom.get_mut(addr as usize) {
                    *b = value;
                }
            }
            (opcodes::WRITE_FUSE, arg) => {
                let fuse = match arg {
                    opcodes::WRITE_FUSE_LOW_ARG => Fuse::Low,
                    opcodes::WRITE_FUSE_HIGH_ARG => Fuse::High,
                    opcodes::WRITE_FUSE_EXT_ARG => Fuse::Extended,
                    _ => return,
                };
                let mut value = cmd[3];
                if self.faults.fuse == Some(fuse) {
                    value ^= 0x01;
                }
                self.set_fuse(fuse, value);
            }
            _ => {}
        }
    }

    /// Run an instruction and return the full response
    pub fn transact(&mut self, cmd: [u8; 4]) -> [u8; 4] {
        let mut response = [0u8; 4];
        for (i, slot) in response.iter_mut().enumerate() {
            *slot = self.output_byte(&cmd[..i]);
        }
        self.execute(cmd);
        response
    }

    fn read_data(&self, op: u8, b1: u8, b2: u8) -> u8 {
        if !self.enabled {
            return 0xFF;
        }
        let word_addr = u16::from_be_bytes([b1, b2]) as usize;
        match (op, b1) {
            (opcodes::READ_SIGNATURE, _) if b2 < 3 => (self.chip.signature >> (8 * b2 as u32)) as u8,
            (opcodes::READ_FLASH_LOW, _) => self.flash.get(word_addr * 2).copied().unwrap_or(0xFF),
            (opcodes::READ_FLASH_HIGH, _) => {
                self.flash.get(word_addr * 2 + 1).copied().unwrap_or(0xFF)
            }
            (opcodes::READ_EEPROM, _) => self.eeprom.get(b2 as usize).copied().unwrap_or(0xFF),
            (opcodes::READ_FUSE, 0x00) => self.fuse(Fuse::Low),
            (opcodes::READ_FUSE_HIGH, 0x08) => self.fuse(Fuse::High),
            (opcodes::READ_FUSE, 0x08) => self.fuse(Fuse::Extended),
            _ => 0x00,
        }
    }

    fn buffer_word(&mut self, low_addr: u8) -> &mut u16 {
        let index = low_addr as usize % self.page_buffer.len();
        &mut self.page_buffer[index]
    }

    fn write_page(&mut self, word_addr: usize) {
        let page_words = self.page_buffer.len();
        let base = (word_addr & !(page_words - 1)) * 2;
        if base + page_words * 2 > self.flash.len() {
            log::warn!("dummy {}: page write at 0x{:04X} out of range", self.chip.name, base);
            return;
        }

        for (i, word) in self.page_buffer.iter().enumerate() {
            let [low, high] = word.to_le_bytes();
            for (addr, value) in [(base + i * 2, low), (base + i * 2 + 1, high)] {
                // Programming can only clear bits
                self.flash[addr] &= value;
                if self.faults.flash == Some(addr) {
                    self.flash[addr] ^= 0x01;
                }
            }
        }
        self.page_buffer.fill(0xFFFF);
    }
}

fn fuse_index(fuse: Fuse) -> usize {
    match fuse {
        Fuse::Low => 0,
        Fuse::High => 1,
        Fuse::Extended => 2,
    }
}

/// LEDs kept in memory
#[derive(Debug, Default)]
pub struct DummyLeds {
    lit: AtomicU8,
    toggles: AtomicU32,
}

impl DummyLeds {
    /// Create with all LEDs off
    pub fn new() -> Self {
        Self::default()
    }

    /// LEDs currently lit
    pub fn lit(&self) -> Leds {
        Leds::from_bits_truncate(self.lit.load(Ordering::Acquire))
    }

    /// Number of toggle calls so far
    pub fn toggles(&self) -> u32 {
        self.toggles.load(Ordering::Acquire)
    }
}

impl Indicators for DummyLeds {
    fn set(&self, leds: Leds, on: bool) {
        if on {
            self.lit.fetch_or(leds.bits(), Ordering::AcqRel);
        } else {
            self.lit.fetch_and(!leds.bits(), Ordering::AcqRel);
        }
    }

    fn toggle(&self, leds: Leds) {
        self.lit.fetch_xor(leds.bits(), Ordering::AcqRel);
        self.toggles.fetch_add(1, Ordering::AcqRel);
    }
}

/// Timer that only records how it was armed
///
/// Simulated time runs far ahead of wall-clock time, so tests fire the
/// callback by hand instead.
#[derive(Debug, Default)]
pub struct DummyTimer {
    armed: Option<u32>,
    history: Vec<u32>,
}

impl DummyTimer {
    /// Create a disarmed timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending period, if armed
    pub fn armed(&self) -> Option<u32> {
        self.armed
    }

    /// Every period the timer was armed with, oldest first
    pub fn history(&self) -> &[u32] {
        &self.history
    }
}

impl PeriodicTimer for DummyTimer {
    fn enable(&mut self, period_ms: u32) {
        self.armed = Some(period_ms);
        self.history.push(period_ms);
    }

    fn disable(&mut self) {
        self.armed = None;
    }
}
