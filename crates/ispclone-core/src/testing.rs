//! Test doubles shared by the unit tests

use std::vec;
use std::vec::Vec;

use crate::chip::{Port, SIGNATURE_ATTINY44, SIGNATURE_ATTINY84};
use crate::isp::{opcodes, IspCommand};
use crate::programmer::{IspMaster, TriggerLine};

/// Transaction-level ATtiny model
pub(crate) struct MockChip {
    pub(crate) signature: u32,
    pub(crate) flash: Vec<u8>,
    pub(crate) page_buffer: [u16; 32],
    pub(crate) eeprom: Vec<u8>,
    pub(crate) fuses: [u8; 3],
    pub(crate) present: bool,
    pub(crate) enabled: bool,
    // Fault injection
    pub(crate) flash_fault: Option<usize>,
    pub(crate) eeprom_fault: Option<u8>,
    pub(crate) fuse_fault: Option<usize>,
    pub(crate) ack: u8,
}

impl MockChip {
    pub(crate) fn new(signature: u32) -> Self {
        let flash_size = match signature {
            SIGNATURE_ATTINY84 => 8192,
            SIGNATURE_ATTINY44 => 4096,
            _ => 0,
        };
        Self {
            signature,
            flash: vec![0xFF; flash_size],
            page_buffer: [0xFFFF; 32],
            eeprom: vec![0xFF; 512],
            fuses: [0x62, 0xDF, 0xFF],
            present: true,
            enabled: false,
            flash_fault: None,
            eeprom_fault: None,
            fuse_fault: None,
            ack: opcodes::PROG_ENABLE_ARG,
        }
    }

    pub(crate) fn empty() -> Self {
        let mut chip = Self::new(0xFFFFFF);
        chip.present = false;
        chip.ack = 0xFF;
        chip
    }

    pub(crate) fn with_pattern(signature: u32, seed: u8) -> Self {
        let mut chip = Self::new(signature);
        for (i, b) in chip.flash.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(seed);
        }
        for (i, b) in chip.eeprom.iter_mut().enumerate() {
            *b = (i as u8) ^ seed;
        }
        chip.fuses = [0xE2 ^ seed, 0x5F, 0xFE];
        chip
    }

    fn transact(&mut self, b: [u8; 4]) -> [u8; 4] {
        if !self.enabled {
            return [0xFF; 4];
        }
        let word_addr = u16::from_be_bytes([b[1], b[2]]) as usize;
        let data = match (b[0], b[1]) {
            (opcodes::READ_SIGNATURE, _) => (self.signature >> (8 * b[2].min(3) as u32)) as u8,
            (opcodes::CHIP_ERASE, opcodes::CHIP_ERASE_ARG) => {
                self.flash.fill(0xFF);
                0
            }
            (opcodes::READ_FLASH_LOW, _) => self.flash.get(word_addr * 2).copied().unwrap_or(0xFF),
            (opcodes::READ_FLASH_HIGH, _) => {
                self.flash.get(word_addr * 2 + 1).copied().unwrap_or(0xFF)
            }
            (opcodes::LOAD_FLASH_LOW, _) => {
                let w = &mut self.page_buffer[b[2] as usize % 32];
                *w = (*w & 0xFF00) | b[3] as u16;
                0
            }
            (opcodes::LOAD_FLASH_HIGH, _) => {
                let w = &mut self.page_buffer[b[2] as usize % 32];
                *w = (*w & 0x00FF) | (b[3] as u16) << 8;
                0
            }
            (opcodes::WRITE_FLASH_PAGE, _) => {
                let base = word_addr & !31;
                for (i, w) in self.page_buffer.iter().enumerate() {
                    let addr = (base + i) * 2;
                    // Programming can only clear bits
                    self.flash[addr] &= *w as u8;
                    self.flash[addr + 1] &= (*w >> 8) as u8;
                    for a in [addr, addr + 1] {
                        if self.flash_fault == Some(a) {
                            self.flash[a] ^= 0x01;
                        }
                    }
                }
                self.page_buffer = [0xFFFF; 32];
                0
            }
            (opcodes::READ_EEPROM, _) => self.eeprom[b[2] as usize],
            (opcodes::WRITE_EEPROM, _) => {
                self.eeprom[b[2] as usize] = b[3];
                if self.eeprom_fault == Some(b[2]) {
                    self.eeprom[b[2] as usize] ^= 0x80;
                }
                0
            }
            (opcodes::READ_FUSE, 0x00) => self.fuses[0],
            (opcodes::READ_FUSE_HIGH, 0x08) => self.fuses[1],
            (opcodes::READ_FUSE, 0x08) => self.fuses[2],
            (opcodes::WRITE_FUSE, arg) => {
                let index = match arg {
                    opcodes::WRITE_FUSE_LOW_ARG => 0,
                    opcodes::WRITE_FUSE_HIGH_ARG => 1,
                    _ => 2,
                };
                self.fuses[index] = b[3];
                if self.fuse_fault == Some(index) {
                    self.fuses[index] ^= 0x01;
                }
                0
            }
            _ => 0,
        };
        [0x00, b[0], b[1], data]
    }
}

/// Line-level actions taken by the controller, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockEvent {
    Latch,
    Release,
    Delay(u32),
    Enable(Port),
    Transact(Port),
}

pub(crate) struct MockIsp {
    pub(crate) socket: MockChip,
    pub(crate) bus: MockChip,
    pub(crate) focus: Port,
    pub(crate) log: Vec<(Port, [u8; 4])>,
    pub(crate) delay_ms: u32,
    /// Another node pulls the trigger low
    pub(crate) trigger_pulled: bool,
    pub(crate) trigger_latched: bool,
    /// The trigger line refuses to be driven
    pub(crate) latch_fails: bool,
    pub(crate) events: Vec<MockEvent>,
}

impl MockIsp {
    pub(crate) fn new(socket: MockChip, bus: MockChip) -> Self {
        Self {
            socket,
            bus,
            focus: Port::Socket,
            log: Vec::new(),
            delay_ms: 0,
            trigger_pulled: false,
            trigger_latched: false,
            latch_fails: false,
            events: Vec::new(),
        }
    }

    pub(crate) fn chip(&mut self, port: Port) -> &mut MockChip {
        match port {
            Port::Socket => &mut self.socket,
            Port::Bus => &mut self.bus,
        }
    }
}

impl IspMaster for MockIsp {
    fn focus(&mut self, port: Port) {
        self.focus = port;
    }

    fn focused(&self) -> Port {
        self.focus
    }

    fn enter_programming_mode(&mut self) -> u8 {
        self.events.push(MockEvent::Enable(self.focus));
        let chip = self.chip(self.focus);
        chip.enabled = chip.present;
        chip.ack
    }

    fn transact(&mut self, cmd: &IspCommand) -> [u8; 4] {
        let port = self.focus;
        self.log.push((port, cmd.bytes));
        self.events.push(MockEvent::Transact(port));
        self.chip(port).transact(cmd.bytes)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay_ms += ms;
        self.events.push(MockEvent::Delay(ms));
    }
}

impl TriggerLine for MockIsp {
    fn is_asserted(&mut self) -> bool {
        self.trigger_pulled || self.trigger_latched
    }

    fn latch(&mut self) -> bool {
        self.events.push(MockEvent::Latch);
        if self.latch_fails {
            return false;
        }
        self.trigger_latched = true;
        true
    }

    fn release(&mut self) {
        self.events.push(MockEvent::Release);
        self.trigger_latched = false;
    }
}
