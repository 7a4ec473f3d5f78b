//! Copy session - state shared by the copy engines
//!
//! A [`Session`] owns the two chip records and the staging buffer for the
//! lifetime of the copier. Roles and negotiated parameters are recomputed
//! at the start of every copy cycle and mean nothing outside of it.

use heapless::Vec;

use crate::chip::{self, ChipRecord, DeviceParams, Port};
use crate::error::{Error, Result};
use crate::programmer::IspMaster;

/// Staging buffer capacity: one 32-word page
pub const STAGING_CAPACITY: usize = 64;

/// Which way a copy cycle moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyDirection {
    /// Bus node is the source, socket chip the target
    #[default]
    BusToSocket,
    /// Socket chip is the source, bus node the target
    SocketToBus,
}

/// Source and target ports of one copy cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    source: Port,
    target: Port,
}

impl Roles {
    /// Assign roles for `direction`
    pub const fn assign(direction: CopyDirection) -> Self {
        match direction {
            CopyDirection::BusToSocket => Self {
                source: Port::Bus,
                target: Port::Socket,
            },
            CopyDirection::SocketToBus => Self {
                source: Port::Socket,
                target: Port::Bus,
            },
        }
    }

    /// Port data is read from
    pub const fn source(&self) -> Port {
        self.source
    }

    /// Port data is written to
    pub const fn target(&self) -> Port {
        self.target
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self::assign(CopyDirection::default())
    }
}

/// Parameters actually used for one copy cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    /// Pages to copy
    pub page_count: u8,
    /// Words per page
    pub page_size: u8,
    /// EEPROM bytes to copy
    pub eeprom_size: u16,
}

impl SessionParams {
    /// Lowest common denominator of two devices
    ///
    /// Page size comes from the source alone; every supported family uses
    /// the same page size.
    pub fn negotiate(source: &DeviceParams, target: &DeviceParams) -> Self {
        Self {
            page_count: source.page_count.min(target.page_count),
            page_size: source.page_size,
            eeprom_size: source.eeprom_size.min(target.eeprom_size),
        }
    }

    /// Page size in bytes
    pub const fn page_bytes(&self) -> usize {
        self.page_size as usize * 2
    }

    /// Program memory bytes covered by the copy
    pub const fn flash_bytes(&self) -> usize {
        self.page_bytes() * self.page_count as usize
    }
}

/// Fixed-capacity scratch area for one page or EEPROM chunk
///
/// Holds whatever was read last; the next read overwrites it.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    data: Vec<u8, STAGING_CAPACITY>,
}

impl StagingBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Maximum number of bytes
    pub const fn capacity(&self) -> usize {
        STAGING_CAPACITY
    }

    /// Bytes currently held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the buffer holds nothing
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop the contents
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Append a byte
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.data.push(byte).map_err(|_| Error::BufferTooSmall)
    }

    /// Append a program memory word, low byte first
    pub fn push_word(&mut self, word: u16) -> Result<()> {
        let [low, high] = word.to_le_bytes();
        self.push(low)?;
        self.push(high)
    }

    /// Word at word offset `index`
    pub fn word(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.data[index * 2], self.data[index * 2 + 1]])
    }

    /// The held bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

/// Copier session context
#[derive(Debug)]
pub struct Session {
    socket: ChipRecord,
    bus: ChipRecord,
    roles: Roles,
    pub(super) params: Option<SessionParams>,
    pub(super) strict_ack: bool,
    /// The staging buffer
    pub buffer: StagingBuffer,
}

impl Session {
    /// Create a session with no chips identified
    ///
    /// With `strict_ack` a missing Programming Enable echo aborts the
    /// engine instead of being left for verification to catch.
    pub const fn new(strict_ack: bool) -> Self {
        Self {
            socket: ChipRecord::new(Port::Socket),
            bus: ChipRecord::new(Port::Bus),
            roles: Roles::assign(CopyDirection::BusToSocket),
            params: None,
            strict_ack,
            buffer: StagingBuffer::new(),
        }
    }

    /// Chip record for `port`
    pub fn chip(&self, port: Port) -> &ChipRecord {
        match port {
            Port::Socket => &self.socket,
            Port::Bus => &self.bus,
        }
    }

    fn chip_mut(&mut self, port: Port) -> &mut ChipRecord {
        match port {
            Port::Socket => &mut self.socket,
            Port::Bus => &mut self.bus,
        }
    }

    /// Whether Programming Enable echoes are enforced
    pub fn strict_ack(&self) -> bool {
        self.strict_ack
    }

    /// Identify the chip on `port` and store the result in its record
    pub fn identify<M: IspMaster + ?Sized>(
        &mut self,
        master: &mut M,
        port: Port,
    ) -> Result<DeviceParams> {
        let params = chip::identify(master, port);
        self.chip_mut(port).params = params;
        params.ok_or(Error::IdentificationFailed(port))
    }

    /// Start a copy cycle: assign roles and forget the last negotiation
    pub fn begin_cycle(&mut self, direction: CopyDirection) -> Roles {
        self.roles = Roles::assign(direction);
        self.params = None;
        self.roles
    }

    /// Roles of the current cycle
    pub fn roles(&self) -> Roles {
        self.roles
    }

    /// Negotiate parameters from the identified source and target
    pub fn negotiate(&mut self) -> Result<SessionParams> {
        let source = self
            .chip(self.roles.source)
            .params
            .ok_or(Error::ChipNotIdentified(self.roles.source))?;
        let target = self
            .chip(self.roles.target)
            .params
            .ok_or(Error::ChipNotIdentified(self.roles.target))?;

        let params = SessionParams::negotiate(&source, &target);
        log::debug!(
            "negotiated {} pages x {} words, {} bytes EEPROM",
            params.page_count,
            params.page_size,
            params.eeprom_size
        );
        self.params = Some(params);
        Ok(params)
    }

    /// Parameters of the current cycle
    pub fn params(&self) -> Result<SessionParams> {
        self.params.ok_or(Error::Negotiation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{CHIPS, SIGNATURE_ATTINY44, SIGNATURE_ATTINY84};

    fn params(page_size: u8, page_count: u8, eeprom_size: u16) -> DeviceParams {
        DeviceParams {
            signature: 0,
            page_size,
            page_count,
            eeprom_size,
        }
    }

    #[test]
    fn test_roles() {
        let roles = Roles::default();
        assert_eq!((roles.source(), roles.target()), (Port::Bus, Port::Socket));
        let roles = Roles::assign(CopyDirection::SocketToBus);
        assert_eq!((roles.source(), roles.target()), (Port::Socket, Port::Bus));
    }

    #[test]
    fn test_negotiate_takes_minimum() {
        let pairs = [
            (params(32, 128, 256), params(32, 64, 256), (64, 32, 256)),
            (params(32, 64, 128), params(32, 128, 512), (64, 32, 128)),
            (params(16, 200, 0), params(32, 10, 64), (10, 16, 0)),
            (params(32, 0, 256), params(32, 128, 256), (0, 32, 256)),
        ];
        for (source, target, (count, size, eeprom)) in pairs {
            let p = SessionParams::negotiate(&source, &target);
            assert_eq!((p.page_count, p.page_size, p.eeprom_size), (count, size, eeprom));
        }
    }

    #[test]
    fn test_negotiate_page_size_from_source() {
        let p = SessionParams::negotiate(&params(16, 8, 8), &params(64, 8, 8));
        assert_eq!(p.page_size, 16);
        assert_eq!(p.page_bytes(), 32);
    }

    #[test]
    fn test_negotiate_known_chips() {
        for source in CHIPS {
            for target in CHIPS {
                let p = SessionParams::negotiate(&source.params(), &target.params());
                assert!(p.page_bytes() <= STAGING_CAPACITY);
                assert_eq!(p.flash_bytes(), source.flash_size().min(target.flash_size()));
            }
        }
    }

    #[test]
    fn test_session_requires_identified_chips() {
        let mut session = Session::new(false);
        session.begin_cycle(CopyDirection::BusToSocket);
        assert_eq!(session.negotiate(), Err(Error::ChipNotIdentified(Port::Bus)));
        assert_eq!(session.params(), Err(Error::Negotiation));

        session.bus.params = crate::chip::find_by_signature(SIGNATURE_ATTINY84).map(|c| c.params());
        assert_eq!(session.negotiate(), Err(Error::ChipNotIdentified(Port::Socket)));

        session.socket.params = crate::chip::find_by_signature(SIGNATURE_ATTINY44).map(|c| c.params());
        let p = session.negotiate().unwrap();
        assert_eq!(p.page_count, 64);
        assert_eq!(session.params(), Ok(p));

        session.begin_cycle(CopyDirection::SocketToBus);
        assert_eq!(session.params(), Err(Error::Negotiation));
    }

    #[test]
    fn test_staging_buffer() {
        let mut buf = StagingBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), STAGING_CAPACITY);
        buf.push_word(0xBEEF).unwrap();
        assert_eq!(buf.as_slice(), &[0xEF, 0xBE]);
        assert_eq!(buf.word(0), 0xBEEF);
        for i in 2..STAGING_CAPACITY {
            buf.push(i as u8).unwrap();
        }
        assert_eq!(buf.len(), STAGING_CAPACITY);
        assert_eq!(buf.push(0), Err(Error::BufferTooSmall));
        buf.clear();
        assert_eq!(buf.len(), 0);
    }
}
