//! Copy engines

use crate::chip::Port;
use crate::error::{Error, Memory, Result, VerifyFailure};
use crate::isp::Fuse;
use crate::programmer::IspMaster;
use crate::protocol;

use super::context::{CopyDirection, Session, SessionParams};

// =============================================================================
// Progress reporting
// =============================================================================

/// Stage of a copy cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Program memory erase, copy and verify
    Flash,
    /// Fuse copy and verify
    Fuses,
    /// EEPROM copy and verify
    Eeprom,
}

impl Phase {
    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Flash => "flash",
            Phase::Fuses => "fuses",
            Phase::Eeprom => "EEPROM",
        }
    }
}

/// Progress callback for copy operations
pub trait CopyProgress {
    /// A phase begins; `total_bytes` will be copied
    fn started(&mut self, phase: Phase, total_bytes: usize);

    /// `bytes` more were copied and verified
    fn advanced(&mut self, bytes: usize);

    /// The phase completed and verified
    fn finished(&mut self, phase: Phase);
}

/// No-op progress implementation
pub struct NoProgress;

impl CopyProgress for NoProgress {
    fn started(&mut self, _phase: Phase, _total_bytes: usize) {}
    fn advanced(&mut self, _bytes: usize) {}
    fn finished(&mut self, _phase: Phase) {}
}

// =============================================================================
// Engines
// =============================================================================

fn mismatch(memory: Memory, address: u32, expected: u8, found: u8) -> Error {
    Error::VerifyFailed(VerifyFailure {
        memory,
        address,
        expected,
        found,
    })
}

fn focus_and_enable<M: IspMaster + ?Sized>(
    master: &mut M,
    session: &Session,
    port: Port,
) -> Result<()> {
    master.focus(port);
    protocol::enter_programming_mode(master, session.strict_ack())?;
    Ok(())
}

/// Copy program memory page by page
///
/// The target is erased first. Each page is read from the source into the
/// staging buffer, loaded into the target, committed, and read back from
/// the target before the next page is touched.
pub fn copy_program_memory<M: IspMaster + ?Sized, P: CopyProgress>(
    master: &mut M,
    session: &mut Session,
    progress: &mut P,
) -> Result<()> {
    let params = session.params()?;
    let roles = session.roles();
    if params.page_count == 0 || params.page_size == 0 {
        return Err(Error::Negotiation);
    }
    if params.page_bytes() > session.buffer.capacity() {
        return Err(Error::BufferTooSmall);
    }

    log::debug!("flash: erasing {} port", roles.target());
    focus_and_enable(master, session, roles.target())?;
    protocol::chip_erase(master);

    // Programming mode is entered again below before each page
    focus_and_enable(master, session, roles.source())?;

    progress.started(Phase::Flash, params.flash_bytes());
    let page_size = params.page_size as u16;
    for page in 0..params.page_count as u16 {
        let base = page * page_size;

        focus_and_enable(master, session, roles.source())?;
        session.buffer.clear();
        for offset in 0..page_size {
            let word = protocol::read_flash_word(master, base + offset);
            session.buffer.push_word(word)?;
        }

        focus_and_enable(master, session, roles.target())?;
        for offset in 0..page_size {
            protocol::load_flash_word(master, base + offset, session.buffer.word(offset as usize));
        }
        protocol::write_flash_page(master, base);

        for offset in 0..page_size {
            let found = protocol::read_flash_word(master, base + offset).to_le_bytes();
            let expected = session.buffer.word(offset as usize).to_le_bytes();
            for i in 0..2 {
                if found[i] != expected[i] {
                    let address = (base + offset) as u32 * 2 + i as u32;
                    return Err(mismatch(Memory::Flash, address, expected[i], found[i]));
                }
            }
        }

        log::trace!("flash: page {} verified", page);
        progress.advanced(params.page_bytes());
    }
    progress.finished(Phase::Flash);
    Ok(())
}

/// Number of staging buffer fills needed for `eeprom_size` bytes
///
/// Always at least one, so a zero-sized or partial EEPROM still moves one
/// full chunk.
pub fn eeprom_chunk_count(eeprom_size: u16, chunk_size: usize) -> usize {
    (eeprom_size as usize).div_ceil(chunk_size).max(1)
}

/// Copy EEPROM in staging-buffer-sized chunks
///
/// Chunks are always full, so bytes past the negotiated size are copied
/// too when it is not a multiple of the chunk size. Addresses wrap at 256.
pub fn copy_eeprom<M: IspMaster + ?Sized, P: CopyProgress>(
    master: &mut M,
    session: &mut Session,
    progress: &mut P,
) -> Result<()> {
    let params = session.params()?;
    let roles = session.roles();
    let chunk_size = session.buffer.capacity();
    let chunks = eeprom_chunk_count(params.eeprom_size, chunk_size);

    progress.started(Phase::Eeprom, chunks * chunk_size);
    for chunk in 0..chunks {
        let base = chunk * chunk_size;

        focus_and_enable(master, session, roles.source())?;
        session.buffer.clear();
        for offset in 0..chunk_size {
            let value = protocol::read_eeprom(master, (base + offset) as u8);
            session.buffer.push(value)?;
        }

        focus_and_enable(master, session, roles.target())?;
        for (offset, &value) in session.buffer.as_slice().iter().enumerate() {
            protocol::write_eeprom(master, (base + offset) as u8, value);
        }

        for (offset, &expected) in session.buffer.as_slice().iter().enumerate() {
            let addr = (base + offset) as u8;
            let found = protocol::read_eeprom(master, addr);
            if found != expected {
                return Err(mismatch(Memory::Eeprom, addr as u32, expected, found));
            }
        }

        log::trace!("eeprom: chunk {} verified", chunk);
        progress.advanced(chunk_size);
    }
    progress.finished(Phase::Eeprom);
    Ok(())
}

/// Copy the low, high and extended fuses
///
/// All three are written before any is verified; one bad fuse fails the
/// whole copy.
pub fn copy_fuses<M: IspMaster + ?Sized, P: CopyProgress>(
    master: &mut M,
    session: &mut Session,
    progress: &mut P,
) -> Result<()> {
    let roles = session.roles();
    progress.started(Phase::Fuses, Fuse::ALL.len());

    focus_and_enable(master, session, roles.source())?;
    let values = Fuse::ALL.map(|fuse| protocol::read_fuse(master, fuse));
    log::debug!(
        "fuses: lfuse=0x{:02X} hfuse=0x{:02X} efuse=0x{:02X}",
        values[0],
        values[1],
        values[2]
    );

    focus_and_enable(master, session, roles.target())?;
    for (fuse, &value) in Fuse::ALL.iter().zip(values.iter()) {
        protocol::write_fuse(master, *fuse, value);
    }

    for (fuse, &expected) in Fuse::ALL.iter().zip(values.iter()) {
        let found = protocol::read_fuse(master, *fuse);
        if found != expected {
            return Err(mismatch(Memory::Fuse(*fuse), 0, expected, found));
        }
    }

    progress.advanced(Fuse::ALL.len());
    progress.finished(Phase::Fuses);
    Ok(())
}

/// Run one complete copy cycle
///
/// Assigns roles for `direction`, identifies the target and then the
/// source, negotiates parameters and copies program memory, fuses and
/// EEPROM in that order. Any failure discards the cycle.
pub fn clone_chip<M: IspMaster + ?Sized, P: CopyProgress>(
    master: &mut M,
    session: &mut Session,
    direction: CopyDirection,
    progress: &mut P,
) -> Result<SessionParams> {
    let roles = session.begin_cycle(direction);
    session.identify(master, roles.target())?;
    session.identify(master, roles.source())?;
    let params = session.negotiate()?;

    copy_program_memory(master, session, progress)?;
    copy_fuses(master, session, progress)?;
    copy_eeprom(master, session, progress)?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{SIGNATURE_ATTINY44, SIGNATURE_ATTINY84};
    use crate::copy::STAGING_CAPACITY;
    use crate::isp::{opcodes, IspCommand};
    use crate::testing::{MockChip, MockIsp};
    use std::vec::Vec;

    struct Recorder {
        events: Vec<(Phase, usize)>,
        advanced: usize,
    }

    impl CopyProgress for Recorder {
        fn started(&mut self, phase: Phase, total_bytes: usize) {
            self.events.push((phase, total_bytes));
        }
        fn advanced(&mut self, bytes: usize) {
            self.advanced += bytes;
        }
        fn finished(&mut self, phase: Phase) {
            self.events.push((phase, usize::MAX));
        }
    }

    fn prepared(isp: &mut MockIsp) -> Session {
        let mut session = Session::new(false);
        session.begin_cycle(CopyDirection::BusToSocket);
        session.identify(isp, Port::Socket).unwrap();
        session.identify(isp, Port::Bus).unwrap();
        session.negotiate().unwrap();
        session
    }

    #[test]
    fn test_identify_records_params() {
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY44), MockChip::empty());
        let mut session = Session::new(false);
        let p = session.identify(&mut isp, Port::Socket).unwrap();
        assert_eq!((p.page_count, p.eeprom_size), (64, 256));
        assert_eq!(session.chip(Port::Socket).params, Some(p));

        assert_eq!(
            session.identify(&mut isp, Port::Bus),
            Err(Error::IdentificationFailed(Port::Bus))
        );
        assert_eq!(session.chip(Port::Bus).params, None);

        // Signature read is three transactions, bytes 0..3
        let sig_reads: Vec<u8> = isp
            .log
            .iter()
            .filter(|(port, b)| *port == Port::Socket && b[0] == opcodes::READ_SIGNATURE)
            .map(|(_, b)| b[2])
            .collect();
        assert_eq!(sig_reads, [0, 1, 2]);
    }

    #[test]
    fn test_copy_program_memory() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 3);
        let mut isp = MockIsp::new(MockChip::with_pattern(SIGNATURE_ATTINY84, 9), source);
        let mut session = prepared(&mut isp);
        let mut progress = Recorder {
            events: Vec::new(),
            advanced: 0,
        };

        copy_program_memory(&mut isp, &mut session, &mut progress).unwrap();
        assert_eq!(isp.socket.flash, isp.bus.flash);
        assert_eq!(progress.advanced, 8192);
        assert_eq!(progress.events, [(Phase::Flash, 8192), (Phase::Flash, usize::MAX)]);

        // Erase precedes everything sent to the target
        let first_target = isp
            .log
            .iter()
            .find(|(port, b)| *port == Port::Socket && b[0] != opcodes::READ_SIGNATURE && b[0] != opcodes::LOAD_EXT_ADDR)
            .unwrap();
        assert_eq!(first_target.1, IspCommand::chip_erase().bytes);
        // 128 pages at 5 ms plus the 10 ms erase
        assert_eq!(isp.delay_ms, 128 * opcodes::WRITE_PAGE_MS + opcodes::CHIP_ERASE_MS);
    }

    #[test]
    fn test_copy_program_memory_smaller_target() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 1);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY44), source);
        let mut session = prepared(&mut isp);
        assert_eq!(session.params().unwrap().page_count, 64);

        copy_program_memory(&mut isp, &mut session, &mut NoProgress).unwrap();
        assert_eq!(isp.socket.flash[..], isp.bus.flash[..4096]);
        // Nothing beyond the target's last page was touched
        assert!(!isp
            .log
            .iter()
            .any(|(_, b)| b[0] == opcodes::READ_FLASH_LOW && u16::from_be_bytes([b[1], b[2]]) >= 2048));
    }

    #[test]
    fn test_copy_program_memory_detects_single_byte_fault() {
        for fault in [0usize, 1, 63, 64, 4095, 8191] {
            let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x10);
            let mut target = MockChip::new(SIGNATURE_ATTINY84);
            target.flash_fault = Some(fault);
            let mut isp = MockIsp::new(target, source);
            let mut session = prepared(&mut isp);

            let err = copy_program_memory(&mut isp, &mut session, &mut NoProgress).unwrap_err();
            match err {
                Error::VerifyFailed(f) => {
                    assert_eq!(f.memory, Memory::Flash);
                    assert_eq!(f.address as usize, fault);
                    assert_eq!(f.expected ^ f.found, 0x01);
                }
                other => panic!("unexpected error {:?}", other),
            }

            // Nothing past the failing page was read from the source
            let failing_page = (fault / 64) as u16;
            assert!(!isp.log.iter().any(|(port, b)| *port == Port::Bus
                && b[0] == opcodes::READ_FLASH_LOW
                && u16::from_be_bytes([b[1], b[2]]) / 32 > failing_page));
        }
    }

    #[test]
    fn test_copy_program_memory_rejects_empty_negotiation() {
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY84), MockChip::new(SIGNATURE_ATTINY84));
        let mut session = Session::new(false);
        assert_eq!(
            copy_program_memory(&mut isp, &mut session, &mut NoProgress),
            Err(Error::Negotiation)
        );
        assert!(isp.log.is_empty());
    }

    #[test]
    fn test_eeprom_chunk_count() {
        assert_eq!(eeprom_chunk_count(0, 64), 1);
        assert_eq!(eeprom_chunk_count(1, 64), 1);
        assert_eq!(eeprom_chunk_count(64, 64), 1);
        assert_eq!(eeprom_chunk_count(65, 64), 2);
        assert_eq!(eeprom_chunk_count(256, 64), 4);
        assert_eq!(eeprom_chunk_count(512, 64), 8);
    }

    #[test]
    fn test_copy_eeprom() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x5A);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY44), source);
        let mut session = prepared(&mut isp);

        copy_eeprom(&mut isp, &mut session, &mut NoProgress).unwrap();
        assert_eq!(isp.socket.eeprom[..256], isp.bus.eeprom[..256]);
        // Upper half is out of reach of 8-bit addressing
        assert!(isp.socket.eeprom[256..].iter().all(|&b| b == 0xFF));
        assert_eq!(isp.delay_ms, 256 * opcodes::WRITE_EEPROM_MS);
    }

    #[test]
    fn test_copy_eeprom_zero_size_moves_one_chunk() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x33);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY84), source);
        let mut session = prepared(&mut isp);
        session.params = Some(SessionParams {
            eeprom_size: 0,
            ..session.params().unwrap()
        });

        copy_eeprom(&mut isp, &mut session, &mut NoProgress).unwrap();
        let writes = isp
            .log
            .iter()
            .filter(|(_, b)| b[0] == opcodes::WRITE_EEPROM)
            .count();
        assert_eq!(writes, STAGING_CAPACITY);
        assert_eq!(isp.socket.eeprom[..64], isp.bus.eeprom[..64]);
        assert!(isp.socket.eeprom[64..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_copy_eeprom_detects_fault() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x01);
        let mut target = MockChip::new(SIGNATURE_ATTINY84);
        target.eeprom_fault = Some(130);
        let mut isp = MockIsp::new(target, source);
        let mut session = prepared(&mut isp);

        let err = copy_eeprom(&mut isp, &mut session, &mut NoProgress).unwrap_err();
        assert!(matches!(
            err,
            Error::VerifyFailed(VerifyFailure {
                memory: Memory::Eeprom,
                address: 130,
                ..
            })
        ));
        // Chunk 3 (bytes 192..256) never started
        assert!(!isp
            .log
            .iter()
            .any(|(port, b)| *port == Port::Bus && b[0] == opcodes::READ_EEPROM && b[2] >= 192));
    }

    #[test]
    fn test_copy_fuses() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x0F);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY84), source);
        let mut session = prepared(&mut isp);

        copy_fuses(&mut isp, &mut session, &mut NoProgress).unwrap();
        assert_eq!(isp.socket.fuses, isp.bus.fuses);
        assert_eq!(isp.delay_ms, 3 * opcodes::WRITE_FUSE_MS);
    }

    #[test]
    fn test_copy_fuses_single_mismatch_fails() {
        for (index, fuse) in Fuse::ALL.iter().enumerate() {
            let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x0F);
            let mut target = MockChip::new(SIGNATURE_ATTINY84);
            target.fuse_fault = Some(index);
            let mut isp = MockIsp::new(target, source);
            let mut session = prepared(&mut isp);

            let err = copy_fuses(&mut isp, &mut session, &mut NoProgress).unwrap_err();
            match err {
                Error::VerifyFailed(f) => assert_eq!(f.memory, Memory::Fuse(*fuse)),
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_strict_ack() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x0F);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY84), source);
        let mut session = prepared(&mut isp);
        // Target still answers, but with a broken echo
        isp.socket.ack = 0x00;

        assert!(copy_fuses(&mut isp, &mut session, &mut NoProgress).is_ok());
        assert_eq!(isp.socket.fuses, isp.bus.fuses);

        session.strict_ack = true;
        assert_eq!(
            copy_fuses(&mut isp, &mut session, &mut NoProgress),
            Err(Error::ProgrammingEnableFailed {
                port: Port::Socket,
                response: 0x00
            })
        );
    }

    #[test]
    fn test_clone_chip() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY44, 0x77);
        let mut isp = MockIsp::new(MockChip::new(SIGNATURE_ATTINY84), source);
        let mut session = Session::new(false);
        let mut progress = Recorder {
            events: Vec::new(),
            advanced: 0,
        };

        let params = clone_chip(&mut isp, &mut session, CopyDirection::BusToSocket, &mut progress).unwrap();
        assert_eq!(params.page_count, 64);
        assert_eq!(isp.socket.flash[..4096], isp.bus.flash[..]);
        assert!(isp.socket.flash[4096..].iter().all(|&b| b == 0xFF));
        assert_eq!(isp.socket.fuses, isp.bus.fuses);
        assert_eq!(isp.socket.eeprom[..256], isp.bus.eeprom[..256]);

        let phases: Vec<Phase> = progress
            .events
            .iter()
            .filter(|(_, n)| *n != usize::MAX)
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(phases, [Phase::Flash, Phase::Fuses, Phase::Eeprom]);

        // Target identified before source
        let sig_ports: Vec<Port> = isp
            .log
            .iter()
            .filter(|(_, b)| b[0] == opcodes::READ_SIGNATURE && b[2] == 0)
            .map(|(p, _)| *p)
            .collect();
        assert_eq!(sig_ports, [Port::Socket, Port::Bus]);
    }

    #[test]
    fn test_clone_chip_reversed() {
        let socket = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x42);
        let mut isp = MockIsp::new(socket, MockChip::new(SIGNATURE_ATTINY84));
        let mut session = Session::new(false);

        clone_chip(&mut isp, &mut session, CopyDirection::SocketToBus, &mut NoProgress).unwrap();
        assert_eq!(isp.bus.flash, isp.socket.flash);
        assert_eq!(isp.bus.fuses, isp.socket.fuses);
    }

    #[test]
    fn test_clone_chip_missing_target() {
        let source = MockChip::with_pattern(SIGNATURE_ATTINY84, 0x42);
        let mut isp = MockIsp::new(MockChip::empty(), source);
        let mut session = Session::new(false);

        assert_eq!(
            clone_chip(&mut isp, &mut session, CopyDirection::BusToSocket, &mut NoProgress),
            Err(Error::IdentificationFailed(Port::Socket))
        );
        // Source never probed
        assert!(isp.log.iter().all(|(port, _)| *port == Port::Socket));
    }
}
