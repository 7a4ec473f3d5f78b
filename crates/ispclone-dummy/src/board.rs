//! Line-level copier board
//!
//! [`DummyBoard`] implements `LineDriver` by watching every line change
//! and clocking bits into the emulated chip on each port, so the whole
//! stack from the bit channel up runs unmodified against it.

use ispclone_core::chip::Port;
use ispclone_core::programmer::{
    Direction, Level, LineDriver, Pin, PortBinding, TriggerLine, DEFAULT_BUS_BINDING,
    DEFAULT_SOCKET_BINDING,
};

use crate::DummyAvr;

/// Number of logical lines on the board
const LINES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct LineState {
    direction: Direction,
    level: Level,
}

impl LineState {
    /// Level seen on the wire; undriven lines are pulled up
    fn effective(&self) -> Level {
        match self.direction {
            Direction::Output => self.level,
            Direction::Input => Level::High,
        }
    }
}

/// Line roles within a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Reset,
    Mosi,
    Miso,
    Sck,
}

/// Serial interface of one emulated chip
#[derive(Debug)]
struct SimPort {
    binding: PortBinding,
    chip: Option<DummyAvr>,
    shift_in: u8,
    bits: u8,
    shift_out: u8,
    byte_done: bool,
    received: Vec<u8>,
}

impl SimPort {
    fn new(binding: PortBinding) -> Self {
        Self {
            binding,
            chip: None,
            shift_in: 0,
            bits: 0,
            shift_out: 0,
            byte_done: false,
            received: Vec::with_capacity(4),
        }
    }

    fn role(&self, pin: Pin) -> Option<Role> {
        let b = &self.binding;
        [
            (b.reset, Role::Reset),
            (b.mosi, Role::Mosi),
            (b.miso, Role::Miso),
            (b.sck, Role::Sck),
        ]
        .into_iter()
        .find(|(p, _)| *p == pin)
        .map(|(_, role)| role)
    }

    fn resync(&mut self) {
        self.shift_in = 0;
        self.bits = 0;
        self.byte_done = false;
        self.received.clear();
        self.shift_out = match &self.chip {
            Some(chip) => chip.output_byte(&[]),
            None => 0xFF,
        };
    }

    fn reset_changed(&mut self, low: bool) {
        if !low {
            if let Some(chip) = &mut self.chip {
                chip.reset();
            }
        }
        self.resync();
    }

    fn rising_edge(&mut self, mosi: Level) {
        self.shift_in = (self.shift_in << 1) | mosi.is_high() as u8;
        self.bits += 1;
        if self.bits < 8 {
            return;
        }

        self.received.push(self.shift_in);
        self.shift_in = 0;
        self.bits = 0;
        self.byte_done = true;
        if self.received.len() == 4 {
            let cmd = [
                self.received[0],
                self.received[1],
                self.received[2],
                self.received[3],
            ];
            self.received.clear();
            if let Some(chip) = &mut self.chip {
                chip.execute(cmd);
            }
        }
    }

    fn falling_edge(&mut self) {
        if self.byte_done {
            self.byte_done = false;
            self.shift_out = match &self.chip {
                Some(chip) => chip.output_byte(&self.received),
                None => 0xFF,
            };
        } else {
            self.shift_out <<= 1;
        }
    }

    fn miso(&self) -> Level {
        Level::from_bit(self.shift_out & 0x80 != 0)
    }
}

/// Simulated copier board with an optional chip on each port
///
/// Time is simulated: delays only advance [`DummyBoard::elapsed_us`].
#[derive(Debug)]
pub struct DummyBoard {
    lines: [LineState; LINES],
    socket: SimPort,
    bus: SimPort,
    /// Another bus node pulls the trigger low
    trigger_pulled: bool,
    trigger_latched: bool,
    elapsed_us: u64,
}

impl Default for DummyBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBoard {
    /// Create a board with both ports empty, wired like the default bindings
    pub fn new() -> Self {
        Self {
            lines: [LineState {
                direction: Direction::Input,
                level: Level::Low,
            }; LINES],
            socket: SimPort::new(DEFAULT_SOCKET_BINDING),
            bus: SimPort::new(DEFAULT_BUS_BINDING),
            trigger_pulled: false,
            trigger_latched: false,
            elapsed_us: 0,
        }
    }

    /// Put `chip` on `port`
    pub fn with_chip(mut self, port: Port, chip: DummyAvr) -> Self {
        self.insert(port, chip);
        self
    }

    /// Bindings matching this board's wiring
    pub fn bindings(&self) -> (PortBinding, PortBinding) {
        (self.socket.binding, self.bus.binding)
    }

    fn port(&self, port: Port) -> &SimPort {
        match port {
            Port::Socket => &self.socket,
            Port::Bus => &self.bus,
        }
    }

    fn port_mut(&mut self, port: Port) -> &mut SimPort {
        match port {
            Port::Socket => &mut self.socket,
            Port::Bus => &mut self.bus,
        }
    }

    /// Insert a chip, replacing any chip already there
    pub fn insert(&mut self, port: Port, chip: DummyAvr) -> Option<DummyAvr> {
        let sim = self.port_mut(port);
        let old = sim.chip.replace(chip);
        sim.resync();
        old
    }

    /// Remove the chip from `port`
    pub fn remove(&mut self, port: Port) -> Option<DummyAvr> {
        let sim = self.port_mut(port);
        let old = sim.chip.take();
        sim.resync();
        old
    }

    /// Chip on `port`
    pub fn chip(&self, port: Port) -> Option<&DummyAvr> {
        self.port(port).chip.as_ref()
    }

    /// Mutable chip on `port`
    pub fn chip_mut(&mut self, port: Port) -> Option<&mut DummyAvr> {
        self.port_mut(port).chip.as_mut()
    }

    /// Simulate another node pulling the trigger low, or letting go
    pub fn pull_trigger(&mut self, pulled: bool) {
        self.trigger_pulled = pulled;
    }

    /// Check whether this board is holding the trigger low
    pub fn trigger_latched(&self) -> bool {
        self.trigger_latched
    }

    /// Simulated time spent in delays
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    fn locate(&self, pin: Pin) -> Option<(Port, Role)> {
        if let Some(role) = self.socket.role(pin) {
            return Some((Port::Socket, role));
        }
        self.bus.role(pin).map(|role| (Port::Bus, role))
    }

    fn line(&self, pin: Pin) -> Option<&LineState> {
        self.lines.get(pin.0 as usize)
    }

    /// Apply a line change and feed the resulting edge to the chip
    fn update(&mut self, pin: Pin, change: impl FnOnce(&mut LineState)) {
        let Some(state) = self.lines.get_mut(pin.0 as usize) else {
            log::warn!("dummy board: no line {}", pin.0);
            return;
        };
        let before = state.effective();
        change(state);
        let after = state.effective();
        if before == after {
            return;
        }

        let Some((port, role)) = self.locate(pin) else {
            return;
        };
        let binding = self.port(port).binding;
        let reset_low = self
            .line(binding.reset)
            .is_some_and(|l| l.effective() == Level::Low);
        let mosi = self
            .line(binding.mosi)
            .map_or(Level::High, |l| l.effective());

        let sim = self.port_mut(port);
        match role {
            Role::Reset => sim.reset_changed(after == Level::Low),
            Role::Sck if reset_low => {
                if after.is_high() {
                    sim.rising_edge(mosi);
                } else {
                    sim.falling_edge();
                }
            }
            _ => {}
        }
    }
}

impl LineDriver for DummyBoard {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        self.update(pin, |state| state.direction = direction);
    }

    fn drive(&mut self, pin: Pin, level: Level) {
        self.update(pin, |state| state.level = level);
    }

    fn read(&mut self, pin: Pin) -> Level {
        if let Some((port, Role::Miso)) = self.locate(pin) {
            let binding = self.port(port).binding;
            let selected = self
                .line(binding.reset)
                .is_some_and(|l| l.effective() == Level::Low);
            let sim = self.port(port);
            if selected && sim.chip.is_some() {
                return sim.miso();
            }
        }
        self.line(pin).map_or(Level::High, |l| l.effective())
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_us += ms as u64 * 1000;
    }
}

impl TriggerLine for DummyBoard {
    fn is_asserted(&mut self) -> bool {
        self.trigger_pulled || self.trigger_latched
    }

    fn latch(&mut self) -> bool {
        self.trigger_latched = true;
        true
    }

    fn release(&mut self) {
        self.trigger_latched = false;
    }
}
