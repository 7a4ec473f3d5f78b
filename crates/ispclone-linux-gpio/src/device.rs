//! Linux GPIO line driver implementation
//!
//! [`LinuxGpioLines`] implements the `LineDriver` and `TriggerLine` traits
//! over one gpiocdev line request holding both programming ports and the
//! trigger line. [`LinuxGpioLeds`] holds the two indicator lines in a
//! separate request so the timer thread can toggle them without touching
//! the programming lines.

use std::sync::Mutex;
use std::time::Duration;

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use ispclone_core::programmer::{
    Direction, Indicators, Leds, Level, LineDriver, Pin, PortBinding, TriggerLine,
    DEFAULT_BUS_BINDING, DEFAULT_SOCKET_BINDING,
};

/// Number of programming lines (two ports of four)
const PORT_LINES: usize = 8;

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "ispclone";

/// GPIO offsets of one programming port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortLines {
    /// Target RESET
    pub reset: Offset,
    /// Programmer to device
    pub mosi: Offset,
    /// Device to programmer
    pub miso: Offset,
    /// Clock
    pub sck: Offset,
}

impl PortLines {
    /// Create from offsets in `reset:mosi:miso:sck` order
    pub const fn new(reset: Offset, mosi: Offset, miso: Offset, sck: Offset) -> Self {
        Self {
            reset,
            mosi,
            miso,
            sck,
        }
    }

    fn offsets(&self) -> [Offset; 4] {
        [self.reset, self.mosi, self.miso, self.sck]
    }
}

/// Configuration for opening the copier's GPIO lines
#[derive(Debug, Clone, Default)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Lines wired to the ZIF socket
    pub socket: PortLines,
    /// Lines wired to the bus connector
    pub bus: PortLines,
    /// Shared trigger line (optional, needed for unattended operation)
    pub trigger: Option<Offset>,
    /// Ready LED (optional)
    pub ready: Option<Offset>,
    /// Error LED (optional)
    pub error: Option<Offset>,
}

impl LinuxGpioConfig {
    /// Create a configuration with the given device path and port wiring
    pub fn new(device: impl Into<String>, socket: PortLines, bus: PortLines) -> Self {
        Self {
            device: device.into(),
            socket,
            bus,
            ..Default::default()
        }
    }

    /// Set the trigger line
    pub fn with_trigger(mut self, offset: Offset) -> Self {
        self.trigger = Some(offset);
        self
    }

    /// Set the indicator LED lines
    pub fn with_leds(mut self, ready: Option<Offset>, error: Option<Offset>) -> Self {
        self.ready = ready;
        self.error = error;
        self
    }

    /// Port bindings to hand to `BitbangIsp`
    ///
    /// Logical pins 0..4 are the socket and 4..8 the bus, in
    /// `reset, mosi, miso, sck` order.
    pub fn bindings(&self) -> (PortBinding, PortBinding) {
        (DEFAULT_SOCKET_BINDING, DEFAULT_BUS_BINDING)
    }

    fn port_offsets(&self) -> [Offset; PORT_LINES] {
        let mut offsets = [0; PORT_LINES];
        offsets[..4].copy_from_slice(&self.socket.offsets());
        offsets[4..].copy_from_slice(&self.bus.offsets());
        offsets
    }

    fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        let mut seen: Vec<Offset> = self.port_offsets().to_vec();
        seen.extend(self.trigger);
        seen.extend(self.ready);
        seen.extend(self.error);
        for (i, offset) in seen.iter().enumerate() {
            if seen[..i].contains(offset) {
                return Err(LinuxGpioError::DuplicateLine(*offset));
            }
        }
        Ok(())
    }
}

fn value_for(level: Level) -> Value {
    if level.is_high() {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// Apply `change` to a copy of `config` and keep it only if `apply` accepts it
fn stage<T: Clone, E>(
    config: &mut T,
    change: impl FnOnce(&mut T),
    apply: impl FnOnce(&T) -> std::result::Result<(), E>,
) -> std::result::Result<(), E> {
    let mut staged = config.clone();
    change(&mut staged);
    apply(&staged)?;
    *config = staged;
    Ok(())
}

/// Switch one line of a live request, leaving `config` untouched on failure
fn reconfigure_line(
    request: &Request,
    config: &mut Config,
    offset: Offset,
    direction: Direction,
) -> Result<()> {
    stage(
        config,
        |c| {
            match direction {
                // Outputs come up low; callers drive the level they want next
                Direction::Output => c.with_line(offset).as_output(Value::Inactive),
                Direction::Input => c.with_line(offset).as_input(),
            };
        },
        |c| request.reconfigure(c).map_err(LinuxGpioError::ReconfigureFailed),
    )
}

/// Whether we hold the trigger line low
///
/// Only changes once the line has actually been reconfigured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TriggerOwnership {
    offset: Option<Offset>,
    latched: bool,
}

impl TriggerOwnership {
    fn latch_with(&mut self, drive_low: impl FnOnce(Offset) -> Result<()>) -> bool {
        let Some(offset) = self.offset else {
            // No shared bus to claim
            return true;
        };
        if self.latched {
            return true;
        }
        match drive_low(offset) {
            Ok(()) => {
                self.latched = true;
                log::debug!("linux_gpio: Trigger latched");
                true
            }
            Err(e) => {
                log::error!("linux_gpio: Failed to latch trigger: {}", e);
                false
            }
        }
    }

    fn release_with(&mut self, float: impl FnOnce(Offset) -> Result<()>) {
        let Some(offset) = self.offset else {
            return;
        };
        if !self.latched {
            return;
        }
        match float(offset) {
            Ok(()) => {
                self.latched = false;
                log::debug!("linux_gpio: Trigger released");
            }
            // Still driven low, so still ours
            Err(e) => log::error!("linux_gpio: Failed to release trigger: {}", e),
        }
    }
}

/// Last direction successfully applied to each logical pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Directions([Direction; PORT_LINES]);

impl Directions {
    fn change_with(
        &mut self,
        index: usize,
        direction: Direction,
        apply: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        if self.0[index] == direction {
            return Ok(());
        }
        apply()?;
        self.0[index] = direction;
        Ok(())
    }
}

/// Programming ports and trigger line on a Linux GPIO chip
pub struct LinuxGpioLines {
    /// GPIO line request handle
    request: Request,
    /// Configuration currently applied to the request
    config: Config,
    /// GPIO offsets indexed by logical pin
    offsets: [Offset; PORT_LINES],
    /// Current direction indexed by logical pin
    directions: Directions,
    /// Trigger line and whether we hold it
    trigger: TriggerOwnership,
}

impl LinuxGpioLines {
    /// Request the port and trigger lines described by `config`
    ///
    /// Every line starts as an input so nothing on the bus is driven until
    /// a port is focused.
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        config.validate()?;
        log::debug!("linux_gpio: Opening device {}", config.device);

        let offsets = config.port_offsets();
        let mut req_config = Config::default();
        for offset in offsets {
            req_config.with_line(offset).as_input();
        }
        if let Some(trigger) = config.trigger {
            req_config.with_line(trigger).as_input();
        }

        let request = Request::from_config(req_config.clone())
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (socket={:?}, bus={:?}, trigger={:?})",
            config.device,
            config.socket.offsets(),
            config.bus.offsets(),
            config.trigger
        );

        Ok(Self {
            request,
            config: req_config,
            offsets,
            directions: Directions([Direction::Input; PORT_LINES]),
            trigger: TriggerOwnership {
                offset: config.trigger,
                latched: false,
            },
        })
    }

    /// Check whether a trigger line is configured
    pub fn has_trigger(&self) -> bool {
        self.trigger.offset.is_some()
    }

    fn offset(&self, pin: Pin) -> Option<Offset> {
        let offset = self.offsets.get(pin.0 as usize).copied();
        if offset.is_none() {
            log::error!("linux_gpio: No GPIO line for pin {}", pin.0);
        }
        offset
    }

}

impl LineDriver for LinuxGpioLines {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        let Some(offset) = self.offset(pin) else {
            return;
        };
        let Self {
            request,
            config,
            directions,
            ..
        } = self;
        let result = directions.change_with(pin.0 as usize, direction, || {
            reconfigure_line(request, config, offset, direction)
        });
        if let Err(e) = result {
            // Left unchanged, so the next call retries
            log::error!("linux_gpio: GPIO {} stays as before: {}", offset, e);
        }
    }

    fn drive(&mut self, pin: Pin, level: Level) {
        let Some(offset) = self.offset(pin) else {
            return;
        };
        if let Err(e) = self.request.set_value(offset, value_for(level)) {
            log::error!("Failed to set GPIO {}: {}", offset, e);
        }
    }

    fn read(&mut self, pin: Pin) -> Level {
        let Some(offset) = self.offset(pin) else {
            return Level::Low;
        };
        match self.request.value(offset) {
            Ok(Value::Active) => Level::High,
            Ok(Value::Inactive) => Level::Low,
            Err(e) => {
                log::error!("Failed to get GPIO {}: {}", offset, e);
                Level::Low
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

impl TriggerLine for LinuxGpioLines {
    fn is_asserted(&mut self) -> bool {
        let Some(trigger) = self.trigger.offset else {
            return false;
        };
        if self.trigger.latched {
            return true;
        }
        match self.request.value(trigger) {
            Ok(value) => value == Value::Inactive,
            Err(e) => {
                log::error!("Failed to read trigger: {}", e);
                false
            }
        }
    }

    fn latch(&mut self) -> bool {
        let Self {
            request,
            config,
            trigger,
            ..
        } = self;
        trigger.latch_with(|offset| reconfigure_line(request, config, offset, Direction::Output))
    }

    fn release(&mut self) {
        let Self {
            request,
            config,
            trigger,
            ..
        } = self;
        trigger.release_with(|offset| reconfigure_line(request, config, offset, Direction::Input));
    }
}

struct LedState {
    request: Option<Request>,
    lit: Leds,
}

/// Ready and error LEDs on a Linux GPIO chip
///
/// Missing LEDs are silently skipped, so a board without indicators
/// still works.
pub struct LinuxGpioLeds {
    ready: Option<Offset>,
    error: Option<Offset>,
    state: Mutex<LedState>,
}

impl LinuxGpioLeds {
    /// Request the LED lines described by `config`, all off
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        let lines: Vec<Offset> = config.ready.into_iter().chain(config.error).collect();
        let request = if lines.is_empty() {
            None
        } else {
            let mut req_config = Config::default();
            for &offset in &lines {
                req_config.with_line(offset).as_output(Value::Inactive);
            }
            let request = Request::from_config(req_config)
                .on_chip(&config.device)
                .with_consumer(CONSUMER)
                .request()
                .map_err(|source| LinuxGpioError::LineRequestFailed {
                    path: config.device.clone(),
                    source,
                })?;
            Some(request)
        };

        Ok(Self {
            ready: config.ready,
            error: config.error,
            state: Mutex::new(LedState {
                request,
                lit: Leds::empty(),
            }),
        })
    }

    /// LEDs currently lit
    pub fn lit(&self) -> Leds {
        match self.state.lock() {
            Ok(state) => state.lit,
            Err(poisoned) => poisoned.into_inner().lit,
        }
    }

    fn apply(&self, update: impl FnOnce(Leds) -> Leds) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.lit = update(state.lit);
        let Some(request) = &state.request else {
            return;
        };

        for (flag, offset) in [(Leds::READY, self.ready), (Leds::ERROR, self.error)] {
            let Some(offset) = offset else {
                continue;
            };
            let value = if state.lit.contains(flag) {
                Value::Active
            } else {
                Value::Inactive
            };
            if let Err(e) = request.set_value(offset, value) {
                log::error!("Failed to set LED {}: {}", offset, e);
            }
        }
    }
}

impl Indicators for LinuxGpioLeds {
    fn set(&self, leds: Leds, on: bool) {
        self.apply(|lit| if on { lit | leds } else { lit - leds });
    }

    fn toggle(&self, leds: Leds) {
        self.apply(|lit| lit ^ leds);
    }
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

fn parse_port(name: &'static str, value: &str) -> Result<PortLines> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() != 4 {
        return Err(LinuxGpioError::InvalidParameter(format!(
            "{} expects reset:mosi:miso:sck, got '{}'",
            name, value
        )));
    }
    Ok(PortLines::new(
        parse_line(name, parts[0])?,
        parse_line(name, parts[1])?,
        parse_line(name, parts[2])?,
        parse_line(name, parts[3])?,
    ))
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `socket=R:MO:MI:SCK` - socket port line offsets (required)
/// - `bus=R:MO:MI:SCK` - bus port line offsets (required)
/// - `trigger=N` - shared trigger line offset (optional)
/// - `ready=N` - ready LED line offset (optional)
/// - `error=N` - error LED line offset (optional)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioConfig> {
    let mut config = LinuxGpioConfig::default();
    let mut socket = None;
    let mut bus = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid gpiochip value: {}", value))
                })?);
            }
            "socket" => socket = Some(parse_port("socket", value)?),
            "bus" => bus = Some(parse_port("bus", value)?),
            "trigger" => config.trigger = Some(parse_line("trigger", value)?),
            "ready" => config.ready = Some(parse_line("ready", value)?),
            "error" => config.error = Some(parse_line("error", value)?),
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    // Handle dev vs gpiochip
    if config.device.is_empty() {
        match gpiochip {
            Some(n) => config.device = format!("/dev/gpiochip{}", n),
            None => return Err(LinuxGpioError::NoDevice),
        }
    } else if gpiochip.is_some() {
        return Err(LinuxGpioError::InvalidParameter(
            "Only one of 'dev' or 'gpiochip' can be specified".to_string(),
        ));
    }

    config.socket = socket.ok_or(LinuxGpioError::MissingParameter("socket"))?;
    config.bus = bus.ok_or(LinuxGpioError::MissingParameter("bus"))?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused(_offset: Offset) -> Result<()> {
        Err(LinuxGpioError::InvalidParameter("line busy".into()))
    }

    #[test]
    fn test_failed_latch_does_not_claim_trigger() {
        let mut trigger = TriggerOwnership {
            offset: Some(26),
            latched: false,
        };
        assert!(!trigger.latch_with(refused));
        assert!(!trigger.latched);

        assert!(trigger.latch_with(|offset| {
            assert_eq!(offset, 26);
            Ok(())
        }));
        assert!(trigger.latched);

        // A line we failed to float is still held low
        trigger.release_with(refused);
        assert!(trigger.latched);
        trigger.release_with(|_| Ok(()));
        assert!(!trigger.latched);
    }

    #[test]
    fn test_latch_without_trigger_line() {
        let mut trigger = TriggerOwnership::default();
        assert!(trigger.latch_with(|_| panic!("no line to drive")));
        assert!(!trigger.latched);
    }

    #[test]
    fn test_failed_direction_change_is_retried() {
        let mut directions = Directions([Direction::Input; PORT_LINES]);
        assert!(directions
            .change_with(3, Direction::Output, || refused(22))
            .is_err());
        assert_eq!(directions.0[3], Direction::Input);

        let mut applied = 0;
        for _ in 0..2 {
            directions
                .change_with(3, Direction::Output, || {
                    applied += 1;
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(applied, 1);
        assert_eq!(directions.0[3], Direction::Output);
    }

    #[test]
    fn test_stage_keeps_config_on_failure() {
        let mut lines = vec![4u32, 17];
        let result = stage(&mut lines, |l| l.push(27), |_| refused(27));
        assert!(result.is_err());
        assert_eq!(lines, [4, 17]);

        stage(&mut lines, |l| l.push(27), |staged| {
            assert_eq!(staged.len(), 3);
            Ok::<(), LinuxGpioError>(())
        })
        .unwrap();
        assert_eq!(lines, [4, 17, 27]);
    }

    const WIRING: [(&str, &str); 3] = [
        ("gpiochip", "0"),
        ("socket", "4:17:27:22"),
        ("bus", "5:6:13:19"),
    ];

    #[test]
    fn test_parse_minimal() {
        let config = parse_options(&WIRING).unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!(config.socket, PortLines::new(4, 17, 27, 22));
        assert_eq!(config.bus, PortLines::new(5, 6, 13, 19));
        assert_eq!(config.trigger, None);
        assert_eq!(config.ready, None);
        assert_eq!(
            config.port_offsets(),
            [4, 17, 27, 22, 5, 6, 13, 19]
        );
    }

    #[test]
    fn test_parse_full() {
        let mut options = vec![("dev", "/dev/gpiochip2")];
        options.extend_from_slice(&WIRING[1..]);
        options.extend_from_slice(&[("trigger", "26"), ("ready", "20"), ("error", "21")]);

        let config = parse_options(&options).unwrap();
        assert_eq!(config.device, "/dev/gpiochip2");
        assert_eq!(config.trigger, Some(26));
        assert_eq!((config.ready, config.error), (Some(20), Some(21)));
    }

    #[test]
    fn test_parse_requires_device() {
        let err = parse_options(&WIRING[1..]).unwrap_err();
        assert!(matches!(err, LinuxGpioError::NoDevice));

        let mut options = WIRING.to_vec();
        options.push(("dev", "/dev/gpiochip0"));
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parse_requires_ports() {
        let err = parse_options(&WIRING[..2]).unwrap_err();
        assert!(matches!(err, LinuxGpioError::MissingParameter("bus")));
        let err = parse_options(&[WIRING[0], WIRING[2]]).unwrap_err();
        assert!(matches!(err, LinuxGpioError::MissingParameter("socket")));
    }

    #[test]
    fn test_parse_bad_port() {
        let options = [("gpiochip", "0"), ("socket", "1:2:3"), ("bus", "5:6:7:8")];
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::InvalidParameter(_))
        ));

        let options = [("gpiochip", "0"), ("socket", "1:2:x:4"), ("bus", "5:6:7:8")];
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::InvalidLineNumber { name: "socket", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_shared_lines() {
        let mut options = WIRING.to_vec();
        options.push(("trigger", "17"));
        assert!(matches!(
            parse_options(&options),
            Err(LinuxGpioError::DuplicateLine(17))
        ));
    }
}
