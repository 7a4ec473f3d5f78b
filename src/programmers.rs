//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use ispclone_core::programmer::{Indicators, IspMaster, TriggerLine};

/// Everything a copier board offers to the controller
pub trait Board: IspMaster + TriggerLine {}

impl<T: IspMaster + TriggerLine + ?Sized> Board for T {}

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated board (socket=<chip|none>,bus=<chip|none>,seed=<n>,trigger=<0|1>)",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description:
            "Linux GPIO lines (dev=<path>|gpiochip=<n>,socket=R:MO:MI:SCK,bus=R:MO:MI:SCK,trigger=<n>,ready=<n>,error=<n>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");

    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }

    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Map a programmer name or alias to its canonical name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// An opened copier board and its indicator LEDs
pub struct Programmer<'a> {
    /// Programming ports and trigger line
    pub board: &'a mut dyn Board,
    /// Ready and error LEDs
    pub leds: &'a dyn Indicators,
}

/// Execute a function with the specified programmer
///
/// The programmer string can be just the name (e.g., "dummy") or include
/// parameters (e.g., "dummy:socket=ATtiny44").
#[allow(unused_variables)]
pub fn with_programmer<F>(programmer: &str, f: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Programmer<'_>) -> Result<(), Box<dyn std::error::Error>>,
{
    // Parse programmer name and options
    let (name, options) = parse_programmer_string(programmer);

    // First check if the programmer is available at all
    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => {
            return Err(unknown_programmer_error(name));
        }
    };

    // Dispatch to the appropriate programmer
    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use ispclone_core::programmer::BitbangIsp;
            use ispclone_dummy::DummyLeds;

            let board = open_dummy(&options)?;
            let (socket, bus) = board.bindings();
            let mut isp = BitbangIsp::new(board, socket, bus);
            let leds = DummyLeds::new();
            f(Programmer {
                board: &mut isp,
                leds: &leds,
            })
        }

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => {
            log::info!("Opening Linux GPIO programmer...");

            let (mut isp, leds) = ispclone_linux_gpio::open_linux_gpio(&options).map_err(|e| {
                format!(
                    "Failed to open Linux GPIO lines: {}\n\
                     Make sure the chip exists and you have read/write permissions.",
                    e
                )
            })?;

            f(Programmer {
                board: &mut isp,
                leds: &leds,
            })
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Build a simulated board from `dummy:` options
///
/// Defaults to an erased ATtiny84 in the socket, a programmed ATtiny84 on
/// the bus and another node pulling the trigger.
#[cfg(feature = "dummy")]
fn open_dummy(options: &[(&str, &str)]) -> Result<ispclone_dummy::DummyBoard, Box<dyn std::error::Error>> {
    use ispclone_core::chip::{self, Port};
    use ispclone_dummy::{DummyAvr, DummyBoard};

    let mut socket = Some("ATtiny84");
    let mut bus = Some("ATtiny84");
    let mut seed = 0x5Au8;
    let mut trigger = true;

    for (key, value) in options {
        match *key {
            "socket" => socket = chip_option(value),
            "bus" => bus = chip_option(value),
            "seed" => {
                seed = parse_u8(value).ok_or_else(|| format!("Invalid seed: {}", value))?;
            }
            "trigger" => {
                trigger = match *value {
                    "1" | "on" | "yes" => true,
                    "0" | "off" | "no" => false,
                    _ => return Err(format!("Invalid trigger value: {}", value).into()),
                };
            }
            _ => log::warn!("dummy: ignoring unknown option '{}'", key),
        }
    }

    let mut board = DummyBoard::new();
    if let Some(name) = socket {
        let info = chip::find_by_name(name).ok_or_else(|| format!("Unknown chip: {}", name))?;
        board.insert(Port::Socket, DummyAvr::new(info));
    }
    if let Some(name) = bus {
        let info = chip::find_by_name(name).ok_or_else(|| format!("Unknown chip: {}", name))?;
        board.insert(Port::Bus, DummyAvr::with_test_image(info, seed));
    }
    board.pull_trigger(trigger);
    Ok(board)
}

#[cfg(feature = "dummy")]
fn chip_option(value: &str) -> Option<&str> {
    match value {
        "none" | "empty" | "" => None,
        name => Some(name),
    }
}

/// Parse a hex or decimal byte
pub fn parse_u8(s: &str) -> Option<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'ispclone list-programmers' for more details");
    msg.into()
}
