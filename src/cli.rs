//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand, ValueEnum};

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "ispclone")]
#[command(author, version, about = "ATtiny personality copier", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Abort when a chip does not echo the Programming Enable instruction
    #[arg(long, global = true)]
    pub strict_ack: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Programming port selection
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortArg {
    /// On-board socket
    Socket,
    /// External bus connector
    Bus,
}

/// Fuse selection
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuseArg {
    /// Low fuse byte
    Low,
    /// High fuse byte
    High,
    /// Extended fuse byte
    Extended,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the copier: wait for a chip and a trigger, copy, repeat
    Run {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Copy the socket chip onto the bus chip instead
        #[arg(long)]
        reverse: bool,

        /// Stop after this many copy cycles
        #[arg(long)]
        cycles: Option<u32>,
    },

    /// Identify the chip on one port
    Probe {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Port to probe
        #[arg(long, value_enum, default_value = "socket")]
        port: PortArg,
    },

    /// Run a single copy cycle now, without the trigger handshake
    Clone {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Copy the socket chip onto the bus chip instead
        #[arg(long)]
        reverse: bool,
    },

    /// Run one controller cycle against simulated chips
    #[cfg(feature = "dummy")]
    Simulate {
        /// Part on the source port
        #[arg(long, default_value = "ATtiny84")]
        source: String,

        /// Part on the target port
        #[arg(long, default_value = "ATtiny84")]
        target: String,

        /// Seed for the source image
        #[arg(long, default_value = "0x5A", value_parser = parse_hex_u32)]
        seed: u32,

        /// Corrupt this program memory byte address on the target
        #[arg(long, value_parser = parse_hex_u32)]
        corrupt_flash: Option<u32>,

        /// Corrupt this EEPROM address on the target
        #[arg(long, value_parser = parse_hex_u32)]
        corrupt_eeprom: Option<u32>,

        /// Corrupt this fuse on the target
        #[arg(long, value_enum)]
        corrupt_fuse: Option<FuseArg>,

        /// Copy the socket chip onto the bus chip instead
        #[arg(long)]
        reverse: bool,
    },

    /// List supported chips
    ListChips,

    /// List supported programmers
    ListProgrammers,
}
