//! ispclone - ATtiny personality copier
//!
//! Copies program memory, fuses and EEPROM from one ATtiny to another over
//! two bit-banged ISP ports sharing one channel.
//!
//! # Architecture
//!
//! All protocol work lives in `ispclone-core`. Boards plug in through the
//! line-level traits it defines:
//! - **Simulated boards** (dummy) - Emulated chips answering at the bit
//!   level, for trying things out without hardware
//! - **GPIO boards** (linux_gpio) - Real chips wired to a Linux GPIO chip
//!
//! The same commands (run, probe, clone) work on either.

mod cli;
mod commands;
mod programmers;
mod timer;

use clap::Parser;
use cli::{Cli, Commands, PortArg};
use ispclone_core::chip::Port;
use ispclone_core::controller::CopierConfig;
use programmers::with_programmer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let strict_ack = cli.strict_ack;

    match cli.command {
        Commands::Run {
            programmer,
            reverse,
            cycles,
        } => {
            let config = CopierConfig {
                direction: commands::direction(reverse),
                strict_ack,
                ..CopierConfig::default()
            };
            with_programmer(&programmer, |p| commands::run_copier(p, config, cycles))
        }
        Commands::Probe { programmer, port } => {
            let port = match port {
                PortArg::Socket => Port::Socket,
                PortArg::Bus => Port::Bus,
            };
            with_programmer(&programmer, |p| commands::run_probe(p, port, strict_ack))
        }
        Commands::Clone {
            programmer,
            reverse,
        } => with_programmer(&programmer, |p| {
            commands::run_clone(p, commands::direction(reverse), strict_ack)
        }),
        #[cfg(feature = "dummy")]
        Commands::Simulate {
            source,
            target,
            seed,
            corrupt_flash,
            corrupt_eeprom,
            corrupt_fuse,
            reverse,
        } => {
            use cli::FuseArg;
            use ispclone_core::isp::Fuse;

            let opts = commands::SimulateOptions {
                source,
                target,
                seed: u8::try_from(seed).map_err(|_| format!("Seed out of range: {}", seed))?,
                corrupt_flash: corrupt_flash.map(|addr| addr as usize),
                corrupt_eeprom: corrupt_eeprom
                    .map(|addr| {
                        u8::try_from(addr)
                            .map_err(|_| format!("EEPROM address out of range: 0x{:X}", addr))
                    })
                    .transpose()?,
                corrupt_fuse: corrupt_fuse.map(|fuse| match fuse {
                    FuseArg::Low => Fuse::Low,
                    FuseArg::High => Fuse::High,
                    FuseArg::Extended => Fuse::Extended,
                }),
                direction: commands::direction(reverse),
            };
            let config = CopierConfig {
                direction: opts.direction,
                strict_ack,
                ..CopierConfig::default()
            };
            commands::run_simulate(&opts, config)
        }
        Commands::ListChips => {
            commands::list_chips();
            Ok(())
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}
