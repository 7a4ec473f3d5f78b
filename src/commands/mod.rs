//! CLI command implementations
//!
//! Every command works on a [`Programmer`](crate::programmers::Programmer),
//! so the same code drives simulated boards and real GPIO lines.
//!
//! ## Controller commands
//!
//! `run` and `simulate` hand the board to the core controller state
//! machine, with a timer thread playing the part of the timer interrupt.
//!
//! ## Direct commands
//!
//! `probe` and `clone` talk to the chips directly and report progress on
//! the terminal.

mod clone;
mod list;
mod probe;
mod run;
#[cfg(feature = "dummy")]
mod simulate;

pub use clone::run_clone;
pub use list::{list_chips, list_programmers};
pub use probe::run_probe;
pub use run::run_copier;
#[cfg(feature = "dummy")]
pub use simulate::{run_simulate, SimulateOptions};

use ispclone_core::copy::CopyDirection;

/// Copy direction selected by `--reverse`
pub fn direction(reverse: bool) -> CopyDirection {
    if reverse {
        CopyDirection::SocketToBus
    } else {
        CopyDirection::BusToSocket
    }
}
