//! ispclone-core - Core library for cloning AVR microcontrollers
//!
//! This crate implements the AVR serial programming protocol over a
//! bit-banged SPI channel and the copier built on top of it: two
//! programming ports sharing one channel, chip identification, verified
//! copies of program memory, fuses and EEPROM, and the state machine that
//! arbitrates the shared trigger line. It is `no_std` so the same code can
//! run on the copier itself or on a host driving GPIO lines.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for [`Error`]
//!
//! # Example
//!
//! ```ignore
//! use ispclone_core::copy::{self, CopyDirection, NoProgress, Session};
//! use ispclone_core::programmer::{BitbangIsp, DEFAULT_BUS_BINDING, DEFAULT_SOCKET_BINDING};
//!
//! let mut isp = BitbangIsp::new(lines, DEFAULT_SOCKET_BINDING, DEFAULT_BUS_BINDING);
//! let mut session = Session::new(false);
//! match copy::clone_chip(&mut isp, &mut session, CopyDirection::BusToSocket, &mut NoProgress) {
//!     Ok(params) => println!("Copied {} pages", params.page_count),
//!     Err(e) => println!("Copy failed: {}", e),
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod chip;
pub mod controller;
pub mod copy;
pub mod error;
pub mod isp;
pub mod programmer;
pub mod protocol;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
