//! Programmer traits and abstractions
//!
//! This module defines the hardware capabilities the protocol engine
//! depends on and the bit-banged ISP master built on top of them.

pub mod bitbang;
mod mux;
mod traits;

pub use bitbang::SpiLines;
pub use mux::{BitbangIsp, PortBinding, DEFAULT_BUS_BINDING, DEFAULT_SOCKET_BINDING};
pub use traits::*;
