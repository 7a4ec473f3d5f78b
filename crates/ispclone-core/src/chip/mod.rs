//! Chip types and database
//!
//! This module provides types describing supported devices and the
//! signature-based identification that fills them in.

mod database;
mod types;

pub use database::*;
pub use types::*;
