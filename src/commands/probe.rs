//! Probe command implementation

use crate::commands::list::format_size;
use crate::programmers::Programmer;
use ispclone_core::chip::{self, Port};
use ispclone_core::isp::Fuse;
use ispclone_core::protocol;

/// Identify the chip on `port` and print what is known about it
pub fn run_probe(
    programmer: Programmer<'_>,
    port: Port,
    strict_ack: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let board = programmer.board;

    let params = match chip::identify(board, port) {
        Some(params) => params,
        None => {
            return Err(format!("No supported chip found on the {} port", port).into());
        }
    };

    if strict_ack {
        // identify() does not look at the echo
        protocol::enter_programming_mode(board, true)?;
    }

    let info = chip::find_by_signature(params.signature)
        .ok_or_else(|| format!("Unknown signature 0x{:06X}", params.signature))?;

    println!("Found chip on {} port:", port);
    println!("  Name:      {}", info.name);
    println!("  Signature: 0x{:06X}", params.signature);
    println!(
        "  Flash:     {} ({} pages of {} words)",
        format_size(info.flash_size()),
        params.page_count,
        params.page_size
    );
    println!("  EEPROM:    {}", format_size(params.eeprom_size as usize));
    for fuse in Fuse::ALL {
        println!(
            "  {:<10} 0x{:02X}",
            format!("{} fuse:", fuse.name()),
            protocol::read_fuse(board, fuse)
        );
    }

    Ok(())
}
