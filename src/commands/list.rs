//! List commands implementation

use crate::programmers;
use ispclone_core::chip;

/// List all supported programmers
pub fn list_programmers() {
    print!("{}", programmers::programmer_help());
}

/// List all supported chips
pub fn list_chips() {
    println!("Supported chips:");
    println!();
    println!(
        "{:<12} {:>10} {:>10} {:>8} {:>8}",
        "Name", "Signature", "Flash", "Pages", "EEPROM"
    );
    println!("{}", "-".repeat(52));

    for chip in chip::CHIPS {
        println!(
            "{:<12} {:>10} {:>10} {:>8} {:>8}",
            chip.name,
            format!("0x{:06X}", chip.signature),
            format_size(chip.flash_size()),
            chip.page_count,
            format_size(chip.eeprom_size as usize)
        );
    }
}

pub(crate) fn format_size(bytes: usize) -> String {
    if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
