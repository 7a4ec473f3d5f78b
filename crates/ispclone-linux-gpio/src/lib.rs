//! ispclone-linux-gpio - Linux GPIO backend for the AVR copier
//!
//! This crate drives the copier's two programming ports, the shared
//! trigger line and the indicator LEDs through the Linux character device
//! GPIO interface (gpiocdev). Bit-level timing comes from
//! `ispclone-core`; this crate only moves lines.
//!
//! # Example
//!
//! ```no_run
//! use ispclone_linux_gpio::{LinuxGpioConfig, LinuxGpioLines, PortLines};
//! use ispclone_core::programmer::BitbangIsp;
//! use ispclone_core::chip::{self, Port};
//!
//! let config = LinuxGpioConfig::new(
//!     "/dev/gpiochip0",
//!     PortLines::new(4, 17, 27, 22),
//!     PortLines::new(5, 6, 13, 19),
//! );
//! let (socket, bus) = config.bindings();
//! let mut isp = BitbangIsp::new(LinuxGpioLines::open(&config)?, socket, bus);
//! if let Some(params) = chip::identify(&mut isp, Port::Socket) {
//!     println!("Signature: 0x{:06X}", params.signature);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with ispclone CLI
//!
//! ```bash
//! # Identify the chip in the socket
//! ispclone probe -p linux_gpio:gpiochip=0,socket=4:17:27:22,bus=5:6:13:19
//!
//! # Run unattended with trigger and LEDs
//! ispclone run -p linux_gpio:dev=/dev/gpiochip0,socket=4:17:27:22,bus=5:6:13:19,trigger=26,ready=20,error=21
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | AVR Pin  | Option field | Direction |
//! |----------|--------------|-----------|
//! | RESET    | R            | output    |
//! | MOSI     | MO           | output    |
//! | MISO     | MI           | input     |
//! | SCK      | SCK          | output    |
//!
//! The trigger line needs an external pull-up; it is only ever pulled low.
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpioConfig, LinuxGpioLeds, LinuxGpioLines, PortLines};
pub use error::{LinuxGpioError, Result};

use ispclone_core::programmer::BitbangIsp;

/// Open the programming lines and LEDs described by `options`
///
/// This is a convenience function for use in the CLI programmer dispatch.
///
/// # Example Options
///
/// - `dev=/dev/gpiochip0` - GPIO chip device path (or use gpiochip=N)
/// - `socket=4:17:27:22` - socket reset, mosi, miso, sck (required)
/// - `bus=5:6:13:19` - bus reset, mosi, miso, sck (required)
/// - `trigger=26` - trigger line (optional)
/// - `ready=20`, `error=21` - LED lines (optional)
pub fn open_linux_gpio(options: &[(&str, &str)]) -> Result<(BitbangIsp<LinuxGpioLines>, LinuxGpioLeds)> {
    let config = parse_options(options)?;
    let (socket, bus) = config.bindings();
    let lines = LinuxGpioLines::open(&config)?;
    let leds = LinuxGpioLeds::open(&config)?;
    Ok((BitbangIsp::new(lines, socket, bus), leds))
}
