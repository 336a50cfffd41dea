//! HD44780 Character LCD Driver over PCF8574
//!
//! A driver for HD44780 compatible character displays wired to an I2C bus
//! through a PCF8574 I/O expander backpack.
//!
//! ## Features
//!
//! - `no_std` compatible core
//! - `embedded-hal` v1.0 support
//! - Eight panel topologies from 8x2 to 40x2, including split RAM 16x1 panels
//! - Host side frame buffer mirroring the panel content
//! - Custom characters, cursor, blink, backlight and scrolling
//! - Configurable expander pin map
//! - Device adapters with serialized access, ioctl requests and text
//!   attributes (with `std` feature)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core::convert::Infallible;
//! use embedded_hal::delay::DelayNs;
//! use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};
//! use lcdi2c::{Builder, Display, Interface};
//!
//! # struct MockI2c;
//! # impl embedded_hal::i2c::ErrorType for MockI2c { type Error = Infallible; }
//! # impl I2c<SevenBitAddress> for MockI2c {
//! #     fn transaction(
//! #         &mut self,
//! #         _address: SevenBitAddress,
//! #         _operations: &mut [Operation<'_>],
//! #     ) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # struct MockDelay;
//! # impl DelayNs for MockDelay { fn delay_ns(&mut self, _ns: u32) {} }
//! # let i2c = MockI2c;
//! # let delay = MockDelay;
//! let config = match Builder::new().address(0x27).topology(1).build() {
//!     Ok(config) => config,
//!     Err(_) => return,
//! };
//! let interface = Interface::new(i2c, config.address);
//!
//! let mut display = Display::new(interface, delay, &config);
//! let _ = display.init();
//! let _ = display.print(b"Hello\nWorld");
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

#[cfg(test)]
extern crate alloc;

/// Cell addressing
pub mod addressing;
/// HD44780 instruction set
pub mod command;
/// Display configuration types and builder
pub mod config;
/// Character device and attribute adapters
#[cfg(feature = "std")]
pub mod device;
/// Core display operations
pub mod display;
/// Error types for the driver
pub mod error;
/// Exclusive access to a shared display
#[cfg(feature = "std")]
pub mod gate;
/// Hardware interface abstraction
pub mod interface;
/// Ioctl request codes and payload codec
pub mod ioctl;
/// Supported panel topologies
pub mod topology;

pub use config::{Builder, Config, Pin, Pinout};
pub use display::{Direction, Display, Glyph, State, VerticalDirection};
pub use error::{BuilderError, Error, ErrorKind};
pub use interface::{Bus, DisplayInterface, Interface, Mode};
pub use ioctl::{InvalidRequest, Request, Response};
pub use topology::{BUFFER_CAPACITY, MAX_LINE_LENGTH, Topology};

#[cfg(feature = "std")]
pub use device::{Attribute, DetachError, Device, SeekMode, Session};
#[cfg(feature = "std")]
pub use gate::{Gate, GateGuard, Interrupt};
