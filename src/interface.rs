//! Hardware interface abstraction
//!
//! This module provides the [`DisplayInterface`] trait, the single byte
//! transport to the PCF8574 expander, and [`Bus`], which speaks the HD44780
//! 4-bit protocol on top of it.
//!
//! ## Hardware Requirements
//!
//! The expander drives all LCD lines from one 8-bit output register:
//! - **RS**: Register select (instruction/data)
//! - **RW**: Read/write, held low
//! - **EN**: Enable strobe, latches DB4..DB7 on the falling edge
//! - **BL**: Backlight, held with every transfer
//! - **DB4..DB7**: Upper data lines; every byte goes out as two nibbles
//!
//! ## Example
//!
//! ```rust,no_run
//! use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};
//! use lcdi2c::{DisplayInterface, Interface};
//! # use core::convert::Infallible;
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
//! // Create interface for a backpack at 0x27
//! let mut interface = Interface::new(MockI2c, 0x27);
//!
//! // Drive the expander register directly: backlight on, everything else low
//! let _ = interface.write_byte(0x08);
//! ```

use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::config::{Pin, Pinout};

type InterfaceResult<T, E> = core::result::Result<T, E>;

/// Trait for the transport to the I/O expander
///
/// One call puts one byte on the expander's output pins. Byte order must be
/// preserved; failures are reported and never retried by the driver.
///
/// ## Implementing
///
/// For most cases, use the provided [`Interface`] struct. Implement this
/// trait yourself to run the driver over another transport, or to record
/// traffic in tests.
pub trait DisplayInterface {
    /// Error type for interface operations
    ///
    /// Must implement [`Debug`] for error reporting.
    type Error: Debug;

    /// Write one byte to the expander output register
    ///
    /// # Errors
    ///
    /// Returns an error if the bus transfer fails.
    fn write_byte(&mut self, byte: u8) -> InterfaceResult<(), Self::Error>;
}

/// I2C implementation of [`DisplayInterface`]
///
/// Writes each byte as a one byte I2C write transaction to a fixed address.
///
/// ## Type Parameters
///
/// * `I2C` - I2C bus implementing [`I2c`]
#[derive(Debug)]
pub struct Interface<I2C> {
    /// I2C bus
    i2c: I2C,
    /// 7-bit address of the expander
    address: SevenBitAddress,
}

impl<I2C> Interface<I2C>
where
    I2C: I2c,
{
    /// Create a new Interface
    ///
    /// # Arguments
    ///
    /// * `i2c` - I2C bus (must implement [`I2c`])
    /// * `address` - 7-bit address of the PCF8574, usually 0x27 or 0x3F
    pub fn new(i2c: I2C, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    /// Address the interface writes to
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Release the I2C bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> DisplayInterface for Interface<I2C>
where
    I2C: I2c,
    I2C::Error: Debug,
{
    type Error = I2C::Error;

    fn write_byte(&mut self, byte: u8) -> InterfaceResult<(), Self::Error> {
        self.i2c.write(self.address, &[byte])
    }
}

/// Register selected by the RS line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Instruction register (RS low)
    Command,
    /// Data register (RS high)
    Data,
}

/// Enable pulse width in microseconds (HD44780 minimum is 450ns)
pub const ENABLE_PULSE_US: u32 = 1;

/// Settle time after each nibble in microseconds (instructions take 37us)
pub const NIBBLE_SETTLE_US: u32 = 50;

/// HD44780 4-bit bus protocol over a [`DisplayInterface`]
///
/// Owns the transport, the delay source, the pin map and the backlight
/// state. The backlight bit is ORed into every byte that reaches the
/// expander, so switching it never needs an instruction.
#[derive(Debug)]
pub struct Bus<I, D> {
    interface: I,
    delay: D,
    pinout: Pinout,
    backlight: bool,
}

impl<I, D> Bus<I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    /// Create a new bus driver
    pub fn new(interface: I, delay: D, pinout: Pinout, backlight: bool) -> Self {
        Self {
            interface,
            delay,
            pinout,
            backlight,
        }
    }

    /// Put one byte on the expander, with the backlight bit applied
    pub fn write(&mut self, byte: u8) -> InterfaceResult<(), I::Error> {
        let byte = if self.backlight {
            byte | self.pinout.mask(Pin::Backlight)
        } else {
            byte & !self.pinout.mask(Pin::Backlight)
        };
        self.interface.write_byte(byte)
    }

    /// Pulse EN high then low around `byte`
    pub fn strobe(&mut self, byte: u8) -> InterfaceResult<(), I::Error> {
        let enable = self.pinout.mask(Pin::En);
        self.write(byte | enable)?;
        self.delay.delay_us(ENABLE_PULSE_US);
        self.write(byte & !enable)?;
        self.delay.delay_us(NIBBLE_SETTLE_US);
        Ok(())
    }

    /// Present `byte` on the bus and latch it
    ///
    /// `byte` is an expander register value with the nibble already routed
    /// to the data lines. It is written once before the strobe so the data
    /// lines are stable when EN rises.
    pub fn write_nibble(&mut self, byte: u8) -> InterfaceResult<(), I::Error> {
        self.write(byte)?;
        self.strobe(byte)
    }

    /// Send a full byte as two nibbles, high nibble first
    pub fn send(&mut self, value: u8, mode: Mode) -> InterfaceResult<(), I::Error> {
        let rs = match mode {
            Mode::Command => 0,
            Mode::Data => self.pinout.mask(Pin::Rs),
        };
        let high = self.pinout.nibble(value >> 4);
        let low = self.pinout.nibble(value & 0x0F);
        self.write_nibble(high | rs)?;
        self.write_nibble(low | rs)
    }

    /// Send an instruction byte
    pub fn command(&mut self, command: u8) -> InterfaceResult<(), I::Error> {
        self.send(command, Mode::Command)
    }

    /// Send a data byte
    pub fn data(&mut self, data: u8) -> InterfaceResult<(), I::Error> {
        self.send(data, Mode::Data)
    }

    /// Send a bare nibble in instruction mode, used by the reset handshake
    pub fn command_nibble(&mut self, nibble: u8) -> InterfaceResult<(), I::Error> {
        let byte = self.pinout.nibble(nibble);
        self.write_nibble(byte)
    }

    /// Change the backlight state and drive it out immediately
    pub fn set_backlight(&mut self, on: bool) -> InterfaceResult<(), I::Error> {
        self.backlight = on;
        self.write(0)
    }

    /// Current backlight state
    pub fn backlight(&self) -> bool {
        self.backlight
    }

    /// Pin map in use
    pub fn pinout(&self) -> &Pinout {
        &self.pinout
    }

    /// Block for `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Access the underlying interface
    pub fn interface(&self) -> &I {
        &self.interface
    }

    /// Mutable access to the underlying interface
    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    /// Release the interface and delay
    pub fn release(self) -> (I, D) {
        (self.interface, self.delay)
    }
}
