//! Error types for the driver
//!
//! This module defines error types for configuration building ([`BuilderError`])
//! and display operations ([`Error`]).
//!
//! ## Error Types
//!
//! - [`BuilderError`] - Errors during configuration construction
//! - [`Error`] - Runtime errors from display operations and boundary adapters
//!
//! Out of range cursor positions and topology ids are never errors; they
//! are wrapped or clamped. [`Error::kind`] tells callers whether to give
//! up, retry, or fix their payload.
//!
//! ## Example
//!
//! ```
//! use lcdi2c::{Builder, BuilderError};
//!
//! // Two signals on the same expander bit
//! let result = Builder::new().pinout([0, 1, 2, 3, 4, 5, 6, 6]).build();
//! assert!(matches!(result, Err(BuilderError::DuplicatePin { pin: 6 })));
//!
//! // 8-bit addresses are rejected
//! let result = Builder::new().address(0xA0).build();
//! assert!(result.is_err());
//! ```

use crate::interface::DisplayInterface;

/// Coarse classification of [`Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bus write failed; the operation was aborted
    Transport,
    /// Waiting for the display lock was interrupted; retry the request
    Interrupted,
    /// The request payload was rejected before anything was changed
    InvalidArgument,
    /// The display is not initialized or was finalized
    NotReady,
}

/// Errors that can occur when interacting with the display
///
/// Generic over the interface type to preserve the specific error type.
#[derive(Debug)]
pub enum Error<I: DisplayInterface> {
    /// Interface error (I2C)
    ///
    /// Wraps the underlying transport error. The operation that hit it was
    /// aborted; bytes already written stay written.
    Interface(I::Error),
    /// Interrupted while waiting for the display lock
    Interrupted,
    /// Payload has the wrong size for the request
    PayloadSize {
        /// Size the request requires
        expected: usize,
        /// Size that was provided
        provided: usize,
    },
    /// Custom character index outside 0..=7
    GlyphIndex(u8),
    /// Byte that is not a valid flag or direction value
    InvalidValue(u8),
    /// Text that does not parse as a number in range
    InvalidNumber,
    /// Request code not in the request table
    UnknownRequest(u32),
    /// Attribute does not support the requested access
    Unsupported,
    /// Display is not in the ready state
    NotReady,
}

impl<I: DisplayInterface> Error<I> {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Interface(_) => ErrorKind::Transport,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::NotReady => ErrorKind::NotReady,
            Self::PayloadSize { .. }
            | Self::GlyphIndex(_)
            | Self::InvalidValue(_)
            | Self::InvalidNumber
            | Self::UnknownRequest(_)
            | Self::Unsupported => ErrorKind::InvalidArgument,
        }
    }
}

impl<I: DisplayInterface> core::fmt::Display for Error<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Interface(e) => write!(f, "Interface error: {e:?}"),
            Self::Interrupted => write!(f, "Interrupted while waiting for the display"),
            Self::PayloadSize { expected, provided } => write!(
                f,
                "Invalid payload size: expected {expected} bytes, provided {provided}"
            ),
            Self::GlyphIndex(index) => {
                write!(f, "Custom character {index} is out of range, valid range is 0-7")
            }
            Self::InvalidValue(value) => write!(f, "Invalid value byte {value:#04x}"),
            Self::InvalidNumber => write!(f, "Expected a number in range 0-255"),
            Self::UnknownRequest(code) => write!(f, "Unknown request {code:#010x}"),
            Self::Unsupported => write!(f, "Operation not supported"),
            Self::NotReady => write!(f, "Display not ready"),
        }
    }
}

impl<I: DisplayInterface + core::fmt::Debug> core::error::Error for Error<I> {}

/// Errors that can occur when building configuration
///
/// These errors occur during the builder pattern before the display is created.
#[derive(Debug)]
pub enum BuilderError {
    /// Address does not fit in 7 bits
    InvalidAddress(u8),
    /// Pin map entry outside 0..=7
    InvalidPin {
        /// Position in the pin map
        index: usize,
        /// Offending bit number
        pin: u8,
    },
    /// Two signals mapped to the same expander bit
    DuplicatePin {
        /// Bit number used twice
        pin: u8,
    },
    /// Welcome message longer than [`WELCOME_MAX_LEN`](crate::config::WELCOME_MAX_LEN)
    WelcomeTooLong {
        /// Length of the rejected message
        len: usize,
    },
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidAddress(address) => {
                write!(f, "Invalid I2C address {address:#04x} (max 0x7F)")
            }
            Self::InvalidPin { index, pin } => {
                write!(f, "Invalid pin {pin} at position {index} (valid range is 0-7)")
            }
            Self::DuplicatePin { pin } => write!(f, "Pin {pin} assigned more than once"),
            Self::WelcomeTooLong { len } => write!(
                f,
                "Welcome message too long: {len} bytes (max {})",
                crate::config::WELCOME_MAX_LEN
            ),
        }
    }
}

impl core::error::Error for BuilderError {}
