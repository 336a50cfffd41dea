//! Ioctl request codes and payload codec
//!
//! Each request has a numeric code built like a Linux `_IOC` value:
//! direction in bits 30-31, payload size in bits 16-29, type `0xF5` in
//! bits 8-15 and a number in bits 0-7. The payloads are the fixed size
//! structs listed below; booleans travel as ASCII `'1'`/`'0'`.
//!
//! | Request        | Dir | Payload                         |
//! |----------------|-----|---------------------------------|
//! | GETCHAR        | R   | 1 byte                          |
//! | SETCHAR        | W   | 1 byte                          |
//! | GETLINE        | R   | 40 bytes                        |
//! | SETLINE        | W   | 40 bytes                        |
//! | GETBUFFER      | R   | 84 bytes                        |
//! | SETBUFFER      | W   | 84 bytes                        |
//! | GETPOSITION    | R   | column, row                     |
//! | SETPOSITION    | W   | column, row                     |
//! | GET/SET flags  | R/W | `'1'` or `'0'`                  |
//! | GETCUSTOMCHAR  | RW  | index, then 8 bitmap rows       |
//! | SETCUSTOMCHAR  | W   | index, 8 bitmap rows            |
//! | SCROLLHZ       | W   | `'0'` left, `'1'` right         |
//! | SCROLLVERT     | W   | u32 direction (0 up), 40 bytes  |
//! | CLEAR/RESET/HOME | - | none                            |
//!
//! [`Request::decode`] validates a payload completely before anything is
//! touched; [`Response::encode`] writes the result back.
//!
//! ## Example
//!
//! ```
//! use lcdi2c::ioctl::{code, Request};
//!
//! let request = Request::decode(code::SETPOSITION, &[3, 1]);
//! assert_eq!(request, Ok(Request::SetPosition { column: 3, row: 1 }));
//!
//! // Glyph indexes above 7 are rejected here, not masked
//! assert!(Request::decode(code::SETCUSTOMCHAR, &[8; 9]).is_err());
//! ```

use crate::display::{Direction, GLYPH_ROWS, Glyph, VerticalDirection};
use crate::error::Error;
use crate::interface::DisplayInterface;
use crate::topology::{BUFFER_CAPACITY, MAX_LINE_LENGTH};

/// Ioctl type byte
pub const IOCTL_TYPE: u32 = 0xF5;

const DIR_NONE: u32 = 0;
const DIR_WRITE: u32 = 1;
const DIR_READ: u32 = 2;

/// Request carrying a struct
const MULTI_BYTE: u32 = 1;
/// Request carrying a single character
const SINGLE_BYTE: u32 = 2;

const fn ioc(dir: u32, kind: u32, number: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | (IOCTL_TYPE << 8) | kind | (number << 2)
}

/// Size of a custom character record: index plus bitmap
pub const CUSTOM_CHAR_LEN: usize = 1 + GLYPH_ROWS;

/// Size of the position struct
pub const POSITION_LEN: usize = 2;

/// Size of the vertical scroll struct: u32 direction plus one line
pub const SCROLL_LEN: usize = 4 + MAX_LINE_LENGTH;

/// Numeric request codes
pub mod code {
    use super::*;

    /// Read the byte under the cursor
    pub const GETCHAR: u32 = ioc(DIR_READ, SINGLE_BYTE, 0x01, 1);
    /// Write a byte at the cursor
    pub const SETCHAR: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x02, 1);
    /// Read the cursor row
    pub const GETLINE: u32 = ioc(DIR_READ, MULTI_BYTE, 0x03, MAX_LINE_LENGTH);
    /// Replace the cursor row
    pub const SETLINE: u32 = ioc(DIR_WRITE, MULTI_BYTE, 0x04, MAX_LINE_LENGTH);
    /// Read the frame buffer
    pub const GETBUFFER: u32 = ioc(DIR_READ, MULTI_BYTE, 0x05, BUFFER_CAPACITY);
    /// Replace the frame buffer
    pub const SETBUFFER: u32 = ioc(DIR_WRITE, MULTI_BYTE, 0x06, BUFFER_CAPACITY);
    /// Read the cursor position
    pub const GETPOSITION: u32 = ioc(DIR_READ, MULTI_BYTE, 0x07, POSITION_LEN);
    /// Move the cursor
    pub const SETPOSITION: u32 = ioc(DIR_WRITE, MULTI_BYTE, 0x08, POSITION_LEN);
    /// Read the backlight state
    pub const GETBACKLIGHT: u32 = ioc(DIR_READ, SINGLE_BYTE, 0x09, 1);
    /// Switch the backlight
    pub const SETBACKLIGHT: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x0A, 1);
    /// Read cursor visibility
    pub const GETCURSOR: u32 = ioc(DIR_READ, SINGLE_BYTE, 0x0B, 1);
    /// Show or hide the cursor
    pub const SETCURSOR: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x0C, 1);
    /// Read the blink state
    pub const GETBLINK: u32 = ioc(DIR_READ, SINGLE_BYTE, 0x0D, 1);
    /// Enable or disable blinking
    pub const SETBLINK: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x0E, 1);
    /// Read a custom character
    pub const GETCUSTOMCHAR: u32 = ioc(DIR_READ | DIR_WRITE, MULTI_BYTE, 0x0F, CUSTOM_CHAR_LEN);
    /// Define a custom character
    pub const SETCUSTOMCHAR: u32 = ioc(DIR_WRITE, MULTI_BYTE, 0x10, CUSTOM_CHAR_LEN);
    /// Shift the display horizontally
    pub const SCROLLHZ: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x11, 1);
    /// Scroll the buffer vertically
    pub const SCROLLVERT: u32 = ioc(DIR_WRITE, SINGLE_BYTE, 0x12, SCROLL_LEN);
    /// Clear the display
    pub const CLEAR: u32 = ioc(DIR_NONE, SINGLE_BYTE, 0x13, 0);
    /// Re-initialize the display
    pub const RESET: u32 = ioc(DIR_NONE, SINGLE_BYTE, 0x14, 0);
    /// Move the cursor home
    pub const HOME: u32 = ioc(DIR_NONE, SINGLE_BYTE, 0x15, 0);
}

/// Request names and codes, in table order
pub const IOCTL_TABLE: [(&str, u32); 21] = [
    ("GETCHAR", code::GETCHAR),
    ("SETCHAR", code::SETCHAR),
    ("GETLINE", code::GETLINE),
    ("SETLINE", code::SETLINE),
    ("GETBUFFER", code::GETBUFFER),
    ("SETBUFFER", code::SETBUFFER),
    ("GETPOSITION", code::GETPOSITION),
    ("SETPOSITION", code::SETPOSITION),
    ("GETBACKLIGHT", code::GETBACKLIGHT),
    ("SETBACKLIGHT", code::SETBACKLIGHT),
    ("GETCURSOR", code::GETCURSOR),
    ("SETCURSOR", code::SETCURSOR),
    ("GETBLINK", code::GETBLINK),
    ("SETBLINK", code::SETBLINK),
    ("GETCUSTOMCHAR", code::GETCUSTOMCHAR),
    ("SETCUSTOMCHAR", code::SETCUSTOMCHAR),
    ("SCROLLHZ", code::SCROLLHZ),
    ("SCROLLVERT", code::SCROLLVERT),
    ("CLEAR", code::CLEAR),
    ("RESET", code::RESET),
    ("HOME", code::HOME),
];

/// Payload size encoded in a request code
pub const fn payload_size(code: u32) -> usize {
    ((code >> 16) & 0x3FFF) as usize
}

/// Why a request payload was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidRequest {
    /// Payload length does not match the request
    PayloadSize {
        /// Size the request requires
        expected: usize,
        /// Size that was provided
        provided: usize,
    },
    /// Custom character index above 7
    GlyphIndex(u8),
    /// Flag or direction byte that is not recognized
    InvalidValue(u8),
    /// Code not in [`IOCTL_TABLE`]
    UnknownRequest(u32),
}

impl core::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PayloadSize { expected, provided } => write!(
                f,
                "Invalid payload size: expected {expected} bytes, provided {provided}"
            ),
            Self::GlyphIndex(index) => write!(f, "Custom character {index} is out of range"),
            Self::InvalidValue(value) => write!(f, "Invalid value byte {value:#04x}"),
            Self::UnknownRequest(code) => write!(f, "Unknown request {code:#010x}"),
        }
    }
}

impl core::error::Error for InvalidRequest {}

impl<I: DisplayInterface> From<InvalidRequest> for Error<I> {
    fn from(error: InvalidRequest) -> Self {
        match error {
            InvalidRequest::PayloadSize { expected, provided } => {
                Error::PayloadSize { expected, provided }
            }
            InvalidRequest::GlyphIndex(index) => Error::GlyphIndex(index),
            InvalidRequest::InvalidValue(value) => Error::InvalidValue(value),
            InvalidRequest::UnknownRequest(code) => Error::UnknownRequest(code),
        }
    }
}

/// Parse a boolean flag byte
///
/// Accepts ASCII `'1'`/`'0'` and raw `1`/`0`.
pub fn parse_flag(byte: u8) -> Result<bool, InvalidRequest> {
    match byte {
        b'1' | 1 => Ok(true),
        b'0' | 0 => Ok(false),
        other => Err(InvalidRequest::InvalidValue(other)),
    }
}

/// Encode a boolean flag byte
pub fn flag_byte(on: bool) -> u8 {
    if on { b'1' } else { b'0' }
}

/// Parse a horizontal scroll direction byte, `'0'` left and `'1'` right
pub fn parse_direction(byte: u8) -> Result<Direction, InvalidRequest> {
    parse_flag(byte).map(|right| if right { Direction::Right } else { Direction::Left })
}

/// Parse a vertical scroll direction byte, `'0'` up and `'1'` down
pub fn parse_vertical(byte: u8) -> Result<VerticalDirection, InvalidRequest> {
    parse_flag(byte).map(|down| {
        if down {
            VerticalDirection::Down
        } else {
            VerticalDirection::Up
        }
    })
}

/// Validate a custom character record of index plus bitmap
pub fn parse_custom_char(record: &[u8]) -> Result<(u8, Glyph), InvalidRequest> {
    let (&index, rows) = record
        .split_first()
        .filter(|_| record.len() == CUSTOM_CHAR_LEN)
        .ok_or(InvalidRequest::PayloadSize {
            expected: CUSTOM_CHAR_LEN,
            provided: record.len(),
        })?;
    if index > 7 {
        return Err(InvalidRequest::GlyphIndex(index));
    }
    let mut bitmap = [0; GLYPH_ROWS];
    bitmap.copy_from_slice(rows);
    Ok((index, bitmap))
}

/// A decoded ioctl request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Byte under the cursor
    GetChar,
    /// Write a byte at the cursor and advance one cell
    SetChar(u8),
    /// Content of the cursor row
    GetLine,
    /// Replace the cursor row
    SetLine([u8; MAX_LINE_LENGTH]),
    /// Whole frame buffer
    GetBuffer,
    /// Replace the frame buffer
    SetBuffer([u8; BUFFER_CAPACITY]),
    /// Cursor position
    GetPosition,
    /// Move the cursor
    SetPosition {
        /// Column
        column: u8,
        /// Row
        row: u8,
    },
    /// Backlight state
    GetBacklight,
    /// Switch the backlight
    SetBacklight(bool),
    /// Cursor visibility
    GetCursor,
    /// Show or hide the cursor
    SetCursor(bool),
    /// Blink state
    GetBlink,
    /// Enable or disable blinking
    SetBlink(bool),
    /// Stored bitmap of a custom character
    GetCustomChar(u8),
    /// Define a custom character
    SetCustomChar {
        /// Glyph slot, 0..=7
        index: u8,
        /// Bitmap rows
        bitmap: Glyph,
    },
    /// Shift the display by one cell
    ScrollHorizontal(Direction),
    /// Scroll the buffer by one row
    ScrollVertical {
        /// Scroll direction
        direction: VerticalDirection,
        /// Line inserted in the vacated row
        line: [u8; MAX_LINE_LENGTH],
    },
    /// Blank the display
    Clear,
    /// Re-run the init handshake
    Reset,
    /// Move the cursor home
    Home,
}

impl Request {
    /// Decode and validate a request
    ///
    /// `payload` is what the caller passed in; for read-only requests it
    /// is ignored, except for GETCUSTOMCHAR which reads the index from its
    /// first byte.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequest`] for an unknown code, a payload of the
    /// wrong size, a glyph index above 7 or an unrecognized flag byte.
    pub fn decode(code: u32, payload: &[u8]) -> Result<Self, InvalidRequest> {
        let request = match code {
            code::GETCHAR => Self::GetChar,
            code::GETLINE => Self::GetLine,
            code::GETBUFFER => Self::GetBuffer,
            code::GETPOSITION => Self::GetPosition,
            code::GETBACKLIGHT => Self::GetBacklight,
            code::GETCURSOR => Self::GetCursor,
            code::GETBLINK => Self::GetBlink,
            code::CLEAR => Self::Clear,
            code::RESET => Self::Reset,
            code::HOME => Self::Home,
            code::SETCHAR => Self::SetChar(sized::<1>(code, payload)?[0]),
            code::SETLINE => Self::SetLine(sized(code, payload)?),
            code::SETBUFFER => Self::SetBuffer(sized(code, payload)?),
            code::SETPOSITION => {
                let [column, row] = sized(code, payload)?;
                Self::SetPosition { column, row }
            }
            code::SETBACKLIGHT => Self::SetBacklight(parse_flag(sized::<1>(code, payload)?[0])?),
            code::SETCURSOR => Self::SetCursor(parse_flag(sized::<1>(code, payload)?[0])?),
            code::SETBLINK => Self::SetBlink(parse_flag(sized::<1>(code, payload)?[0])?),
            code::GETCUSTOMCHAR => {
                let index = *payload.first().ok_or(InvalidRequest::PayloadSize {
                    expected: CUSTOM_CHAR_LEN,
                    provided: 0,
                })?;
                if index > 7 {
                    return Err(InvalidRequest::GlyphIndex(index));
                }
                Self::GetCustomChar(index)
            }
            code::SETCUSTOMCHAR => {
                let (index, bitmap) = parse_custom_char(payload)?;
                Self::SetCustomChar { index, bitmap }
            }
            code::SCROLLHZ => {
                Self::ScrollHorizontal(parse_direction(sized::<1>(code, payload)?[0])?)
            }
            code::SCROLLVERT => {
                let args: [u8; SCROLL_LEN] = sized(code, payload)?;
                let raw = u32::from_ne_bytes([args[0], args[1], args[2], args[3]]);
                let direction = match raw {
                    0 => VerticalDirection::Up,
                    1 => VerticalDirection::Down,
                    other => return Err(InvalidRequest::InvalidValue(other.min(0xFF) as u8)),
                };
                let mut line = [0; MAX_LINE_LENGTH];
                line.copy_from_slice(&args[4..]);
                Self::ScrollVertical { direction, line }
            }
            other => return Err(InvalidRequest::UnknownRequest(other)),
        };
        Ok(request)
    }
}

/// Copy a payload into a fixed array if it has exactly the size in `code`
fn sized<const N: usize>(code: u32, payload: &[u8]) -> Result<[u8; N], InvalidRequest> {
    debug_assert_eq!(payload_size(code), N);
    payload.try_into().map_err(|_| InvalidRequest::PayloadSize {
        expected: N,
        provided: payload.len(),
    })
}

/// Result of an executed request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Nothing to copy back
    None,
    /// One character
    Char(u8),
    /// One row, blank padded to the maximum line length
    Line([u8; MAX_LINE_LENGTH]),
    /// Frame buffer, visible cells first
    Buffer([u8; BUFFER_CAPACITY]),
    /// Cursor position
    Position {
        /// Column
        column: u8,
        /// Row
        row: u8,
    },
    /// Boolean state
    Flag(bool),
    /// Custom character record
    CustomChar {
        /// Glyph slot
        index: u8,
        /// Bitmap rows
        bitmap: Glyph,
    },
}

impl Response {
    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Char(_) | Self::Flag(_) => 1,
            Self::Line(_) => MAX_LINE_LENGTH,
            Self::Buffer(_) => BUFFER_CAPACITY,
            Self::Position { .. } => POSITION_LEN,
            Self::CustomChar { .. } => CUSTOM_CHAR_LEN,
        }
    }

    /// Whether there is nothing to copy back
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the response into `out`
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequest::PayloadSize`] if `out` is too small; `out`
    /// is left untouched in that case.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, InvalidRequest> {
        let len = self.len();
        let provided = out.len();
        let out = out.get_mut(..len).ok_or(InvalidRequest::PayloadSize {
            expected: len,
            provided,
        })?;
        match self {
            Self::None => {}
            Self::Char(byte) => out[0] = *byte,
            Self::Flag(on) => out[0] = flag_byte(*on),
            Self::Line(line) => out.copy_from_slice(line),
            Self::Buffer(buffer) => out.copy_from_slice(buffer),
            Self::Position { column, row } => out.copy_from_slice(&[*column, *row]),
            Self::CustomChar { index, bitmap } => {
                out[0] = *index;
                out[1..].copy_from_slice(bitmap);
            }
        }
        Ok(len)
    }
}
