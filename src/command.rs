//! HD44780 instruction set
//!
//! This module defines the instruction bytes understood by the HD44780
//! controller. Instructions are sent with RS low, display data with RS high.
//! Every byte travels over the 4-bit bus as two nibbles, high nibble first.
//!
//! ## Instruction Structure
//!
//! The position of the highest set bit selects the instruction, the lower
//! bits are its flags:
//!
//! | Instruction     | Base   | Flags                                  |
//! |-----------------|--------|----------------------------------------|
//! | Clear display   | `0x01` | -                                      |
//! | Return home     | `0x02` | -                                      |
//! | Entry mode      | `0x04` | increment, shift                       |
//! | Display control | `0x08` | display, cursor, blink                 |
//! | Cursor/display shift | `0x10` | display/cursor, right/left        |
//! | Function set    | `0x20` | 8/4 bit, 2/1 lines, 5x10/5x8 font      |
//! | Set CGRAM addr  | `0x40` | 6-bit address                          |
//! | Set DDRAM addr  | `0x80` | 7-bit address                          |
//!
//! ## Example
//!
//! ```
//! use lcdi2c::command;
//!
//! // Display on, cursor on, no blink
//! let control = command::DISPLAY_CONTROL | command::DISPLAY_ON | command::CURSOR_ON;
//! assert_eq!(control, 0x0E);
//!
//! // Jump to the first cell of the second row of a 16x2 panel
//! assert_eq!(command::SET_DDRAM_ADDR | 0x40, 0xC0);
//! ```

/// Clear display (0x01)
///
/// Fills DDRAM with spaces and resets the address counter. Takes up to
/// 1.52ms inside the controller.
pub const CLEAR_DISPLAY: u8 = 0x01;

/// Return home (0x02)
///
/// Resets the address counter and any display shift. Takes up to 1.52ms.
pub const RETURN_HOME: u8 = 0x02;

/// Entry mode set (0x04)
pub const ENTRY_MODE: u8 = 0x04;

/// Entry mode flag: increment address counter after each write
pub const ENTRY_INCREMENT: u8 = 0x02;

/// Entry mode flag: shift the display instead of the cursor
pub const ENTRY_SHIFT: u8 = 0x01;

/// Display control (0x08)
///
/// Combined with [`DISPLAY_ON`], [`CURSOR_ON`] and [`BLINK_ON`].
/// The bare value turns display, cursor and blink off.
pub const DISPLAY_CONTROL: u8 = 0x08;

/// Display control flag: display on
pub const DISPLAY_ON: u8 = 0x04;

/// Display control flag: underline cursor visible
pub const CURSOR_ON: u8 = 0x02;

/// Display control flag: blinking block cursor
pub const BLINK_ON: u8 = 0x01;

/// Cursor or display shift (0x10)
pub const SHIFT: u8 = 0x10;

/// Shift flag: move the whole display rather than the cursor
pub const SHIFT_DISPLAY: u8 = 0x08;

/// Shift flag: shift to the right (left when clear)
pub const SHIFT_RIGHT: u8 = 0x04;

/// Function set (0x20)
///
/// The bare value selects 4-bit bus, one line, 5x8 font.
pub const FUNCTION_SET: u8 = 0x20;

/// Function set flag: 8-bit bus
pub const FUNCTION_8BIT: u8 = 0x10;

/// Function set flag: two display lines
pub const FUNCTION_2LINES: u8 = 0x08;

/// Function set flag: 5x10 dot font
pub const FUNCTION_5X10: u8 = 0x04;

/// Set CGRAM address (0x40)
///
/// The glyph slot goes in bits 3..5, the glyph row in bits 0..2.
pub const SET_CGRAM_ADDR: u8 = 0x40;

/// Set DDRAM address (0x80)
///
/// The target address goes in bits 0..6.
pub const SET_DDRAM_ADDR: u8 = 0x80;

/// Nibble sent three times to force 8-bit mode during the reset handshake
pub const INIT_8BIT_NIBBLE: u8 = 0x03;

/// Nibble that switches the controller into 4-bit mode
pub const INIT_4BIT_NIBBLE: u8 = 0x02;
