//! Core display operations

use embedded_hal::delay::DelayNs;

use crate::addressing::{
    linear_to_address, linear_to_position, position_to_address, position_to_linear,
    wrap_position,
};
use crate::command::{
    BLINK_ON, CLEAR_DISPLAY, CURSOR_ON, DISPLAY_CONTROL, DISPLAY_ON, FUNCTION_2LINES,
    FUNCTION_SET, INIT_4BIT_NIBBLE, INIT_8BIT_NIBBLE, RETURN_HOME, SET_CGRAM_ADDR,
    SET_DDRAM_ADDR, SHIFT, SHIFT_DISPLAY, SHIFT_RIGHT,
};
use crate::config::{Config, Pinout};
use crate::error::Error;
use crate::interface::{Bus, DisplayInterface};
use crate::topology::{BUFFER_CAPACITY, Topology};

type DisplayResult<I> = core::result::Result<(), Error<I>>;

/// Number of user definable glyphs
pub const GLYPH_COUNT: usize = 8;

/// Rows per glyph bitmap (5 meaningful bits each)
pub const GLYPH_ROWS: usize = 8;

/// One custom character bitmap
pub type Glyph = [u8; GLYPH_ROWS];

/// Byte the frame buffer is filled with on clear
pub const BLANK: u8 = b' ';

const BACKSPACE: u8 = 0x08;

/// Power-on wait before the first bus transfer
const POWER_ON_DELAY_MS: u32 = 50;
/// Wait after driving the backlight alone
const BACKLIGHT_SETTLE_MS: u32 = 100;
/// Gaps after each of the three 8-bit mode nibbles
const HANDSHAKE_DELAYS_MS: [u32; 3] = [5, 5, 15];
/// Execution time of clear and home
const CLEAR_HOME_DELAY_MS: u32 = 2;

/// Lifecycle of a display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// Created, handshake not run yet
    #[default]
    Uninitialized,
    /// Handshake in progress, or aborted by a transport error
    Initializing,
    /// Accepting operations
    Ready,
    /// Powered down; only [`Display::release`] is meaningful
    Finalized,
}

/// Horizontal direction for display shifts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Shift content to the left
    Left,
    /// Shift content to the right
    Right,
}

/// Vertical direction for buffer scrolling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalDirection {
    /// Rows move up, the new line enters at the bottom
    Up,
    /// Rows move down, the new line enters at the top
    Down,
}

/// HD44780 display state machine
///
/// Mirrors the character content of the panel in a host side frame buffer
/// and keeps cursor, backlight, cursor visibility, blink and custom glyphs
/// in sync with the controller. Every operation runs to completion on the
/// bus before it returns.
///
/// The frame buffer models content, not the hardware scroll offset: after
/// [`scroll_horizontal`](Self::scroll_horizontal) the buffer is unchanged.
pub struct Display<I, D> {
    /// 4-bit bus protocol driver
    bus: Bus<I, D>,
    /// Active topology
    topology: Topology,
    /// Lifecycle state
    state: State,
    /// Logical cursor column
    column: u8,
    /// Logical cursor row
    row: u8,
    /// Cursor visibility
    cursor: bool,
    /// Cursor blink
    blink: bool,
    /// Display control register as last sent
    display_control: u8,
    /// Last known content of every cell, in linear order
    buffer: [u8; BUFFER_CAPACITY],
    /// Custom character bitmaps
    glyphs: [Glyph; GLYPH_COUNT],
}

impl<I, D> Display<I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    /// Create a new Display instance
    ///
    /// Nothing is sent until [`init`](Self::init) is called.
    pub fn new(interface: I, delay: D, config: &Config) -> Self {
        Self {
            bus: Bus::new(interface, delay, config.pinout, config.backlight),
            topology: config.topology,
            state: State::Uninitialized,
            column: 0,
            row: 0,
            cursor: config.cursor,
            blink: config.blink,
            display_control: DISPLAY_CONTROL,
            buffer: [BLANK; BUFFER_CAPACITY],
            glyphs: [[0; GLYPH_ROWS]; GLYPH_COUNT],
        }
    }

    /// Run the power-on handshake and bring the display to a known state
    ///
    /// Leaves the buffer blank, the cursor at (0, 0) and cursor/blink set to
    /// the current preferences. Custom glyphs kept in memory are not
    /// uploaded again. Can be called again on a ready display to reset it.
    pub fn init(&mut self) -> DisplayResult<I> {
        log::debug!("lcd: init {} topology", self.topology.name);
        self.state = State::Initializing;
        self.buffer.fill(BLANK);
        self.column = 0;
        self.row = 0;

        self.bus.delay_ms(POWER_ON_DELAY_MS);
        self.bus.write(0).map_err(Error::Interface)?;
        self.bus.delay_ms(BACKLIGHT_SETTLE_MS);

        for delay in HANDSHAKE_DELAYS_MS {
            self.bus
                .command_nibble(INIT_8BIT_NIBBLE)
                .map_err(Error::Interface)?;
            self.bus.delay_ms(delay);
        }
        self.bus
            .command_nibble(INIT_4BIT_NIBBLE)
            .map_err(Error::Interface)?;

        self.send_command(self.function_set())?;

        self.display_control = DISPLAY_CONTROL | DISPLAY_ON;
        self.send_command(self.display_control)?;

        self.clear()?;
        self.home()?;
        self.set_cursor(self.column, self.row)?;
        self.set_cursor_visible(self.cursor)?;
        self.set_blink(self.blink)?;

        self.state = State::Ready;
        Ok(())
    }

    /// Re-run the handshake on an attached display
    ///
    /// Equivalent to [`init`](Self::init); buffer and cursor are reset,
    /// custom glyphs are kept in memory but not uploaded again.
    pub fn reset(&mut self) -> DisplayResult<I> {
        log::debug!("lcd: reset from {:?}", self.state);
        self.init()
    }

    /// Turn the backlight and display off
    ///
    /// The display stays in [`State::Finalized`] until [`init`](Self::init)
    /// is run again.
    pub fn finalize(&mut self) -> DisplayResult<I> {
        log::debug!("lcd: finalize");
        self.set_backlight(false)?;
        self.clear()?;
        self.display_control = DISPLAY_CONTROL;
        self.send_command(self.display_control)?;
        self.state = State::Finalized;
        Ok(())
    }

    fn function_set(&self) -> u8 {
        if self.topology.rows > 1 {
            FUNCTION_SET | FUNCTION_2LINES
        } else {
            FUNCTION_SET
        }
    }

    /// Write one byte at the cursor
    ///
    /// Addresses the cell, sends the byte and mirrors it in the buffer. The
    /// cursor is not advanced.
    pub fn write_char(&mut self, byte: u8) -> DisplayResult<I> {
        let address = position_to_address(&self.topology, self.column, self.row);
        self.send_command(SET_DDRAM_ADDR | address)?;
        self.send_data(byte)?;
        let index = position_to_linear(&self.topology, self.column, self.row);
        self.buffer[index] = byte;
        Ok(())
    }

    /// Move the cursor
    ///
    /// A coordinate past the edge of the panel becomes 0.
    pub fn set_cursor(&mut self, column: u8, row: u8) -> DisplayResult<I> {
        let (column, row) = wrap_position(&self.topology, column, row);
        self.column = column;
        self.row = row;
        self.send_command(SET_DDRAM_ADDR | position_to_address(&self.topology, column, row))
    }

    /// Move the cursor to a linear buffer offset
    pub fn set_cursor_linear(&mut self, index: usize) -> DisplayResult<I> {
        let (column, row) = linear_to_position(&self.topology, index);
        self.set_cursor(column, row)
    }

    /// Print text at the cursor
    ///
    /// `\n` and `\r` move to the next row; on multi-row panels they also
    /// return to column 0. Backspace moves one column left, stopping at 0.
    /// Other bytes are written and advance the cursor, wrapping to the next
    /// row and from the last row to the first. Stops at a NUL byte or after
    /// `columns * rows` input bytes.
    ///
    /// Returns the linear cursor offset after printing.
    pub fn print(&mut self, text: &[u8]) -> Result<usize, Error<I>> {
        let columns = self.topology.columns;
        let rows = self.topology.rows;

        for &byte in text
            .iter()
            .take(self.topology.cells())
            .take_while(|&&byte| byte != 0)
        {
            match byte {
                b'\n' | b'\r' => {
                    // One-line panels keep their column
                    if rows > 1 {
                        self.column = 0;
                    }
                    self.row = (self.row + 1) % rows;
                }
                BACKSPACE => {
                    self.column = self.column.saturating_sub(1);
                }
                _ => {
                    self.write_char(byte)?;
                    self.column = (self.column + 1) % columns;
                    if self.column == 0 {
                        self.row = (self.row + 1) % rows;
                    }
                }
            }
        }

        Ok(self.cursor_offset())
    }

    /// Replay the frame buffer to the controller
    ///
    /// Every visible cell is addressed and written in linear order, then the
    /// cursor is put back where it was.
    pub fn flush_buffer(&mut self) -> DisplayResult<I> {
        let (column, row) = (self.column, self.row);
        for index in 0..self.topology.cells() {
            self.send_command(SET_DDRAM_ADDR | linear_to_address(&self.topology, index))?;
            self.send_data(self.buffer[index])?;
        }
        self.set_cursor(column, row)
    }

    /// Blank the buffer and the panel
    ///
    /// The logical cursor is left where it was; use [`home`](Self::home) to
    /// reset it.
    pub fn clear(&mut self) -> DisplayResult<I> {
        self.buffer.fill(BLANK);
        self.send_command(CLEAR_DISPLAY)?;
        self.bus.delay_ms(CLEAR_HOME_DELAY_MS);
        Ok(())
    }

    /// Move the cursor to (0, 0) and undo any display shift
    pub fn home(&mut self) -> DisplayResult<I> {
        self.column = 0;
        self.row = 0;
        self.send_command(RETURN_HOME)?;
        self.bus.delay_ms(CLEAR_HOME_DELAY_MS);
        Ok(())
    }

    /// Switch the backlight
    pub fn set_backlight(&mut self, on: bool) -> DisplayResult<I> {
        self.bus.set_backlight(on).map_err(Error::Interface)
    }

    /// Show or hide the underline cursor
    pub fn set_cursor_visible(&mut self, on: bool) -> DisplayResult<I> {
        self.cursor = on;
        self.update_control(CURSOR_ON, on)
    }

    /// Enable or disable cursor blinking
    pub fn set_blink(&mut self, on: bool) -> DisplayResult<I> {
        self.blink = on;
        self.update_control(BLINK_ON, on)
    }

    fn update_control(&mut self, flag: u8, on: bool) -> DisplayResult<I> {
        if on {
            self.display_control |= flag;
        } else {
            self.display_control &= !flag;
        }
        self.send_command(self.display_control)
    }

    /// Shift the visible window by one cell
    ///
    /// Hardware only: the frame buffer is untouched.
    pub fn scroll_horizontal(&mut self, direction: Direction) -> DisplayResult<I> {
        let shift = match direction {
            Direction::Left => SHIFT | SHIFT_DISPLAY,
            Direction::Right => SHIFT | SHIFT_DISPLAY | SHIFT_RIGHT,
        };
        self.send_command(shift)
    }

    /// Scroll the buffer by one row and insert `line` in the vacated row
    ///
    /// At most `columns` bytes of `line` are used; a short line is padded
    /// with blanks. The panel is refreshed from the buffer afterwards.
    pub fn scroll_vertical(
        &mut self,
        line: &[u8],
        direction: VerticalDirection,
    ) -> DisplayResult<I> {
        let columns = self.topology.columns as usize;
        let cells = self.topology.cells();

        let vacated = match direction {
            VerticalDirection::Down => {
                self.buffer.copy_within(0..cells - columns, columns);
                0
            }
            VerticalDirection::Up => {
                self.buffer.copy_within(columns..cells, 0);
                cells - columns
            }
        };

        let row = &mut self.buffer[vacated..vacated + columns];
        let used = line.len().min(columns);
        row[..used].copy_from_slice(&line[..used]);
        row[used..].fill(BLANK);

        self.flush_buffer()
    }

    /// Define a custom character
    ///
    /// `index` is masked to 0..=7. The bitmap is uploaded to CGRAM and kept
    /// in memory for [`custom_char`](Self::custom_char).
    pub fn define_custom_char(&mut self, index: u8, bitmap: &Glyph) -> DisplayResult<I> {
        let index = index & 0x07;
        self.send_command(SET_CGRAM_ADDR | (index << 3))?;
        for (row, &bits) in bitmap.iter().enumerate() {
            self.glyphs[index as usize][row] = bits;
            self.send_data(bits)?;
        }
        Ok(())
    }

    /// Stored bitmap of a custom character, `index` masked to 0..=7
    pub fn custom_char(&self, index: u8) -> Glyph {
        self.glyphs[(index & 0x07) as usize]
    }

    /// Overwrite buffer cells starting at a linear offset, wrapping at the end
    ///
    /// Only the buffer changes; call [`flush_buffer`](Self::flush_buffer)
    /// to show the result.
    pub fn store(&mut self, start: usize, bytes: &[u8]) {
        let cells = self.topology.cells();
        for (offset, &byte) in bytes.iter().enumerate() {
            self.buffer[(start + offset) % cells] = byte;
        }
    }

    /// Visible part of the frame buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..self.topology.cells()]
    }

    /// Buffer content of one row, `row` wrapped
    pub fn line(&self, row: u8) -> &[u8] {
        let columns = self.topology.columns as usize;
        let start = (row % self.topology.rows) as usize * columns;
        &self.buffer[start..start + columns]
    }

    /// Byte under the cursor
    pub fn char_at_cursor(&self) -> u8 {
        self.buffer[self.cursor_offset()]
    }

    /// Cursor as `(column, row)`
    pub fn cursor(&self) -> (u8, u8) {
        (self.column, self.row)
    }

    /// Cursor as a linear buffer offset
    pub fn cursor_offset(&self) -> usize {
        position_to_linear(&self.topology, self.column, self.row)
    }

    /// Current backlight state
    pub fn backlight(&self) -> bool {
        self.bus.backlight()
    }

    /// Current cursor visibility
    pub fn cursor_visible(&self) -> bool {
        self.cursor
    }

    /// Current blink state
    pub fn blink(&self) -> bool {
        self.blink
    }

    /// Display control register as last sent
    pub fn display_control(&self) -> u8 {
        self.display_control
    }

    /// Active topology
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Pin map in use
    pub fn pinout(&self) -> &Pinout {
        self.bus.pinout()
    }

    /// Lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// Access the underlying interface
    pub fn interface(&self) -> &I {
        self.bus.interface()
    }

    /// Release the interface and delay
    pub fn release(self) -> (I, D) {
        self.bus.release()
    }

    /// Send a command to the display controller
    fn send_command(&mut self, command: u8) -> DisplayResult<I> {
        self.bus.command(command).map_err(Error::Interface)
    }

    /// Send data to the display controller
    fn send_data(&mut self, data: u8) -> DisplayResult<I> {
        self.bus.data(data).map_err(Error::Interface)
    }
}
