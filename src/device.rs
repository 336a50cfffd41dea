//! Character device and attribute adapters
//!
//! [`Device`] owns one attached display behind a [`Gate`] and exposes it
//! the way a device node does: a byte stream view through [`Session`]s,
//! ioctl style requests, and named text [`Attribute`]s. Every entry point
//! takes the gate first, so concurrent callers are fully serialized.
//!
//! ## Example
//!
//! ```rust,no_run
//! use embedded_hal::delay::DelayNs;
//! use lcdi2c::device::{Attribute, Device};
//! use lcdi2c::gate::Interrupt;
//! use lcdi2c::{Builder, DisplayInterface};
//! # use core::convert::Infallible;
//! # struct MockInterface;
//! # impl DisplayInterface for MockInterface {
//! #     type Error = Infallible;
//! #     fn write_byte(&mut self, _byte: u8) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # struct MockDelay;
//! # impl DelayNs for MockDelay { fn delay_ns(&mut self, _ns: u32) {} }
//! let config = match Builder::new().topology(1).show_welcome(true).build() {
//!     Ok(config) => config,
//!     Err(_) => return,
//! };
//! let Ok(device) = Device::attach(MockInterface, MockDelay, &config) else {
//!     return;
//! };
//! let interrupt = Interrupt::new();
//!
//! let mut session = match device.open(interrupt.clone()) {
//!     Ok(session) => session,
//!     Err(_) => return,
//! };
//! let _ = session.write(b"Hello\nWorld");
//! let _ = device.store(Attribute::Brightness, b"0\n", &interrupt);
//! ```

use core::fmt::Write as _;
use std::string::String;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::config::{Config, Pin, WELCOME_MAX_LEN};
use crate::display::{BLANK, Display, GLYPH_COUNT, State};
use crate::error::Error;
use crate::gate::{Gate, GateGuard, Interrupt};
use crate::interface::DisplayInterface;
use crate::ioctl::{
    CUSTOM_CHAR_LEN, IOCTL_TABLE, InvalidRequest, POSITION_LEN, Request, Response,
    parse_custom_char, parse_direction, parse_flag, parse_vertical,
};
use crate::topology::{BUFFER_CAPACITY, MAX_LINE_LENGTH};

type DeviceResult<T, I> = core::result::Result<T, Error<I>>;

/// Origin for [`Session::seek`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    /// From the first cell
    Set,
    /// From the display cursor
    Current,
    /// From one past the last cell
    End,
}

/// Named text attributes of an attached display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attribute {
    /// Write `1` to re-run the init handshake
    Reset,
    /// Backlight as a decimal 0-255, nonzero is on
    Brightness,
    /// Cursor as two raw bytes, column then row
    Position,
    /// Visible frame buffer; writes start at the cursor and wrap
    Data,
    /// Read-only YAML-like description of the device
    Meta,
    /// Cursor visibility, `1` or `0`
    Cursor,
    /// Cursor blink, `1` or `0`
    Blink,
    /// Write `1` to move the cursor home
    Home,
    /// Write `1` to clear the display
    Clear,
    /// Write `0` to shift left, `1` to shift right
    ScrollHorizontal,
    /// Direction byte (`0` up, `1` down) followed by the new line
    ScrollVertical,
    /// All glyphs as 9-byte records of index and bitmap
    CustomChar,
    /// Byte under the cursor; writing advances the cursor
    Character,
    /// Read-only content of the cursor row
    Line,
}

impl Attribute {
    /// Every attribute, in listing order
    pub const ALL: [Self; 14] = [
        Self::Reset,
        Self::Brightness,
        Self::Position,
        Self::Data,
        Self::Meta,
        Self::Cursor,
        Self::Blink,
        Self::Home,
        Self::Clear,
        Self::ScrollHorizontal,
        Self::ScrollVertical,
        Self::CustomChar,
        Self::Character,
        Self::Line,
    ];

    /// Attribute file name
    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Brightness => "brightness",
            Self::Position => "position",
            Self::Data => "data",
            Self::Meta => "meta",
            Self::Cursor => "cursor",
            Self::Blink => "blink",
            Self::Home => "home",
            Self::Clear => "clear",
            Self::ScrollHorizontal => "scrollhz",
            Self::ScrollVertical => "scrollvert",
            Self::CustomChar => "customchar",
            Self::Character => "character",
            Self::Line => "line",
        }
    }

    /// Look up an attribute by file name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attribute| attribute.name() == name)
    }

    /// Whether [`Device::show`] supports this attribute
    pub fn readable(self) -> bool {
        !matches!(
            self,
            Self::Reset | Self::Home | Self::Clear | Self::ScrollHorizontal | Self::ScrollVertical
        )
    }

    /// Whether [`Device::store`] supports this attribute
    pub fn writable(self) -> bool {
        !matches!(self, Self::Meta | Self::Line)
    }
}

/// An attached display shared between callers
///
/// Created by [`attach`](Self::attach), which runs the init handshake, and
/// torn down by [`detach`](Self::detach), which powers the panel down.
pub struct Device<I, D> {
    display: Gate<Display<I, D>>,
    bus_number: u8,
    address: u8,
    show_welcome: bool,
    welcome: heapless::String<WELCOME_MAX_LEN>,
    open_count: AtomicUsize,
}

/// A failed [`Device::detach`]
pub struct DetachError<I: DisplayInterface, D> {
    /// Why the display could not be powered down
    pub error: Error<I>,
    /// Interface and delay taken back from the display
    ///
    /// `None` only if a guard on the display was leaked.
    pub released: Option<(I, D)>,
}

impl<I: DisplayInterface, D> core::fmt::Debug for DetachError<I, D>
where
    Error<I>: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DetachError")
            .field("error", &self.error)
            .field("released", &self.released.is_some())
            .finish()
    }
}

impl<I: DisplayInterface, D> core::fmt::Display for DetachError<I, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Detach failed: {}", self.error)
    }
}

impl<I, D> Device<I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    /// Initialize the display and make it available
    ///
    /// Prints the welcome message when the configuration asks for it.
    pub fn attach(interface: I, delay: D, config: &Config) -> DeviceResult<Self, I> {
        let mut display = Display::new(interface, delay, config);
        display.init().inspect_err(|e| log::warn!("lcd: attach failed: {e}"))?;
        if config.show_welcome {
            display.print(config.welcome.as_bytes())?;
        }
        log::debug!(
            "lcd: {}x{} display attached on bus {} at {:#04x}",
            config.topology.columns,
            config.topology.rows,
            config.bus_number,
            config.address
        );

        Ok(Self {
            display: Gate::new(display),
            bus_number: config.bus_number,
            address: config.address,
            show_welcome: config.show_welcome,
            welcome: config.welcome.clone(),
            open_count: AtomicUsize::new(0),
        })
    }

    /// Power the display down and hand back the interface and delay
    ///
    /// Consuming `self` guarantees no session is still open.
    ///
    /// # Errors
    ///
    /// If powering down fails the interface and delay are still released
    /// and returned inside the [`DetachError`].
    pub fn detach(self) -> Result<(I, D), DetachError<I, D>> {
        let Some(mut display) = self.display.into_inner() else {
            return Err(DetachError {
                error: Error::NotReady,
                released: None,
            });
        };
        match display.finalize() {
            Ok(()) => {
                log::debug!("lcd: display detached");
                Ok(display.release())
            }
            Err(error) => {
                log::warn!("lcd: finalize failed: {error}");
                Err(DetachError {
                    error,
                    released: Some(display.release()),
                })
            }
        }
    }

    /// Open a stream session
    ///
    /// `interrupt` aborts this and every later wait of the session.
    pub fn open(&self, interrupt: Interrupt) -> DeviceResult<Session<'_, I, D>, I> {
        let _display = self.lock(&interrupt)?;
        let count = self.open_count.fetch_add(1, Ordering::SeqCst) + 1;
        log::trace!("lcd: open, {count} sessions");
        Ok(Session {
            device: self,
            interrupt,
            position: 0,
        })
    }

    /// Number of open sessions
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// I2C bus number the display was attached on
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    /// I2C address of the expander
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Welcome message configured at attach time
    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    /// Take exclusive access to a ready display
    pub fn lock(
        &self,
        interrupt: &Interrupt,
    ) -> DeviceResult<GateGuard<'_, Display<I, D>>, I> {
        let display = self
            .display
            .lock_interruptible(interrupt)
            .map_err(|_| Error::Interrupted)?;
        if display.state() != State::Ready {
            return Err(Error::NotReady);
        }
        Ok(display)
    }

    /// Take exclusive access for a reset, which also recovers a display
    /// whose last handshake failed
    fn lock_for_reset(
        &self,
        interrupt: &Interrupt,
    ) -> DeviceResult<GateGuard<'_, Display<I, D>>, I> {
        let display = self
            .display
            .lock_interruptible(interrupt)
            .map_err(|_| Error::Interrupted)?;
        match display.state() {
            State::Ready | State::Initializing => Ok(display),
            State::Uninitialized | State::Finalized => Err(Error::NotReady),
        }
    }

    fn close(&self) {
        // Release must not fail, so it waits without an interrupt
        let _display = self.display.lock();
        let count = self.open_count.fetch_sub(1, Ordering::SeqCst) - 1;
        log::trace!("lcd: release, {count} sessions");
    }

    /// Execute a decoded request
    pub fn ioctl(&self, request: Request, interrupt: &Interrupt) -> DeviceResult<Response, I> {
        log::trace!("lcd: ioctl {request:?}");
        let mut display = if request == Request::Reset {
            self.lock_for_reset(interrupt)?
        } else {
            self.lock(interrupt)?
        };
        execute(&mut display, request).inspect_err(|e| log::warn!("lcd: ioctl failed: {e}"))
    }

    /// Decode, execute and encode a request by numeric code
    ///
    /// `payload` carries the request struct in and the response struct
    /// out. Returns the number of bytes written back.
    pub fn ioctl_raw(
        &self,
        code: u32,
        payload: &mut [u8],
        interrupt: &Interrupt,
    ) -> DeviceResult<usize, I> {
        let request = Request::decode(code, payload).map_err(|e| rejected(code, e))?;
        let response = self.ioctl(request, interrupt)?;
        response.encode(payload).map_err(|e| rejected(code, e))
    }

    /// Read an attribute
    pub fn show(&self, attribute: Attribute, interrupt: &Interrupt) -> DeviceResult<Vec<u8>, I> {
        if !attribute.readable() {
            return Err(Error::Unsupported);
        }
        let display = self.lock(interrupt)?;
        let shown = match attribute {
            Attribute::Brightness => Vec::from(if display.backlight() { "1" } else { "0" }),
            Attribute::Position => {
                let (column, row) = display.cursor();
                Vec::from([column, row])
            }
            Attribute::Data => display.buffer().to_vec(),
            Attribute::Meta => self.meta(&display).into_bytes(),
            Attribute::Cursor => Vec::from([flag(display.cursor_visible())]),
            Attribute::Blink => Vec::from([flag(display.blink())]),
            Attribute::CustomChar => (0..GLYPH_COUNT as u8)
                .flat_map(|index| {
                    core::iter::once(index).chain(display.custom_char(index))
                })
                .collect(),
            Attribute::Character => Vec::from([display.char_at_cursor()]),
            Attribute::Line => display.line(display.cursor().1).to_vec(),
            Attribute::Reset
            | Attribute::Home
            | Attribute::Clear
            | Attribute::ScrollHorizontal
            | Attribute::ScrollVertical => return Err(Error::Unsupported),
        };
        Ok(shown)
    }

    /// Write an attribute
    ///
    /// Returns the number of input bytes consumed. The input is validated
    /// completely before the display is touched.
    pub fn store(
        &self,
        attribute: Attribute,
        input: &[u8],
        interrupt: &Interrupt,
    ) -> DeviceResult<usize, I> {
        if !attribute.writable() {
            return Err(Error::Unsupported);
        }
        log::trace!("lcd: store {}", attribute.name());
        self.store_checked(attribute, input, interrupt)
            .inspect_err(|e| log::warn!("lcd: store {} failed: {e}", attribute.name()))
    }

    fn store_checked(
        &self,
        attribute: Attribute,
        input: &[u8],
        interrupt: &Interrupt,
    ) -> DeviceResult<usize, I> {
        match attribute {
            Attribute::Reset => {
                if flag_input(input)? {
                    self.lock_for_reset(interrupt)?.reset()?;
                }
            }
            Attribute::Brightness => {
                let level = parse_level(input)?;
                self.lock(interrupt)?.set_backlight(level != 0)?;
            }
            Attribute::Position => {
                let [column, row] = input
                    .get(..POSITION_LEN)
                    .and_then(|pair| <[u8; POSITION_LEN]>::try_from(pair).ok())
                    .ok_or(Error::PayloadSize {
                        expected: POSITION_LEN,
                        provided: input.len(),
                    })?;
                self.lock(interrupt)?.set_cursor(column, row)?;
                return Ok(POSITION_LEN);
            }
            Attribute::Data => {
                if !input.is_empty() {
                    let mut display = self.lock(interrupt)?;
                    let start = display.cursor_offset();
                    display.store(start, input);
                    display.flush_buffer()?;
                }
            }
            Attribute::Cursor => {
                let on = flag_input(input)?;
                self.lock(interrupt)?.set_cursor_visible(on)?;
            }
            Attribute::Blink => {
                let on = flag_input(input)?;
                self.lock(interrupt)?.set_blink(on)?;
            }
            Attribute::Home => {
                if flag_input(input)? {
                    self.lock(interrupt)?.home()?;
                }
            }
            Attribute::Clear => {
                if flag_input(input)? {
                    self.lock(interrupt)?.clear()?;
                }
            }
            Attribute::ScrollHorizontal => {
                let direction = parse_direction(single_byte(input)?)?;
                self.lock(interrupt)?.scroll_horizontal(direction)?;
            }
            Attribute::ScrollVertical => {
                let (&first, line) = input.split_first().ok_or(Error::PayloadSize {
                    expected: 1,
                    provided: 0,
                })?;
                let direction = parse_vertical(first)?;
                let line = line.strip_suffix(b"\n").unwrap_or(line);
                self.lock(interrupt)?.scroll_vertical(line, direction)?;
            }
            Attribute::CustomChar => {
                if input.is_empty() || input.len() % CUSTOM_CHAR_LEN != 0 {
                    return Err(Error::PayloadSize {
                        expected: input.len().div_ceil(CUSTOM_CHAR_LEN).max(1) * CUSTOM_CHAR_LEN,
                        provided: input.len(),
                    });
                }
                let glyphs = input
                    .chunks_exact(CUSTOM_CHAR_LEN)
                    .map(parse_custom_char)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut display = self.lock(interrupt)?;
                for (index, bitmap) in &glyphs {
                    display.define_custom_char(*index, bitmap)?;
                }
            }
            Attribute::Character => {
                let byte = *input.first().ok_or(Error::PayloadSize {
                    expected: 1,
                    provided: 0,
                })?;
                let mut display = self.lock(interrupt)?;
                display.write_char(byte)?;
                advance(&mut display)?;
                return Ok(1);
            }
            Attribute::Meta | Attribute::Line => return Err(Error::Unsupported),
        }
        Ok(input.len())
    }

    fn meta(&self, display: &Display<I, D>) -> String {
        let topology = display.topology();
        let pinout = display.pinout();
        let mut meta = String::new();

        let _ = writeln!(meta, "---\nmetadata:");
        let _ = writeln!(meta, "       show welcome screen: {}", u8::from(self.show_welcome));
        let _ = writeln!(meta, "       topology: {}", topology.id);
        let _ = writeln!(meta, "       topology name: {}", topology.name);
        let _ = writeln!(meta, "       rows: {}", topology.rows);
        let _ = writeln!(meta, "       columns: {}", topology.columns);
        let _ = write!(meta, "       rows-offsets: {{");
        for (row, address) in topology.row_addresses().iter().enumerate() {
            let _ = write!(meta, "{row}: {address:#04x}, ");
        }
        let _ = writeln!(meta, "}}");
        let _ = writeln!(
            meta,
            "       pins: {{rs: {}, rw: {}, e: {}, backlight: {},}}",
            pinout.pin(Pin::Rs),
            pinout.pin(Pin::Rw),
            pinout.pin(Pin::En),
            pinout.pin(Pin::Backlight)
        );
        let _ = writeln!(
            meta,
            "       data-lines: {{4: {}, 5: {}, 6: {}, 7: {},}}",
            pinout.pin(Pin::Db4),
            pinout.pin(Pin::Db5),
            pinout.pin(Pin::Db6),
            pinout.pin(Pin::Db7)
        );
        let _ = writeln!(meta, "       busno: {}", self.bus_number);
        let _ = writeln!(meta, "       reg: {:#04X}", self.address);
        let _ = writeln!(meta, "       ioctls:");
        for (name, code) in IOCTL_TABLE {
            let _ = writeln!(meta, "                 {name}: {code:#010X}");
        }
        let _ = writeln!(meta, "...");
        meta
    }
}

/// A stream view of the frame buffer with its own position
///
/// Closing happens on drop.
pub struct Session<'a, I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    device: &'a Device<I, D>,
    interrupt: Interrupt,
    position: usize,
}

impl<I, D> Session<'_, I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    /// Copy frame buffer bytes from the stream position into `out`
    ///
    /// Returns 0 once the position is at the end of the buffer. The display
    /// cursor follows the new position.
    pub fn read(&mut self, out: &mut [u8]) -> DeviceResult<usize, I> {
        let mut display = self.device.lock(&self.interrupt)?;
        let buffer = display.buffer();
        let cells = buffer.len();
        if self.position >= cells {
            return Ok(0);
        }

        let count = out.len().min(cells - self.position);
        out[..count].copy_from_slice(&buffer[self.position..self.position + count]);
        self.position += count;
        display.set_cursor_linear(self.position % cells)?;
        Ok(count)
    }

    /// Print `text` at the display cursor
    ///
    /// Returns the linear cursor offset after printing, which also becomes
    /// the stream position.
    pub fn write(&mut self, text: &[u8]) -> DeviceResult<usize, I> {
        let mut display = self.device.lock(&self.interrupt)?;
        let offset = display
            .print(text)
            .inspect_err(|e| log::warn!("lcd: write failed: {e}"))?;
        self.position = offset;
        Ok(offset)
    }

    /// Move the display cursor and stream position
    ///
    /// The target wraps modulo the number of cells. Returns the cursor
    /// offset before the move.
    pub fn seek(&mut self, offset: i64, mode: SeekMode) -> DeviceResult<usize, I> {
        let mut display = self.device.lock(&self.interrupt)?;
        let cells = display.topology().cells() as i64;
        let previous = display.cursor_offset();
        let base = match mode {
            SeekMode::Set => 0,
            SeekMode::Current => previous as i64,
            SeekMode::End => cells,
        };
        // Reduce first so huge offsets cannot overflow the sum
        let target = (base + offset.rem_euclid(cells)).rem_euclid(cells) as usize;
        display.set_cursor_linear(target)?;
        self.position = target;
        Ok(previous)
    }

    /// Execute a request by numeric code, see [`Device::ioctl_raw`]
    pub fn ioctl(&mut self, code: u32, payload: &mut [u8]) -> DeviceResult<usize, I> {
        self.device.ioctl_raw(code, payload, &self.interrupt)
    }

    /// Current stream position
    pub fn position(&self) -> usize {
        self.position
    }
}

impl<I, D> Drop for Session<'_, I, D>
where
    I: DisplayInterface,
    D: DelayNs,
{
    fn drop(&mut self) {
        self.device.close();
    }
}

fn execute<I, D>(display: &mut Display<I, D>, request: Request) -> DeviceResult<Response, I>
where
    I: DisplayInterface,
    D: DelayNs,
{
    let columns = display.topology().columns as usize;
    let response = match request {
        Request::GetChar => Response::Char(display.char_at_cursor()),
        Request::SetChar(byte) => {
            display.write_char(byte)?;
            advance(display)?;
            Response::None
        }
        Request::GetLine => {
            let mut line = [BLANK; MAX_LINE_LENGTH];
            let row = display.line(display.cursor().1);
            line[..row.len()].copy_from_slice(row);
            Response::Line(line)
        }
        Request::SetLine(line) => {
            let start = display.cursor().1 as usize * columns;
            display.store(start, &padded_line(&line, columns)[..columns]);
            display.flush_buffer()?;
            Response::None
        }
        Request::GetBuffer => {
            let mut buffer = [BLANK; BUFFER_CAPACITY];
            let cells = display.buffer();
            buffer[..cells.len()].copy_from_slice(cells);
            Response::Buffer(buffer)
        }
        Request::SetBuffer(buffer) => {
            let cells = display.topology().cells();
            display.store(0, &buffer[..cells]);
            display.flush_buffer()?;
            Response::None
        }
        Request::GetPosition => {
            let (column, row) = display.cursor();
            Response::Position { column, row }
        }
        Request::SetPosition { column, row } => {
            display.set_cursor(column, row)?;
            Response::None
        }
        Request::GetBacklight => Response::Flag(display.backlight()),
        Request::SetBacklight(on) => {
            display.set_backlight(on)?;
            Response::None
        }
        Request::GetCursor => Response::Flag(display.cursor_visible()),
        Request::SetCursor(on) => {
            display.set_cursor_visible(on)?;
            Response::None
        }
        Request::GetBlink => Response::Flag(display.blink()),
        Request::SetBlink(on) => {
            display.set_blink(on)?;
            Response::None
        }
        Request::GetCustomChar(index) => Response::CustomChar {
            index,
            bitmap: display.custom_char(index),
        },
        Request::SetCustomChar { index, bitmap } => {
            display.define_custom_char(index, &bitmap)?;
            Response::None
        }
        Request::ScrollHorizontal(direction) => {
            display.scroll_horizontal(direction)?;
            Response::None
        }
        Request::ScrollVertical { direction, line } => {
            let line = &line[..line.iter().position(|&b| b == 0).unwrap_or(line.len())];
            display.scroll_vertical(line, direction)?;
            Response::None
        }
        Request::Clear => {
            display.clear()?;
            Response::None
        }
        Request::Reset => {
            display.reset()?;
            Response::None
        }
        Request::Home => {
            display.home()?;
            Response::None
        }
    };
    Ok(response)
}

/// Move the cursor one cell forward, wrapping at the end of the panel
fn advance<I, D>(display: &mut Display<I, D>) -> DeviceResult<(), I>
where
    I: DisplayInterface,
    D: DelayNs,
{
    let next = display.cursor_offset() + 1;
    display.set_cursor_linear(next)
}

/// Text of a fixed size line up to the first NUL, blank padded
fn padded_line(line: &[u8; MAX_LINE_LENGTH], columns: usize) -> [u8; MAX_LINE_LENGTH] {
    let mut padded = [BLANK; MAX_LINE_LENGTH];
    let len = line
        .iter()
        .take(columns)
        .position(|&b| b == 0)
        .unwrap_or(columns.min(MAX_LINE_LENGTH));
    padded[..len].copy_from_slice(&line[..len]);
    padded
}

fn rejected<I: DisplayInterface>(code: u32, error: InvalidRequest) -> Error<I> {
    log::warn!("lcd: rejected request {code:#010x}: {error}");
    error.into()
}

fn flag(on: bool) -> u8 {
    if on { b'1' } else { b'0' }
}

/// Exactly one byte, optionally followed by a newline
fn single_byte(input: &[u8]) -> Result<u8, InvalidRequest> {
    match input.strip_suffix(b"\n").unwrap_or(input) {
        [byte] => Ok(*byte),
        other => Err(InvalidRequest::PayloadSize {
            expected: 1,
            provided: other.len(),
        }),
    }
}

fn flag_input(input: &[u8]) -> Result<bool, InvalidRequest> {
    parse_flag(single_byte(input)?)
}

/// Decimal 0-255 with optional surrounding whitespace
fn parse_level<I: DisplayInterface>(input: &[u8]) -> DeviceResult<u8, I> {
    core::str::from_utf8(input)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or(Error::InvalidNumber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Builder;
    use crate::ioctl::code;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, Default)]
    struct SharedRecorder {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl DisplayInterface for SharedRecorder {
        type Error = core::convert::Infallible;

        fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
            self.bytes.lock().unwrap().push(byte);
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn attach(topology: u32) -> Device<SharedRecorder, NoDelay> {
        let config = Builder::new()
            .topology(topology)
            .cursor(false)
            .blink(false)
            .build()
            .unwrap();
        Device::attach(SharedRecorder::default(), NoDelay, &config).unwrap()
    }

    #[test]
    fn test_attach_prints_welcome() {
        let config = Builder::new()
            .show_welcome(true)
            .welcome("Hi\nthere")
            .build()
            .unwrap();
        let device = Device::attach(SharedRecorder::default(), NoDelay, &config).unwrap();
        let data = device.show(Attribute::Data, &Interrupt::new()).unwrap();
        assert_eq!(&data[..2], b"Hi");
        assert_eq!(&data[16..21], b"there");
        assert_eq!(device.welcome(), "Hi\nthere");
    }

    #[test]
    fn test_open_and_release_count_sessions() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        let first = device.open(interrupt.clone()).unwrap();
        let second = device.open(interrupt).unwrap();
        assert_eq!(device.open_count(), 2);
        drop(first);
        assert_eq!(device.open_count(), 1);
        drop(second);
        assert_eq!(device.open_count(), 0);
    }

    #[test]
    fn test_read_reaches_end_of_file() {
        let device = attach(7); // 8x2
        let mut session = device.open(Interrupt::new()).unwrap();
        session.write(b"abcdefghij").unwrap();
        session.seek(0, SeekMode::Set).unwrap();

        let mut out = [0u8; 10];
        assert_eq!(session.read(&mut out).unwrap(), 10);
        assert_eq!(&out, b"abcdefghij");
        assert_eq!(session.read(&mut out).unwrap(), 6);
        assert_eq!(&out[..6], b"      ");
        assert_eq!(session.read(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_read_moves_display_cursor() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        let mut session = device.open(interrupt.clone()).unwrap();
        let mut out = [0u8; 18];
        session.read(&mut out).unwrap();
        let position = device.show(Attribute::Position, &interrupt).unwrap();
        assert_eq!(position, [2, 1]);
    }

    #[test]
    fn test_write_returns_cursor_offset() {
        let device = attach(4);
        let mut session = device.open(Interrupt::new()).unwrap();
        assert_eq!(session.write(b"ab\ncd").unwrap(), 18);
        assert_eq!(session.position(), 18);
    }

    #[test]
    fn test_seek_wraps_and_returns_previous() {
        let device = attach(4); // 32 cells
        let mut session = device.open(Interrupt::new()).unwrap();
        assert_eq!(session.seek(5, SeekMode::Set).unwrap(), 0);
        assert_eq!(session.seek(30, SeekMode::Current).unwrap(), 5);
        assert_eq!(session.position(), 3);
        assert_eq!(session.seek(-1, SeekMode::End).unwrap(), 3);
        assert_eq!(session.position(), 31);
        assert_eq!(session.seek(-40, SeekMode::Set).unwrap(), 31);
        assert_eq!(session.position(), 24);
    }

    #[test]
    fn test_seek_extreme_offsets_wrap() {
        let device = attach(4); // 32 cells
        let mut session = device.open(Interrupt::new()).unwrap();
        session.seek(5, SeekMode::Set).unwrap();

        // i64::MAX is 31 past a multiple of 32, i64::MIN is a multiple
        assert_eq!(session.seek(i64::MAX, SeekMode::Current).unwrap(), 5);
        assert_eq!(session.position(), 4);
        assert_eq!(session.seek(i64::MIN, SeekMode::Current).unwrap(), 4);
        assert_eq!(session.position(), 4);
        assert_eq!(session.seek(i64::MAX, SeekMode::End).unwrap(), 4);
        assert_eq!(session.position(), 31);
        assert_eq!(session.seek(i64::MIN, SeekMode::End).unwrap(), 31);
        assert_eq!(session.position(), 0);
        assert_eq!(session.seek(i64::MAX, SeekMode::Set).unwrap(), 0);
        assert_eq!(session.position(), 31);
        assert_eq!(session.seek(i64::MIN, SeekMode::Set).unwrap(), 31);
        assert_eq!(session.position(), 0);
    }

    #[test]
    fn test_ioctl_set_char_advances_and_wraps() {
        let device = attach(7); // 8x2
        let interrupt = Interrupt::new();
        let mut position = [7, 1];
        device
            .ioctl_raw(code::SETPOSITION, &mut position, &interrupt)
            .unwrap();
        device
            .ioctl_raw(code::SETCHAR, &mut [b'Z'], &interrupt)
            .unwrap();

        let mut out = [0u8; 2];
        assert_eq!(
            device
                .ioctl_raw(code::GETPOSITION, &mut out, &interrupt)
                .unwrap(),
            2
        );
        assert_eq!(out, [0, 0]);
        assert_eq!(device.show(Attribute::Data, &interrupt).unwrap()[15], b'Z');
    }

    #[test]
    fn test_ioctl_line_round_trip() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device
            .ioctl(Request::SetPosition { column: 3, row: 1 }, &interrupt)
            .unwrap();

        let mut line = [0u8; MAX_LINE_LENGTH];
        line[..5].copy_from_slice(b"hello");
        device
            .ioctl_raw(code::SETLINE, &mut line, &interrupt)
            .unwrap();

        let mut out = [0u8; MAX_LINE_LENGTH];
        device.ioctl_raw(code::GETLINE, &mut out, &interrupt).unwrap();
        assert_eq!(&out[..16], b"hello           ");
        assert!(out[16..].iter().all(|&b| b == BLANK));
    }

    #[test]
    fn test_ioctl_buffer_round_trip() {
        let device = attach(7); // 16 cells
        let interrupt = Interrupt::new();
        let mut buffer = [b'#'; BUFFER_CAPACITY];
        buffer[..4].copy_from_slice(b"8x2!");
        device
            .ioctl_raw(code::SETBUFFER, &mut buffer, &interrupt)
            .unwrap();

        let mut out = [0u8; BUFFER_CAPACITY];
        device
            .ioctl_raw(code::GETBUFFER, &mut out, &interrupt)
            .unwrap();
        assert_eq!(&out[..4], b"8x2!");
        assert!(out[4..16].iter().all(|&b| b == b'#'));
        assert!(out[16..].iter().all(|&b| b == BLANK));
    }

    #[test]
    fn test_ioctl_flags_use_ascii() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device
            .ioctl_raw(code::SETBLINK, &mut [b'1'], &interrupt)
            .unwrap();
        let mut out = [0u8];
        device.ioctl_raw(code::GETBLINK, &mut out, &interrupt).unwrap();
        assert_eq!(out, [b'1']);
        device
            .ioctl_raw(code::GETCURSOR, &mut out, &interrupt)
            .unwrap();
        assert_eq!(out, [b'0']);
    }

    #[test]
    fn test_ioctl_custom_char_round_trip() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        let mut record = [5, 0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11, 0x00];
        device
            .ioctl_raw(code::SETCUSTOMCHAR, &mut record, &interrupt)
            .unwrap();

        let mut out = [5, 0, 0, 0, 0, 0, 0, 0, 0];
        device
            .ioctl_raw(code::GETCUSTOMCHAR, &mut out, &interrupt)
            .unwrap();
        assert_eq!(out, record);
    }

    #[test]
    fn test_ioctl_rejects_before_touching_bus() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        let recorder = device.lock(&interrupt).unwrap().interface().clone();
        let before = recorder.bytes.lock().unwrap().len();

        let mut record = [8u8; 9];
        let result = device.ioctl_raw(code::SETCUSTOMCHAR, &mut record, &interrupt);
        assert!(matches!(result, Err(Error::GlyphIndex(8))));
        let result = device.ioctl_raw(code::SETPOSITION, &mut [1], &interrupt);
        assert_eq!(result.unwrap_err().kind(), crate::ErrorKind::InvalidArgument);

        assert_eq!(recorder.bytes.lock().unwrap().len(), before);
    }

    #[test]
    fn test_interrupted_ioctl() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        interrupt.raise();
        let result = device.ioctl(Request::Clear, &interrupt);
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn test_brightness_attribute() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        assert_eq!(device.show(Attribute::Brightness, &interrupt).unwrap(), b"1");
        assert_eq!(
            device.store(Attribute::Brightness, b"0\n", &interrupt).unwrap(),
            2
        );
        assert_eq!(device.show(Attribute::Brightness, &interrupt).unwrap(), b"0");
        device.store(Attribute::Brightness, b"200", &interrupt).unwrap();
        assert_eq!(device.show(Attribute::Brightness, &interrupt).unwrap(), b"1");

        assert!(matches!(
            device.store(Attribute::Brightness, b"256", &interrupt),
            Err(Error::InvalidNumber)
        ));
        assert!(matches!(
            device.store(Attribute::Brightness, b"on", &interrupt),
            Err(Error::InvalidNumber)
        ));
    }

    #[test]
    fn test_position_attribute() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        assert_eq!(
            device.store(Attribute::Position, &[4, 1, 9], &interrupt).unwrap(),
            2
        );
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [4, 1]);
        assert!(matches!(
            device.store(Attribute::Position, &[4], &interrupt),
            Err(Error::PayloadSize {
                expected: 2,
                provided: 1
            })
        ));
    }

    #[test]
    fn test_data_attribute_writes_from_cursor_and_wraps() {
        let device = attach(7); // 8x2
        let interrupt = Interrupt::new();
        device.store(Attribute::Position, &[6, 1], &interrupt).unwrap();
        device.store(Attribute::Data, b"WXYZ", &interrupt).unwrap();
        let data = device.show(Attribute::Data, &interrupt).unwrap();
        assert_eq!(data.len(), 16);
        assert_eq!(&data[14..], b"WX");
        assert_eq!(&data[..2], b"YZ");
        // Cursor is restored after the flush
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [6, 1]);
    }

    #[test]
    fn test_flag_attributes() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device.store(Attribute::Cursor, b"1\n", &interrupt).unwrap();
        device.store(Attribute::Blink, b"1", &interrupt).unwrap();
        assert_eq!(device.show(Attribute::Cursor, &interrupt).unwrap(), b"1");
        assert_eq!(device.show(Attribute::Blink, &interrupt).unwrap(), b"1");
        assert!(matches!(
            device.store(Attribute::Cursor, b"yes", &interrupt),
            Err(Error::PayloadSize { .. })
        ));
        assert!(matches!(
            device.store(Attribute::Blink, b"2", &interrupt),
            Err(Error::InvalidValue(b'2'))
        ));
    }

    #[test]
    fn test_home_and_clear_attributes() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device.open(interrupt.clone()).unwrap().write(b"text").unwrap();

        device.store(Attribute::Clear, b"0", &interrupt).unwrap();
        assert_eq!(&device.show(Attribute::Data, &interrupt).unwrap()[..4], b"text");

        device.store(Attribute::Clear, b"1", &interrupt).unwrap();
        assert!(device.show(Attribute::Data, &interrupt).unwrap().iter().all(|&b| b == BLANK));
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [4, 0]);

        device.store(Attribute::Home, b"1\n", &interrupt).unwrap();
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [0, 0]);
    }

    #[test]
    fn test_scroll_attributes() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device.open(interrupt.clone()).unwrap().write(b"first\nsecond").unwrap();

        device.store(Attribute::ScrollHorizontal, b"1", &interrupt).unwrap();
        let data = device.show(Attribute::Data, &interrupt).unwrap();
        assert_eq!(&data[..5], b"first");

        device
            .store(Attribute::ScrollVertical, b"0third\n", &interrupt)
            .unwrap();
        let data = device.show(Attribute::Data, &interrupt).unwrap();
        assert_eq!(&data[..6], b"second");
        assert_eq!(&data[16..22], b"third ");

        device
            .store(Attribute::ScrollVertical, b"1zeroth", &interrupt)
            .unwrap();
        let data = device.show(Attribute::Data, &interrupt).unwrap();
        assert_eq!(&data[..6], b"zeroth");
        assert_eq!(&data[16..22], b"second");

        assert!(matches!(
            device.store(Attribute::ScrollVertical, b"x", &interrupt),
            Err(Error::InvalidValue(b'x'))
        ));
    }

    #[test]
    fn test_customchar_attribute_validates_all_records_first() {
        let device = attach(4);
        let interrupt = Interrupt::new();

        let mut input = Vec::new();
        input.extend_from_slice(&[1, 1, 1, 1, 1, 1, 1, 1, 1]);
        input.extend_from_slice(&[9, 2, 2, 2, 2, 2, 2, 2, 2]);
        assert!(matches!(
            device.store(Attribute::CustomChar, &input, &interrupt),
            Err(Error::GlyphIndex(9))
        ));
        let shown = device.show(Attribute::CustomChar, &interrupt).unwrap();
        assert_eq!(&shown[9..18], &[1, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(matches!(
            device.store(Attribute::CustomChar, &input[..10], &interrupt),
            Err(Error::PayloadSize {
                expected: 18,
                provided: 10
            })
        ));

        input[9] = 7;
        device.store(Attribute::CustomChar, &input, &interrupt).unwrap();
        let shown = device.show(Attribute::CustomChar, &interrupt).unwrap();
        assert_eq!(shown.len(), 72);
        assert_eq!(&shown[9..18], &[1, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(&shown[63..72], &[7, 2, 2, 2, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_character_and_line_attributes() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device.store(Attribute::Position, &[15, 0], &interrupt).unwrap();
        assert_eq!(device.store(Attribute::Character, b"Q", &interrupt).unwrap(), 1);
        // Advanced past the end of row 0 into row 1
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [0, 1]);

        device.store(Attribute::Position, &[15, 0], &interrupt).unwrap();
        assert_eq!(device.show(Attribute::Character, &interrupt).unwrap(), b"Q");

        let line = device.show(Attribute::Line, &interrupt).unwrap();
        assert_eq!(line.len(), 16);
        assert_eq!(line[15], b'Q');

        assert!(matches!(
            device.store(Attribute::Line, b"x", &interrupt),
            Err(Error::Unsupported)
        ));
        assert!(matches!(
            device.show(Attribute::Reset, &interrupt),
            Err(Error::Unsupported)
        ));
    }

    #[test]
    fn test_reset_attribute_reinitializes() {
        let device = attach(4);
        let interrupt = Interrupt::new();
        device.open(interrupt.clone()).unwrap().write(b"stale").unwrap();
        device.store(Attribute::Reset, b"1\n", &interrupt).unwrap();
        assert!(device.show(Attribute::Data, &interrupt).unwrap().iter().all(|&b| b == BLANK));
        assert_eq!(device.show(Attribute::Position, &interrupt).unwrap(), [0, 0]);
    }

    #[test]
    fn test_meta_attribute() {
        let config = Builder::new().topology(1).bus_number(2).address(0x3F).build().unwrap();
        let device = Device::attach(SharedRecorder::default(), NoDelay, &config).unwrap();
        let meta = device.show(Attribute::Meta, &Interrupt::new()).unwrap();
        let meta = String::from_utf8(meta).unwrap();

        assert!(meta.starts_with("---\nmetadata:\n"));
        assert!(meta.ends_with("...\n"));
        assert!(meta.contains("topology: 1\n"));
        assert!(meta.contains("topology name: 20x4\n"));
        assert!(meta.contains("rows-offsets: {0: 0x00, 1: 0x40, 2: 0x14, 3: 0x54, }"));
        assert!(meta.contains("pins: {rs: 0, rw: 1, e: 2, backlight: 3,}"));
        assert!(meta.contains("data-lines: {4: 4, 5: 5, 6: 6, 7: 7,}"));
        assert!(meta.contains("busno: 2\n"));
        assert!(meta.contains("reg: 0x3F\n"));
        assert!(meta.contains("GETCHAR: 0x8001F506\n"));
        // Hex fields only: row offsets, the address and every ioctl code
        assert_eq!(meta.matches(": 0x").count(), 4 + 1 + IOCTL_TABLE.len());
    }

    #[test]
    fn test_attribute_names() {
        for attribute in Attribute::ALL {
            assert_eq!(Attribute::from_name(attribute.name()), Some(attribute));
        }
        assert_eq!(Attribute::from_name("scrollhz"), Some(Attribute::ScrollHorizontal));
        assert_eq!(Attribute::from_name("bogus"), None);
    }

    #[test]
    fn test_detach_powers_down() {
        let device = attach(4);
        let (recorder, _) = device.detach().unwrap();
        let bytes = recorder.bytes.lock().unwrap();
        // Backlight bit is clear on everything after the switch off
        let last_backlit = bytes.iter().rposition(|&b| b & 0x08 != 0).unwrap();
        assert!(bytes[last_backlit + 1..].iter().all(|&b| b & 0x08 == 0));
        assert!(bytes.len() > last_backlit + 1);
    }

    /// Accepts writes until `broken` is set
    #[derive(Clone, Debug, Default)]
    struct FlakyBus {
        written: Arc<AtomicUsize>,
        broken: Arc<AtomicBool>,
    }

    impl DisplayInterface for FlakyBus {
        type Error = &'static str;

        fn write_byte(&mut self, _byte: u8) -> Result<(), Self::Error> {
            if self.broken.load(Ordering::SeqCst) {
                return Err("nack");
            }
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_failed_detach_returns_bus() {
        let config = Builder::new().build().unwrap();
        let bus = FlakyBus::default();
        let device = Device::attach(bus.clone(), NoDelay, &config).unwrap();
        bus.broken.store(true, Ordering::SeqCst);

        let Err(failed) = device.detach() else {
            panic!("finalize on a broken bus must fail");
        };
        assert_eq!(failed.error.kind(), crate::ErrorKind::Transport);
        let (mut released, _delay) = failed.released.unwrap();

        // The released interface is the caller's again
        bus.broken.store(false, Ordering::SeqCst);
        let before = bus.written.load(Ordering::SeqCst);
        released.write_byte(0).unwrap();
        assert_eq!(bus.written.load(Ordering::SeqCst), before + 1);
    }
}
