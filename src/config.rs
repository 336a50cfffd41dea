//! Display configuration types and builder

use heapless::String;

pub use crate::error::BuilderError;
use crate::topology::{DEFAULT_TOPOLOGY_ID, Topology};

/// Default 7-bit I2C address of PCF8574 backpacks
pub const DEFAULT_ADDRESS: u8 = 0x27;

/// Default I2C bus number
pub const DEFAULT_BUS_NUMBER: u8 = 1;

/// Maximum welcome message length in bytes
pub const WELCOME_MAX_LEN: usize = 16;

/// Welcome message shown when enabled and none is configured
pub const DEFAULT_WELCOME: &str = "HDD44780\nDriver";

/// LCD lines wired to the expander, in pin map order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Pin {
    /// Register select (low = instruction, high = data)
    Rs = 0,
    /// Read/write (held low, the driver only writes)
    Rw = 1,
    /// Enable strobe
    En = 2,
    /// Backlight transistor
    Backlight = 3,
    /// Data line 4
    Db4 = 4,
    /// Data line 5
    Db5 = 5,
    /// Data line 6
    Db6 = 6,
    /// Data line 7
    Db7 = 7,
}

/// Mapping of LCD signals to PCF8574 output bits
///
/// Entry `n` is the expander bit (0..=7) driving [`Pin`] `n`.
/// The default `[0, 1, 2, 3, 4, 5, 6, 7]` matches the common backpacks:
/// P0=RS, P1=RW, P2=E, P3=backlight, P4..P7=D4..D7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pinout {
    pins: [u8; 8],
}

impl Pinout {
    /// Create a pin map, validating that every bit is in 0..=7 and used once
    pub fn new(pins: [u8; 8]) -> Result<Self, BuilderError> {
        let mut used = 0u8;
        for (index, &pin) in pins.iter().enumerate() {
            if pin > 7 {
                return Err(BuilderError::InvalidPin { index, pin });
            }
            if used & (1 << pin) != 0 {
                return Err(BuilderError::DuplicatePin { pin });
            }
            used |= 1 << pin;
        }
        Ok(Self { pins })
    }

    /// Expander bit number for an LCD line
    pub fn pin(&self, line: Pin) -> u8 {
        self.pins[line as usize]
    }

    /// Expander bit mask for an LCD line
    pub fn mask(&self, line: Pin) -> u8 {
        1 << self.pin(line)
    }

    /// Raw pin numbers in signal order
    pub fn pins(&self) -> [u8; 8] {
        self.pins
    }

    /// Route the low four bits of `nibble` onto the DB4..DB7 lines
    pub fn nibble(&self, nibble: u8) -> u8 {
        [Pin::Db4, Pin::Db5, Pin::Db6, Pin::Db7]
            .iter()
            .enumerate()
            .filter(|(bit, _)| nibble & (1 << bit) != 0)
            .fold(0, |bus, (_, &line)| bus | self.mask(line))
    }
}

impl Default for Pinout {
    fn default() -> Self {
        Self {
            pins: [0, 1, 2, 3, 4, 5, 6, 7],
        }
    }
}

/// Display configuration
///
/// Consumed once when the display is attached. Use [`Builder`] to create one.
#[derive(Clone, Debug)]
pub struct Config {
    /// I2C bus number (reported in metadata only)
    pub bus_number: u8,
    /// 7-bit I2C address of the expander
    pub address: u8,
    /// Panel topology
    pub topology: Topology,
    /// Show the underline cursor after init
    pub cursor: bool,
    /// Blink the cursor after init
    pub blink: bool,
    /// Backlight state after init
    pub backlight: bool,
    /// Expander pin map
    pub pinout: Pinout,
    /// Print the welcome message after init
    pub show_welcome: bool,
    /// Welcome message
    pub welcome: String<WELCOME_MAX_LEN>,
}

impl Default for Config {
    fn default() -> Self {
        let mut welcome = String::new();
        // DEFAULT_WELCOME is shorter than WELCOME_MAX_LEN
        let _ = welcome.push_str(DEFAULT_WELCOME);
        Self {
            bus_number: DEFAULT_BUS_NUMBER,
            address: DEFAULT_ADDRESS,
            topology: Topology::DEFAULT,
            cursor: true,
            blink: true,
            backlight: true,
            pinout: Pinout::default(),
            show_welcome: false,
            welcome,
        }
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```
/// use lcdi2c::Builder;
///
/// let config = match Builder::new().address(0x3F).topology(1).cursor(false).build() {
///     Ok(config) => config,
///     Err(_) => return,
/// };
/// assert_eq!(config.topology.name, "20x4");
/// assert_eq!(config.address, 0x3F);
/// ```
#[must_use]
pub struct Builder {
    bus_number: u8,
    address: u8,
    topology: u32,
    cursor: bool,
    blink: bool,
    backlight: bool,
    pinout: [u8; 8],
    show_welcome: bool,
    welcome: Option<&'static str>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            bus_number: DEFAULT_BUS_NUMBER,
            address: DEFAULT_ADDRESS,
            topology: DEFAULT_TOPOLOGY_ID as u32,
            cursor: true,
            blink: true,
            backlight: true,
            pinout: Pinout::default().pins(),
            show_welcome: false,
            welcome: None,
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the I2C bus number
    pub fn bus_number(mut self, bus_number: u8) -> Self {
        self.bus_number = bus_number;
        self
    }

    /// Set the 7-bit I2C address
    pub fn address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Set the topology id; unknown ids fall back to 16x2
    pub fn topology(mut self, id: u32) -> Self {
        self.topology = id;
        self
    }

    /// Show the cursor after init
    pub fn cursor(mut self, on: bool) -> Self {
        self.cursor = on;
        self
    }

    /// Blink the cursor after init
    pub fn blink(mut self, on: bool) -> Self {
        self.blink = on;
        self
    }

    /// Backlight state after init
    pub fn backlight(mut self, on: bool) -> Self {
        self.backlight = on;
        self
    }

    /// Set the expander pin map (RS, RW, EN, BL, DB4, DB5, DB6, DB7)
    pub fn pinout(mut self, pins: [u8; 8]) -> Self {
        self.pinout = pins;
        self
    }

    /// Print the welcome message after init
    pub fn show_welcome(mut self, show: bool) -> Self {
        self.show_welcome = show;
        self
    }

    /// Set the welcome message; an empty message selects the default
    pub fn welcome(mut self, message: &'static str) -> Self {
        self.welcome = Some(message);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BuilderError` if the address is not 7-bit, the pin map is
    /// invalid or the welcome message is too long.
    pub fn build(self) -> Result<Config, BuilderError> {
        if self.address > 0x7F {
            return Err(BuilderError::InvalidAddress(self.address));
        }
        let pinout = Pinout::new(self.pinout)?;

        let message = match self.welcome {
            Some(message) if !message.is_empty() => message,
            _ => DEFAULT_WELCOME,
        };
        let mut welcome = String::new();
        welcome
            .push_str(message)
            .map_err(|()| BuilderError::WelcomeTooLong { len: message.len() })?;

        Ok(Config {
            bus_number: self.bus_number,
            address: self.address,
            topology: Topology::resolve(self.topology),
            cursor: self.cursor,
            blink: self.blink,
            backlight: self.backlight,
            pinout,
            show_welcome: self.show_welcome,
            welcome,
        })
    }
}
