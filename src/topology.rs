//! Display topologies
//!
//! A topology describes how the visible character cells of a panel are laid
//! out in the controller's DDRAM. The HD44780 does not store rows back to
//! back: a 16x2 panel keeps its second row at `0x40`, a 20x4 panel
//! interleaves rows 2 and 3 behind rows 0 and 1, and some 16x1 panels are
//! really 8x2 panels with both halves on one physical line.
//!
//! The table is fixed. An unknown topology id resolves to 16x2.
//!
//! ## Example
//!
//! ```
//! use lcdi2c::Topology;
//!
//! let topology = Topology::resolve(1);
//! assert_eq!(topology.name, "20x4");
//! assert_eq!(topology.row_addresses, [0x00, 0x40, 0x14, 0x54]);
//!
//! // Out of range ids fall back to the default
//! assert_eq!(Topology::resolve(42), Topology::DEFAULT);
//! ```

/// Maximum number of rows any supported topology has
pub const MAX_ROWS: usize = 4;

/// Maximum line length in bytes, used for line sized payloads
pub const MAX_LINE_LENGTH: usize = 40;

/// Capacity of the mirrored frame buffer
///
/// Derived from the largest topology in [`TOPOLOGIES`], plus four spare
/// cells so the buffer keeps the size of the line/buffer ioctl payloads.
pub const BUFFER_CAPACITY: usize = max_cells() + 4;

/// Number of entries in [`TOPOLOGIES`]
pub const TOPOLOGY_COUNT: usize = 8;

/// Static description of one panel organization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    /// Index of this entry in [`TOPOLOGIES`]
    pub id: u8,
    /// Visible columns per row
    pub columns: u8,
    /// Visible rows
    pub rows: u8,
    /// DDRAM address of the first cell of each row; entries past `rows` are unused
    pub row_addresses: [u8; MAX_ROWS],
    /// Human readable name
    pub name: &'static str,
}

/// All supported topologies, indexed by topology id
pub const TOPOLOGIES: [Topology; TOPOLOGY_COUNT] = [
    Topology::new(0, 40, 2, [0x00, 0x40, 0x00, 0x00], "40x2"),
    Topology::new(1, 20, 4, [0x00, 0x40, 0x14, 0x54], "20x4"),
    Topology::new(2, 20, 2, [0x00, 0x40, 0x00, 0x00], "20x2"),
    Topology::new(3, 16, 4, [0x00, 0x40, 0x10, 0x50], "16x4"),
    Topology::new(4, 16, 2, [0x00, 0x40, 0x00, 0x00], "16x2"),
    // Two 8 cell halves at 0x00 and 0x40, same RAM layout as 8x2
    Topology::new(5, 8, 2, [0x00, 0x40, 0x00, 0x40], "16x1 type 1"),
    // One contiguous 16 cell row
    Topology::new(6, 16, 1, [0x00, 0x08, 0x00, 0x08], "16x1 type 2"),
    Topology::new(7, 8, 2, [0x00, 0x40, 0x00, 0x40], "8x2"),
];

/// Topology id used when an unknown id is requested
pub const DEFAULT_TOPOLOGY_ID: u8 = 4;

impl Topology {
    /// The 16x2 fallback topology
    pub const DEFAULT: Topology = TOPOLOGIES[DEFAULT_TOPOLOGY_ID as usize];

    const fn new(
        id: u8,
        columns: u8,
        rows: u8,
        row_addresses: [u8; MAX_ROWS],
        name: &'static str,
    ) -> Self {
        Self {
            id,
            columns,
            rows,
            row_addresses,
            name,
        }
    }

    /// Look up a topology by id
    ///
    /// Never fails: ids outside the table resolve to [`Topology::DEFAULT`].
    pub fn resolve(id: u32) -> Topology {
        usize::try_from(id)
            .ok()
            .and_then(|index| TOPOLOGIES.get(index))
            .copied()
            .unwrap_or(Self::DEFAULT)
    }

    /// Number of visible cells (`columns * rows`)
    pub fn cells(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Meaningful row base addresses
    pub fn row_addresses(&self) -> &[u8] {
        &self.row_addresses[..self.rows as usize]
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const fn max_cells() -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < TOPOLOGY_COUNT {
        let cells = TOPOLOGIES[i].columns as usize * TOPOLOGIES[i].rows as usize;
        if cells > max {
            max = cells;
        }
        i += 1;
    }
    max
}
