//! Cell addressing
//!
//! This module maps between the three coordinate systems of the driver:
//!
//! - **linear index**: offset into the mirrored frame buffer, rows stored back to back
//! - **position**: `(column, row)` on the panel
//! - **DDRAM address**: where the controller keeps that cell
//!
//! The DDRAM address of a row is looked up in the topology table rather
//! than computed as `row * columns`, because most panels leave gaps between
//! rows. All functions are total: inputs are reduced modulo the relevant
//! dimension.
//!
//! ## Example
//!
//! ```
//! use lcdi2c::addressing::{linear_to_address, position_to_address};
//! use lcdi2c::Topology;
//!
//! let topology = Topology::resolve(4); // 16x2
//!
//! // First cell of the second row lives at 0x40, not at 16
//! assert_eq!(position_to_address(&topology, 0, 1), 0x40);
//! assert_eq!(linear_to_address(&topology, 16), 0x40);
//! ```

use crate::topology::Topology;

/// Convert a linear buffer index to a `(column, row)` position
///
/// The index is reduced modulo the number of cells first.
pub fn linear_to_position(topology: &Topology, index: usize) -> (u8, u8) {
    let columns = topology.columns as usize;
    let index = index % topology.cells();
    ((index % columns) as u8, (index / columns) as u8)
}

/// Convert a `(column, row)` position to a linear buffer index
pub fn position_to_linear(topology: &Topology, column: u8, row: u8) -> usize {
    let column = (column % topology.columns) as usize;
    let row = (row % topology.rows) as usize;
    column + row * topology.columns as usize
}

/// Convert a `(column, row)` position to a DDRAM address
pub fn position_to_address(topology: &Topology, column: u8, row: u8) -> u8 {
    let row = (row % topology.rows) as usize;
    (column % topology.columns) + topology.row_addresses[row]
}

/// Convert a linear buffer index to a DDRAM address
pub fn linear_to_address(topology: &Topology, index: usize) -> u8 {
    let (column, row) = linear_to_position(topology, index);
    position_to_address(topology, column, row)
}

/// Wrap a position into range
///
/// Each coordinate that is past the edge becomes 0.
pub fn wrap_position(topology: &Topology, column: u8, row: u8) -> (u8, u8) {
    let column = if column >= topology.columns { 0 } else { column };
    let row = if row >= topology.rows { 0 } else { row };
    (column, row)
}
