//! Flow-direction encoding
//!
//! Cells carry an LDD code: one of eight compass neighbors, a sink (a pit
//! or the outlet of the network), or no-data. The numeric layout follows
//! the numeric keypad, south-west at 1, north-east at 9, the sink in the
//! middle.

pub const SOUTH_WEST: u8 = 1;
pub const SOUTH: u8 = 2;
pub const SOUTH_EAST: u8 = 3;
pub const WEST: u8 = 4;
pub const SINK: u8 = 5;
pub const EAST: u8 = 6;
pub const NORTH_WEST: u8 = 7;
pub const NORTH: u8 = 8;
pub const NORTH_EAST: u8 = 9;
pub const NO_DATA: u8 = u8::MAX;

/// (row, col) step toward the downstream cell; `(0, 0)` for a sink and
/// for no-data, which are never stepped.
pub fn downstream_offset(code: u8) -> (isize, isize) {
    match code {
        SOUTH_WEST => (1, -1),
        SOUTH => (1, 0),
        SOUTH_EAST => (1, 1),
        WEST => (0, -1),
        EAST => (0, 1),
        NORTH_WEST => (-1, -1),
        NORTH => (-1, 0),
        NORTH_EAST => (-1, 1),
        _ => (0, 0),
    }
}

/// Code for the direction stepping (row, col); `(0, 0)` yields the sink
pub fn code_from_offset(row: isize, col: isize) -> u8 {
    debug_assert!((-1..=1).contains(&row) && (-1..=1).contains(&col));
    match (row, col) {
        (1, -1) => SOUTH_WEST,
        (1, 0) => SOUTH,
        (1, 1) => SOUTH_EAST,
        (0, -1) => WEST,
        (0, 1) => EAST,
        (-1, -1) => NORTH_WEST,
        (-1, 0) => NORTH,
        (-1, 1) => NORTH_EAST,
        _ => SINK,
    }
}

/// Whether `code` is one of the ten defined values
pub fn is_valid(code: u8) -> bool {
    (SOUTH_WEST..=NORTH_EAST).contains(&code) || code == NO_DATA
}

/// Whether `code` points at a neighbor (not sink, not no-data)
pub fn is_direction(code: u8) -> bool {
    (SOUTH_WEST..=NORTH_EAST).contains(&code) && code != SINK
}

pub fn is_sink(code: u8) -> bool {
    code == SINK
}

pub fn is_no_data(code: u8) -> bool {
    code == NO_DATA
}
