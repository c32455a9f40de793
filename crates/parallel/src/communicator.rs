//! Inter-partition channels
//!
//! Each partition holds one outgoing and one incoming channel per compass
//! direction toward the neighboring partition, wired mirror-wise: what a
//! partition sends to its north arrives on the neighbor's south receiver.

use crossbeam_channel::{unbounded, Receiver, Sender};
use ndarray::Array2;
use tracing::trace;

/// Compass direction toward a neighboring partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// (row, col) offset of the neighboring partition in the grid
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::NorthEast => (-1, 1),
            Direction::East => (0, 1),
            Direction::SouthEast => (1, 1),
            Direction::South => (1, 0),
            Direction::SouthWest => (1, -1),
            Direction::West => (0, -1),
            Direction::NorthWest => (-1, -1),
        }
    }

    /// Direction from the neighbor back to this partition
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::NorthEast => Direction::SouthWest,
            Direction::East => Direction::West,
            Direction::SouthEast => Direction::NorthWest,
            Direction::South => Direction::North,
            Direction::SouthWest => Direction::NorthEast,
            Direction::West => Direction::East,
            Direction::NorthWest => Direction::SouthEast,
        }
    }

    /// Whether the direction points at a corner neighbor
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Direction::NorthEast
                | Direction::SouthEast
                | Direction::SouthWest
                | Direction::NorthWest
        )
    }

    /// Stable index for per-direction tables
    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::NorthEast => 1,
            Direction::East => 2,
            Direction::SouthEast => 3,
            Direction::South => 4,
            Direction::SouthWest => 5,
            Direction::West => 6,
            Direction::NorthWest => 7,
        }
    }
}

/// One partition's endpoints: a sender and a receiver per direction in
/// which a neighbor exists. Border partitions leave the outward slots
/// empty.
#[derive(Debug)]
pub struct Communicator<M> {
    grid_index: (usize, usize),
    senders: [Option<Sender<M>>; 8],
    receivers: [Option<Receiver<M>>; 8],
}

impl<M> Communicator<M> {
    fn empty(grid_index: (usize, usize)) -> Self {
        Self {
            grid_index,
            senders: Default::default(),
            receivers: Default::default(),
        }
    }

    /// Whether a neighbor exists in `direction`
    pub fn has_neighbor(&self, direction: Direction) -> bool {
        self.senders[direction.index()].is_some()
    }

    /// Send a message toward the neighbor in `direction`.
    ///
    /// Panics when no neighbor exists there; callers route messages only
    /// along edges the grid wired up.
    pub fn send(&self, direction: Direction, message: M) {
        trace!(from = ?self.grid_index, ?direction, "send");
        self.senders[direction.index()]
            .as_ref()
            .unwrap_or_else(|| {
                panic!(
                    "partition {:?} has no neighbor toward {direction:?}",
                    self.grid_index
                )
            })
            .send(message)
            .expect("receiving partition hung up");
    }

    /// Detach the receiver for `direction`, for moving into a worker task
    pub fn take_receiver(&mut self, direction: Direction) -> Option<Receiver<M>> {
        self.receivers[direction.index()].take()
    }
}

/// All communicators for one partition grid, mirror-wired.
///
/// For every pair of neighboring partitions and every direction there is
/// exactly one channel: the sender lives in one partition's communicator,
/// the receiver in the opposite slot of the neighbor's.
#[derive(Debug)]
pub struct CommunicatorGrid<M> {
    communicators: Array2<Option<Communicator<M>>>,
}

impl<M> CommunicatorGrid<M> {
    pub fn new(shape_in_partitions: (usize, usize)) -> Self {
        let (rows, cols) = shape_in_partitions;
        let mut communicators =
            Array2::from_shape_fn((rows, cols), |idx| Some(Communicator::empty(idx)));

        for r in 0..rows {
            for c in 0..cols {
                for direction in Direction::ALL {
                    let (dr, dc) = direction.offset();
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    if nr < 0 || nr >= rows as isize || nc < 0 || nc >= cols as isize {
                        continue;
                    }

                    let (tx, rx) = unbounded();
                    communicators[(r, c)].as_mut().unwrap().senders[direction.index()] =
                        Some(tx);
                    communicators[(nr as usize, nc as usize)]
                        .as_mut()
                        .unwrap()
                        .receivers[direction.opposite().index()] = Some(rx);
                }
            }
        }

        Self { communicators }
    }

    /// Detach the communicator for one partition, for moving into its task.
    ///
    /// Panics when taken twice.
    pub fn take(&mut self, grid_row: usize, grid_col: usize) -> Communicator<M> {
        self.communicators[(grid_row, grid_col)]
            .take()
            .unwrap_or_else(|| panic!("communicator ({grid_row}, {grid_col}) already taken"))
    }
}
