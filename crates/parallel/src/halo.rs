//! Read-only access to a partition's surroundings
//!
//! Passes with a 3x3 kernel (flow-direction derivation, inflow counting)
//! need the border rows and columns of up to eight neighboring partitions.
//! `Halo` resolves local indices just outside a partition into the
//! neighbor that owns them, reading the neighbors' shared buffers directly.

use crate::array::PartitionedArray;
use crate::partition::Partition;
use rillflow_core::Element;

/// One partition plus references to its existing neighbors.
///
/// Supports lookups at most one cell beyond the partition's extent.
pub struct Halo<'a, T: Element> {
    center: &'a Partition<T>,
    /// Indexed by (grid row delta + 1, grid col delta + 1); `[1][1]` is unused
    neighbors: [[Option<&'a Partition<T>>; 3]; 3],
    array_shape: (usize, usize),
}

impl<'a, T: Element> Halo<'a, T> {
    pub fn new(array: &'a PartitionedArray<T>, grid_row: usize, grid_col: usize) -> Self {
        let (grid_rows, grid_cols) = array.shape_in_partitions();
        let mut neighbors: [[Option<&'a Partition<T>>; 3]; 3] = Default::default();

        for dr in -1_isize..=1 {
            for dc in -1_isize..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let nr = grid_row as isize + dr;
                let nc = grid_col as isize + dc;
                if nr >= 0 && nr < grid_rows as isize && nc >= 0 && nc < grid_cols as isize {
                    neighbors[(dr + 1) as usize][(dc + 1) as usize] =
                        Some(array.partition(nr as usize, nc as usize));
                }
            }
        }

        Self {
            center: array.partition(grid_row, grid_col),
            neighbors,
            array_shape: array.shape(),
        }
    }

    pub fn center(&self) -> &Partition<T> {
        self.center
    }

    /// Value at partition-local (row, col), which may lie one cell outside
    /// the partition. Returns `None` outside the full array.
    pub fn get(&self, local_row: isize, local_col: isize) -> Option<T> {
        let (rows, cols) = self.center.shape();
        let (rows, cols) = (rows as isize, cols as isize);

        debug_assert!(local_row >= -1 && local_row <= rows);
        debug_assert!(local_col >= -1 && local_col <= cols);

        if local_row >= 0 && local_row < rows && local_col >= 0 && local_col < cols {
            return Some(self.center.get(local_row as usize, local_col as usize));
        }

        let (offset_row, offset_col) = self.center.offset();
        let global_row = offset_row as isize + local_row;
        let global_col = offset_col as isize + local_col;

        if global_row < 0
            || global_row >= self.array_shape.0 as isize
            || global_col < 0
            || global_col >= self.array_shape.1 as isize
        {
            return None;
        }

        let grid_dr = if local_row < 0 {
            0
        } else if local_row >= rows {
            2
        } else {
            1
        };
        let grid_dc = if local_col < 0 {
            0
        } else if local_col >= cols {
            2
        } else {
            1
        };

        let neighbor = self.neighbors[grid_dr][grid_dc]
            .expect("cell inside the array belongs to some partition");
        let (n_row, n_col) = neighbor.offset();

        Some(neighbor.get(
            (global_row - n_row as isize) as usize,
            (global_col - n_col as isize) as usize,
        ))
    }
}
