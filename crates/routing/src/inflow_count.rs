//! Inflow-count pass
//!
//! For every cell, the number of valid neighbors whose flow direction
//! points into it. The per-partition pass also records which border cells
//! receive contributions from neighboring partitions (and over which
//! channel), and which cells feed a neighboring partition. The walk uses
//! the counts for topological order; the channel protocol uses the
//! per-direction message counts to know when a receiver is done.

use crate::flow_direction::{self, downstream_offset};
use ndarray::Array2;
use rayon::prelude::*;
use rillflow_core::Result;
use rillflow_parallel::{Direction, Halo, Partition, PartitionedArray};
use tracing::debug;

/// Everything the inflow pass learns about one partition
#[derive(Debug, Clone)]
pub(crate) struct PartitionInflow {
    pub counts: Array2<u8>,
    /// Messages to expect per incoming channel, indexed by `Direction::index`
    pub expected: [usize; 8],
    /// Border cells with at least one upstream neighbor in another partition
    pub input_cells: Vec<(usize, usize)>,
    /// Cells whose downstream step reaches a valid cell in another
    /// partition
    pub output_cells: Vec<(usize, usize)>,
}

/// Direction of the partition containing a cell one step outside this
/// partition, from the per-axis crossings.
pub(crate) fn crossing_direction(row_cross: isize, col_cross: isize) -> Direction {
    match (row_cross, col_cross) {
        (-1, 0) => Direction::North,
        (-1, 1) => Direction::NorthEast,
        (0, 1) => Direction::East,
        (1, 1) => Direction::SouthEast,
        (1, 0) => Direction::South,
        (1, -1) => Direction::SouthWest,
        (0, -1) => Direction::West,
        (-1, -1) => Direction::NorthWest,
        _ => unreachable!("cell does not cross the partition border"),
    }
}

/// Per-axis crossing of a partition-local index against the partition
/// shape: -1 before, 0 inside, 1 past.
fn cross(index: isize, extent: usize) -> isize {
    if index < 0 {
        -1
    } else if index >= extent as isize {
        1
    } else {
        0
    }
}

pub(crate) fn partition_inflow(
    flow_direction: &PartitionedArray<u8>,
    grid_row: usize,
    grid_col: usize,
) -> PartitionInflow {
    let halo = Halo::new(flow_direction, grid_row, grid_col);
    let center = halo.center();
    let (rows, cols) = center.shape();

    let mut counts = Array2::zeros((rows, cols));
    let mut expected = [0_usize; 8];
    let mut input_cells = Vec::new();
    let mut output_cells = Vec::new();

    for r in 0..rows {
        for c in 0..cols {
            let code = center.get(r, c);
            if flow_direction::is_no_data(code) {
                continue;
            }

            let mut count = 0_u8;
            let mut external = false;

            for dr in -1_isize..=1 {
                for dc in -1_isize..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let nr = r as isize + dr;
                    let nc = c as isize + dc;
                    let Some(neighbor) = halo.get(nr, nc) else {
                        continue;
                    };
                    if downstream_offset(neighbor) != (-dr, -dc) {
                        continue;
                    }

                    count += 1;

                    let (row_cross, col_cross) = (cross(nr, rows), cross(nc, cols));
                    if (row_cross, col_cross) != (0, 0) {
                        expected[crossing_direction(row_cross, col_cross).index()] += 1;
                        external = true;
                    }
                }
            }

            counts[(r, c)] = count;
            if external {
                input_cells.push((r, c));
            }

            if flow_direction::is_direction(code) {
                let (dr, dc) = downstream_offset(code);
                let down_r = r as isize + dr;
                let down_c = c as isize + dc;
                // A step beyond the whole array or into a neighbor's
                // no-data cell is terminal, not an output
                if (cross(down_r, rows), cross(down_c, cols)) != (0, 0)
                    && halo
                        .get(down_r, down_c)
                        .is_some_and(|down| !flow_direction::is_no_data(down))
                {
                    output_cells.push((r, c));
                }
            }
        }
    }

    PartitionInflow {
        counts,
        expected,
        input_cells,
        output_cells,
    }
}

/// Number of valid upstream neighbors per cell.
///
/// No-data flow-direction cells count zero and contribute nothing.
pub fn inflow_count(flow_direction: &PartitionedArray<u8>) -> Result<PartitionedArray<u8>> {
    let (grid_rows, grid_cols) = flow_direction.shape_in_partitions();
    debug!(shape = ?flow_direction.shape(), "inflow_count");

    let indices: Vec<(usize, usize)> = (0..grid_rows)
        .flat_map(|gr| (0..grid_cols).map(move |gc| (gr, gc)))
        .collect();

    let partitions: Vec<Partition<u8>> = indices
        .into_par_iter()
        .map(|(gr, gc)| {
            let inflow = partition_inflow(flow_direction, gr, gc);
            Partition::new(flow_direction.partition(gr, gc).offset(), inflow.counts)
        })
        .collect();

    let partitions = Array2::from_shape_vec((grid_rows, grid_cols), partitions)
        .expect("one output partition per input partition");

    PartitionedArray::new(
        flow_direction.shape(),
        flow_direction.localities().clone(),
        partitions,
    )
}
