//! Flow-network introspection
//!
//! Classifies every cell by the role it plays during accumulation. Useful
//! for diagnosing how a flow network interacts with a given partitioning:
//! how much of each partition can be processed without waiting for
//! neighbors, and where the cross-partition traffic happens.

use crate::flow_direction::{self, downstream_offset};
use crate::inflow_count::partition_inflow;
use ndarray::Array2;
use rayon::prelude::*;
use rillflow_core::Result;
use rillflow_parallel::{Partition, PartitionedArray};
use std::collections::HashSet;
use tracing::debug;

/// Cell classes, in increasing precedence of the border roles
pub mod cell_class {
    /// Terminal cell of a flow path
    pub const SINK: u8 = 1;
    /// No upstream contributions; a walk starts here
    pub const RIDGE: u8 = 2;
    /// More than one upstream branch meets here
    pub const JUNCTION: u8 = 3;
    /// Stream cell settled without any cross-partition input
    pub const INTRA_PARTITION_STREAM: u8 = 4;
    /// Stream cell that waits for cross-partition input
    pub const INTER_PARTITION_STREAM: u8 = 5;
    /// Border cell receiving from a neighboring partition
    pub const PARTITION_INPUT: u8 = 6;
    /// Border cell feeding a neighboring partition
    pub const PARTITION_OUTPUT: u8 = 7;
    /// Border cell that both receives and feeds across the border
    pub const PARTITION_INPUT_OUTPUT: u8 = 8;
    pub const NO_DATA: u8 = u8::MAX;
}

/// Diagnostic arrays describing the flow network under a partitioning
#[derive(Debug, Clone)]
pub struct AccuInfo {
    pub cell_class: PartitionedArray<u8>,
    pub inflow_count: PartitionedArray<u8>,
}

/// Classify every cell of the flow-direction array.
///
/// Classification is pure: applying it twice yields identical results.
pub fn accu_info(flow_direction: &PartitionedArray<u8>) -> Result<AccuInfo> {
    let (grid_rows, grid_cols) = flow_direction.shape_in_partitions();
    debug!(shape = ?flow_direction.shape(), "accu_info");

    let partitions: Vec<(Partition<u8>, Partition<u8>)> = (0..grid_rows * grid_cols)
        .into_par_iter()
        .map(|i| {
            let (gr, gc) = (i / grid_cols, i % grid_cols);
            let offset = flow_direction.partition(gr, gc).offset();
            let (classes, counts) = classify_partition(flow_direction, gr, gc);
            (
                Partition::new(offset, classes),
                Partition::new(offset, counts),
            )
        })
        .collect();

    let (classes, counts): (Vec<_>, Vec<_>) = partitions.into_iter().unzip();
    let grid_shape = (grid_rows, grid_cols);

    let classes = Array2::from_shape_vec(grid_shape, classes)
        .expect("one class partition per input partition");
    let counts = Array2::from_shape_vec(grid_shape, counts)
        .expect("one count partition per input partition");

    Ok(AccuInfo {
        cell_class: PartitionedArray::new(
            flow_direction.shape(),
            flow_direction.localities().clone(),
            classes,
        )?,
        inflow_count: PartitionedArray::new(
            flow_direction.shape(),
            flow_direction.localities().clone(),
            counts,
        )?,
    })
}

fn classify_partition(
    flow_direction: &PartitionedArray<u8>,
    grid_row: usize,
    grid_col: usize,
) -> (Array2<u8>, Array2<u8>) {
    let inflow = partition_inflow(flow_direction, grid_row, grid_col);
    let partition = flow_direction.partition(grid_row, grid_col);
    let (rows, cols) = partition.shape();

    let settled = settle_without_external_input(partition, &inflow.counts);
    let inputs: HashSet<_> = inflow.input_cells.iter().copied().collect();
    let outputs: HashSet<_> = inflow.output_cells.iter().copied().collect();

    let classes = Array2::from_shape_fn((rows, cols), |cell| {
        let code = partition.get(cell.0, cell.1);
        if flow_direction::is_no_data(code) {
            return cell_class::NO_DATA;
        }

        match (inputs.contains(&cell), outputs.contains(&cell)) {
            (true, true) => return cell_class::PARTITION_INPUT_OUTPUT,
            (true, false) => return cell_class::PARTITION_INPUT,
            (false, true) => return cell_class::PARTITION_OUTPUT,
            (false, false) => {}
        }

        let count = inflow.counts[cell];
        if flow_direction::is_sink(code) {
            cell_class::SINK
        } else if count == 0 {
            cell_class::RIDGE
        } else if count > 1 {
            cell_class::JUNCTION
        } else if settled[cell] {
            cell_class::INTRA_PARTITION_STREAM
        } else {
            cell_class::INTER_PARTITION_STREAM
        }
    });

    (classes, inflow.counts)
}

/// Which cells settle when only this partition's ridge cells feed the walk
fn settle_without_external_input(
    flow_direction: &Partition<u8>,
    counts: &Array2<u8>,
) -> Array2<bool> {
    let (rows, cols) = flow_direction.shape();
    let mut counts = counts.clone();
    let mut settled = Array2::from_elem((rows, cols), false);

    for start_row in 0..rows {
        for start_col in 0..cols {
            let code = flow_direction.get(start_row, start_col);
            if flow_direction::is_no_data(code) || counts[(start_row, start_col)] != 0 {
                continue;
            }

            let mut cell = (start_row, start_col);
            loop {
                if settled[cell] {
                    break; // ridge cells are visited once
                }
                settled[cell] = true;

                let code = flow_direction.get(cell.0, cell.1);
                if !flow_direction::is_direction(code) {
                    break;
                }
                let (dr, dc) = downstream_offset(code);
                let down_row = cell.0 as isize + dr;
                let down_col = cell.1 as isize + dc;
                if down_row < 0
                    || down_row >= rows as isize
                    || down_col < 0
                    || down_col >= cols as isize
                {
                    break;
                }

                let down = (down_row as usize, down_col as usize);
                if flow_direction::is_no_data(flow_direction.get(down.0, down.1)) {
                    break;
                }
                if counts[down] == 0 {
                    break; // already settled from its own start
                }
                counts[down] -= 1;
                if counts[down] > 0 {
                    break;
                }
                cell = down;
            }
        }
    }

    settled
}
