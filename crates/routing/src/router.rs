//! Per-partition accumulation sessions and the exchange driver
//!
//! A session owns one partition's working state for a run: the flow
//! directions, a working copy of the inflow counts, and the accumulator
//! with the output buffers. The walk starts at ridge cells and follows the
//! flow downstream until a sink, a junction still awaiting upstream
//! contributions, or the partition border. Values leaving the partition
//! become messages addressed by channel direction and border index.
//!
//! The round-based driver used by the batch operations runs all sessions,
//! routes the produced messages to their neighbors, and repeats until no
//! partition has anything left to send.

use crate::accumulate::CellAccumulator;
use crate::flow_direction::{self, downstream_offset};
use crate::inflow_count::{crossing_direction, partition_inflow, PartitionInflow};
use ndarray::Array2;
use rayon::prelude::*;
use rillflow_core::{Element, Error, Result};
use rillflow_parallel::{Direction, Partition, PartitionedArray};
use std::collections::HashSet;
use tracing::trace;

/// Border index carried by corner messages; the destination is implied
pub(crate) const CORNER_INDEX: usize = usize::MAX;

/// A value leaving a partition toward the neighbor in `direction`.
///
/// `index` is the varying coordinate of the destination cell in the
/// receiver's frame: the column for north/south channels, the row for
/// east/west channels, [`CORNER_INDEX`] for diagonal channels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Outgoing<M> {
    pub direction: Direction,
    pub index: usize,
    pub value: M,
}

/// Destination cell of a message arriving over the channel toward
/// `direction`, in a partition of `shape`.
pub(crate) fn destination_cell(
    direction: Direction,
    index: usize,
    shape: (usize, usize),
) -> (usize, usize) {
    let (rows, cols) = shape;
    match direction {
        Direction::North => (0, index),
        Direction::South => (rows - 1, index),
        Direction::West => (index, 0),
        Direction::East => (index, cols - 1),
        Direction::NorthWest => (0, 0),
        Direction::NorthEast => (0, cols - 1),
        Direction::SouthWest => (rows - 1, 0),
        Direction::SouthEast => (rows - 1, cols - 1),
    }
}

/// One partition's working state during an accumulation run
pub(crate) struct Session<A: CellAccumulator> {
    flow_direction: Partition<u8>,
    /// Decremented as contributions arrive; a cell is entered at zero
    counts: Array2<u8>,
    ridge_cells: Vec<(usize, usize)>,
    /// Border cells whose downstream step reaches a valid cell in a
    /// neighboring partition; all other border exits are terminal
    output_cells: HashSet<(usize, usize)>,
    accumulator: A,
}

impl<A: CellAccumulator> Session<A> {
    pub fn new(
        flow_direction: Partition<u8>,
        inflow: &PartitionInflow,
        mut accumulator: A,
    ) -> Self {
        let (rows, cols) = flow_direction.shape();
        let mut ridge_cells = Vec::new();

        for r in 0..rows {
            for c in 0..cols {
                let code = flow_direction.get(r, c);
                if flow_direction::is_no_data(code) {
                    accumulator.mark_no_data((r, c));
                } else if inflow.counts[(r, c)] == 0 {
                    ridge_cells.push((r, c));
                }
            }
        }

        Self {
            flow_direction,
            counts: inflow.counts.clone(),
            ridge_cells,
            output_cells: inflow.output_cells.iter().copied().collect(),
            accumulator,
        }
    }

    pub fn into_accumulator(self) -> A {
        self.accumulator
    }

    /// Walk downstream from every ridge cell
    pub fn start(&mut self, out: &mut Vec<Outgoing<A::Material>>) {
        let ridge_cells = std::mem::take(&mut self.ridge_cells);
        for cell in ridge_cells {
            self.walk(cell, out);
        }
    }

    /// Apply a value delivered from a neighboring partition and resume the
    /// walk if the destination cell's count reaches zero.
    pub fn deliver(
        &mut self,
        from: Direction,
        index: usize,
        value: A::Material,
        out: &mut Vec<Outgoing<A::Material>>,
    ) {
        let cell = destination_cell(from, index, self.flow_direction.shape());
        trace!(?from, ?cell, "deliver");

        self.accumulator.receive(cell, value);
        let count = &mut self.counts[cell];
        assert!(
            *count > 0,
            "channel {from:?} delivered more messages than the inflow pass predicted"
        );
        *count -= 1;
        if *count == 0 {
            self.walk(cell, out);
        }
    }

    fn walk(&mut self, start: (usize, usize), out: &mut Vec<Outgoing<A::Material>>) {
        let (rows, cols) = self.flow_direction.shape();
        let mut cell = start;

        loop {
            self.accumulator.enter_cell(cell);

            let code = self.flow_direction.get(cell.0, cell.1);
            if !flow_direction::is_direction(code) {
                break; // sink
            }

            let (dr, dc) = downstream_offset(code);
            let down_row = cell.0 as isize + dr;
            let down_col = cell.1 as isize + dc;
            let row_cross = cross(down_row, rows);
            let col_cross = cross(down_col, cols);

            if (row_cross, col_cross) != (0, 0) {
                if !self.output_cells.contains(&cell) {
                    // Off the edge of the array, or into a neighbor's
                    // missing data
                    break;
                }

                let direction = crossing_direction(row_cross, col_cross);
                let index = if row_cross != 0 && col_cross != 0 {
                    CORNER_INDEX
                } else if row_cross != 0 {
                    down_col as usize
                } else {
                    down_row as usize
                };
                out.push(Outgoing {
                    direction,
                    index,
                    value: self.accumulator.outflow(cell),
                });
                break;
            }

            let down = (down_row as usize, down_col as usize);
            if flow_direction::is_no_data(self.flow_direction.get(down.0, down.1)) {
                break; // flows into missing data
            }

            self.accumulator.push_downstream(cell, down);
            let count = &mut self.counts[down];
            assert!(
                *count > 0,
                "cell {down:?} received more contributions than the inflow pass counted"
            );
            *count -= 1;
            if *count > 0 {
                break; // junction, another branch still pending
            }
            cell = down;
        }
    }
}

fn cross(index: isize, extent: usize) -> isize {
    if index < 0 {
        -1
    } else if index >= extent as isize {
        1
    } else {
        0
    }
}

/// Run all sessions to completion with synchronized exchange rounds
pub(crate) fn run_rounds<A>(grid_shape: (usize, usize), sessions: &mut [Session<A>])
where
    A: CellAccumulator + Send,
{
    let (grid_rows, grid_cols) = grid_shape;
    debug_assert_eq!(sessions.len(), grid_rows * grid_cols);

    let mut outboxes: Vec<Vec<Outgoing<A::Material>>> = sessions
        .par_iter_mut()
        .map(|session| {
            let mut out = Vec::new();
            session.start(&mut out);
            out
        })
        .collect();

    loop {
        let mut inboxes: Vec<Vec<(Direction, usize, A::Material)>> =
            vec![Vec::new(); sessions.len()];
        let mut pending = false;

        for (i, outbox) in outboxes.iter_mut().enumerate() {
            let (gr, gc) = (i / grid_cols, i % grid_cols);
            for message in outbox.drain(..) {
                let (dr, dc) = message.direction.offset();
                let target_row = (gr as isize + dr) as usize;
                let target_col = (gc as isize + dc) as usize;
                inboxes[target_row * grid_cols + target_col].push((
                    message.direction.opposite(),
                    message.index,
                    message.value,
                ));
                pending = true;
            }
        }

        if !pending {
            break;
        }

        outboxes = sessions
            .par_iter_mut()
            .zip(inboxes.into_par_iter())
            .map(|(session, inbox)| {
                let mut out = Vec::new();
                for (direction, index, value) in inbox {
                    session.deliver(direction, index, value, &mut out);
                }
                out
            })
            .collect();
    }
}

/// Run the inflow pass and build one session per partition
pub(crate) fn build_sessions<A, F>(
    flow_direction: &PartitionedArray<u8>,
    make_accumulator: F,
) -> Vec<Session<A>>
where
    A: CellAccumulator + Send,
    F: Fn(usize, usize, &PartitionInflow) -> A + Sync,
{
    let (grid_rows, grid_cols) = flow_direction.shape_in_partitions();

    (0..grid_rows * grid_cols)
        .into_par_iter()
        .map(|i| {
            let (gr, gc) = (i / grid_cols, i % grid_cols);
            let inflow = partition_inflow(flow_direction, gr, gc);
            let accumulator = make_accumulator(gr, gc, &inflow);
            Session::new(
                flow_direction.partition(gr, gc).clone(),
                &inflow,
                accumulator,
            )
        })
        .collect()
}

/// Check that `other` matches the flow-direction array's shape and tiling
pub(crate) fn require_same_partitioning<T: Element, U: Element>(
    flow_direction: &PartitionedArray<T>,
    other: &PartitionedArray<U>,
    name: &str,
) -> Result<()> {
    if flow_direction.shape() != other.shape() {
        let (er, ec) = flow_direction.shape();
        let (ar, ac) = other.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    if flow_direction.same_partitioning(other) {
        Ok(())
    } else {
        Err(Error::PartitioningMismatch(format!(
            "{name} array ({:?} in {:?} partitions) does not match the flow direction array \
             ({:?} in {:?} partitions)",
            other.shape(),
            other.shape_in_partitions(),
            flow_direction.shape(),
            flow_direction.shape_in_partitions(),
        )))
    }
}

/// Rebuild a partitioned array from per-partition output buffers, keeping
/// the template's tiling and localities.
pub(crate) fn assemble<T: Element, M: Element>(
    template: &PartitionedArray<T>,
    buffers: Vec<Array2<M>>,
) -> Result<PartitionedArray<M>> {
    let grid_shape = template.shape_in_partitions();
    debug_assert_eq!(buffers.len(), grid_shape.0 * grid_shape.1);

    let partitions: Vec<Partition<M>> = buffers
        .into_iter()
        .enumerate()
        .map(|(i, buffer)| Partition::new(template.partition_linear(i).offset(), buffer))
        .collect();

    let partitions = Array2::from_shape_vec(grid_shape, partitions)
        .expect("one buffer per template partition");

    PartitionedArray::new(template.shape(), template.localities().clone(), partitions)
}
