//! D8 flow-direction derivation from an elevation surface

use crate::flow_direction::{self, code_from_offset, SINK};
use ndarray::Array2;
use rayon::prelude::*;
use rillflow_core::{MaterialElement, NoData, Result};
use rillflow_parallel::{Halo, Partition, PartitionedArray};
use tracing::debug;

/// Neighbor visiting order: straight directions before diagonals. Ties in
/// drop keep the earlier neighbor, so this order is part of the contract.
const VISIT_ORDER: [(isize, isize); 8] = [
    (-1, 0), // N
    (0, -1), // W
    (0, 1),  // E
    (1, 0),  // S
    (-1, -1), // NW
    (-1, 1), // NE
    (1, -1), // SW
    (1, 1),  // SE
];

/// Derive D8 flow directions by steepest descent.
///
/// Each cell points at the valid neighbor with the largest positive drop
/// in elevation. Cells without a positive drop become sinks. Neighbors
/// outside the array or holding no-data are skipped, never favorable.
/// Flat areas are not resolved beyond the fixed tie-break order.
pub fn d8_flow_direction<E>(elevation: &PartitionedArray<E>) -> Result<PartitionedArray<u8>>
where
    E: MaterialElement,
{
    d8_flow_direction_with(elevation, NoData::default())
}

/// [`d8_flow_direction`] with a caller-chosen elevation no-data policy
pub fn d8_flow_direction_with<E>(
    elevation: &PartitionedArray<E>,
    no_data: NoData<E>,
) -> Result<PartitionedArray<u8>>
where
    E: MaterialElement,
{
    let (grid_rows, grid_cols) = elevation.shape_in_partitions();
    debug!(
        shape = ?elevation.shape(),
        partitions = grid_rows * grid_cols,
        "d8_flow_direction"
    );

    let indices: Vec<(usize, usize)> = (0..grid_rows)
        .flat_map(|gr| (0..grid_cols).map(move |gc| (gr, gc)))
        .collect();

    let partitions: Vec<Partition<u8>> = indices
        .into_par_iter()
        .map(|(gr, gc)| direction_partition(elevation, gr, gc, no_data))
        .collect();

    let partitions = Array2::from_shape_vec((grid_rows, grid_cols), partitions)
        .expect("one output partition per input partition");

    PartitionedArray::new(elevation.shape(), elevation.localities().clone(), partitions)
}

fn direction_partition<E>(
    elevation: &PartitionedArray<E>,
    grid_row: usize,
    grid_col: usize,
    no_data: NoData<E>,
) -> Partition<u8>
where
    E: MaterialElement,
{
    let halo = Halo::new(elevation, grid_row, grid_col);
    let center = halo.center();
    let (rows, cols) = center.shape();

    let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let here = center.get(r, c);
        if no_data.is_no_data(here) {
            return flow_direction::NO_DATA;
        }

        let mut best_drop = E::zero();
        let mut best = SINK;

        for (dr, dc) in VISIT_ORDER {
            let Some(there) = halo.get(r as isize + dr, c as isize + dc) else {
                continue;
            };
            if no_data.is_no_data(there) {
                continue;
            }

            let drop = here - there;
            if drop > best_drop {
                best_drop = drop;
                best = code_from_offset(dr, dc);
            }
        }

        best
    });

    Partition::new(center.offset(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_direction::{EAST, NORTH, NO_DATA, SOUTH_WEST, WEST};

    fn dense(elevation: &PartitionedArray<f64>) -> Array2<u8> {
        d8_flow_direction(elevation).unwrap().to_array()
    }

    #[test]
    fn tilted_plane_flows_east() {
        let elevation =
            PartitionedArray::from_shape_fn((4, 4), (2, 2), |(_, c)| (3 - c) as f64).unwrap();
        let directions = dense(&elevation);

        for r in 0..4 {
            for c in 0..3 {
                assert_eq!(directions[(r, c)], EAST, "cell ({r}, {c})");
            }
            assert_eq!(directions[(r, 3)], SINK, "lowest column has no drop");
        }
    }

    #[test]
    fn flat_surface_is_all_sinks() {
        let elevation = PartitionedArray::filled((3, 3), (3, 3), 5.0_f64).unwrap();
        assert!(dense(&elevation).iter().all(|&d| d == SINK));
    }

    #[test]
    fn ties_prefer_straight_directions_in_order() {
        // Center higher than all neighbors by the same amount. The first
        // neighbor in visiting order wins, which is north.
        let elevation = PartitionedArray::from_shape_fn((3, 3), (3, 3), |(r, c)| {
            if (r, c) == (1, 1) {
                2.0
            } else {
                1.0
            }
        })
        .unwrap();

        assert_eq!(dense(&elevation)[(1, 1)], NORTH);
    }

    #[test]
    fn no_data_cells_are_excluded_both_ways() {
        // A no-data pit east of the center must not attract flow.
        let elevation = PartitionedArray::from_shape_fn((3, 3), (3, 3), |(r, c)| {
            if (r, c) == (1, 2) {
                f64::NAN
            } else {
                // West lower than center, east would be lower still
                10.0 - c as f64
            }
        })
        .unwrap();
        let directions = dense(&elevation);

        assert_eq!(directions[(1, 2)], NO_DATA);
        assert_ne!(directions[(1, 1)], EAST);
    }

    #[test]
    fn partitioning_does_not_change_directions() {
        let elevation = |(r, c): (usize, usize)| ((r * 7 + c * 3) % 11) as f64;
        let whole = PartitionedArray::from_shape_fn((9, 9), (9, 9), elevation).unwrap();
        let tiled = PartitionedArray::from_shape_fn((9, 9), (3, 3), elevation).unwrap();

        assert_eq!(dense(&whole), dense(&tiled));
    }

    #[test]
    fn steepest_neighbor_wins() {
        let elevation = PartitionedArray::from_shape_fn((3, 3), (3, 3), |(r, c)| {
            match (r, c) {
                (1, 1) => 5.0,
                (1, 0) => 1.0, // steepest drop, west
                (0, 1) => 3.0,
                _ => 4.0,
            }
        })
        .unwrap();

        assert_eq!(dense(&elevation)[(1, 1)], WEST);
        assert_eq!(dense(&elevation)[(0, 1)], SOUTH_WEST, "drains into the pit");
    }
}
