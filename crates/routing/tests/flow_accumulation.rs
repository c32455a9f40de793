//! End-to-end accumulation scenarios shared by the operation variants

use ndarray::Array2;
use rillflow_parallel::PartitionedArray;
use rillflow_routing::flow_direction::{EAST, NO_DATA, SINK, SOUTH, SOUTH_EAST, SOUTH_WEST, WEST};
use rillflow_routing::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Flow directions of example 1 of the PCRaster manual: a 5x5 catchment
/// draining to a single outlet in the bottom row.
#[rustfmt::skip]
const PCRASTER_FLOW_DIRECTION: [u8; 25] = [
    SOUTH,      SOUTH, SOUTH,      SOUTH_WEST, SOUTH_WEST,
    SOUTH,      SOUTH, SOUTH_WEST, SOUTH_WEST, SOUTH_WEST,
    SOUTH_EAST, SOUTH, SOUTH_WEST, WEST,       SOUTH_WEST,
    SOUTH_EAST, SOUTH, SOUTH_WEST, WEST,       WEST,
    EAST,       SINK,  WEST,       WEST,       WEST,
];

#[rustfmt::skip]
const PCRASTER_MATERIAL: [f64; 25] = [
    6.0, 0.5, 2.0, 2.0, 2.0,
    0.5, 0.5, 2.0, 2.0, 2.0,
    0.5, 0.5, 2.0, 2.0, 0.0,
    0.5, 0.5, 6.0, 0.0, 0.0,
    0.5, 6.0, 6.0, 6.0, 6.0,
];

#[rustfmt::skip]
const PCRASTER_FLUX: [f64; 25] = [
    4.5, 0.0,  0.5,  0.5, 0.5,
    3.5, 0.0,  1.5,  1.0, 0.5,
    2.5, 0.5,  2.5,  1.0, 0.0,
    0.0, 4.5,  4.5,  0.0, 0.0,
    0.0, 27.0, 13.5, 9.0, 4.5,
];

#[rustfmt::skip]
const PCRASTER_STATE: [f64; 25] = [
    1.5, 0.5, 1.5, 1.5, 1.5,
    1.5, 0.5, 1.5, 1.5, 1.5,
    1.5, 1.5, 1.5, 1.5, 0.0,
    0.5, 1.5, 1.5, 0.0, 0.0,
    0.5, 1.5, 1.5, 1.5, 1.5,
];

fn from_literal<T: Copy + rillflow_core::Element>(
    values: &[T; 25],
    partition_shape: (usize, usize),
) -> PartitionedArray<T> {
    PartitionedArray::from_shape_fn((5, 5), partition_shape, |(r, c)| values[r * 5 + c]).unwrap()
}

fn assert_close(actual: &Array2<f64>, expected: &[f64; 25]) {
    for r in 0..5 {
        for c in 0..5 {
            let expected = expected[r * 5 + c];
            let actual = actual[(r, c)];
            assert!(
                (actual - expected).abs() < 1e-12,
                "cell ({r}, {c}): {actual} vs {expected}"
            );
        }
    }
}

#[test]
fn pcraster_manual_example_accu_threshold() {
    init_tracing();
    for partition_shape in [(5, 5), (3, 3), (2, 2), (1, 5)] {
        let flow_direction = from_literal(&PCRASTER_FLOW_DIRECTION, partition_shape);
        let material = from_literal(&PCRASTER_MATERIAL, partition_shape);
        let threshold = PartitionedArray::filled((5, 5), partition_shape, 1.5).unwrap();

        let (flux, state) = accu_threshold(&flow_direction, &material, &threshold).unwrap();

        assert_close(&flux.to_array(), &PCRASTER_FLUX);
        assert_close(&state.to_array(), &PCRASTER_STATE);
    }
}

#[test]
fn pcraster_manual_example_accu_threshold3() {
    init_tracing();
    for partition_shape in [(5, 5), (3, 3), (2, 2), (5, 1)] {
        let flow_direction = from_literal(&PCRASTER_FLOW_DIRECTION, partition_shape);
        let material = from_literal(&PCRASTER_MATERIAL, partition_shape);
        let threshold = PartitionedArray::filled((5, 5), partition_shape, 1.5).unwrap();

        let (flux, state) = accu_threshold3(&flow_direction, &material, &threshold).unwrap();

        assert_close(&flux.to_array(), &PCRASTER_FLUX);
        assert_close(&state.to_array(), &PCRASTER_STATE);
    }
}

#[test]
fn pcraster_network_conserves_fraction_splits() {
    let flow_direction = from_literal(&PCRASTER_FLOW_DIRECTION, (3, 3));
    let material = from_literal(&PCRASTER_MATERIAL, (3, 3));
    let fraction = PartitionedArray::filled((5, 5), (3, 3), 0.6).unwrap();

    let (flux, state) = accu_fraction(&flow_direction, &material, &fraction).unwrap();
    let flux = flux.to_array();
    let state = state.to_array();

    // Everything not retained somewhere ends up at the outlet
    let outlet_total = flux[(4, 1)] + state[(4, 1)];
    let retained_elsewhere: f64 = state.iter().sum::<f64>() - state[(4, 1)];
    let supplied: f64 = PCRASTER_MATERIAL.iter().sum();
    assert!((outlet_total + retained_elsewhere - supplied).abs() < 1e-9);
}

#[test]
fn parallel_flow_east_accumulates_column_index() {
    let flow_direction = PartitionedArray::filled((9, 9), (3, 3), EAST).unwrap();
    let material = PartitionedArray::filled((9, 9), (3, 3), 1.0).unwrap();

    let result = accu(&flow_direction, &material).unwrap().to_array();

    for r in 0..9 {
        for c in 0..9 {
            assert_eq!(result[(r, c)], (c + 1) as f64);
        }
    }
}

#[test]
fn no_data_ridge_poisons_only_its_path() {
    let flow_direction = PartitionedArray::filled((9, 9), (3, 3), EAST).unwrap();
    let material = PartitionedArray::from_shape_fn((9, 9), (3, 3), |(r, c)| {
        if (r, c) == (4, 0) {
            f64::NAN
        } else {
            1.0
        }
    })
    .unwrap();
    let threshold = PartitionedArray::filled((9, 9), (3, 3), 0.25).unwrap();

    let (flux, state) = accu_threshold(&flow_direction, &material, &threshold).unwrap();
    let flux = flux.to_array();
    let state = state.to_array();

    for c in 0..9 {
        assert!(flux[(4, c)].is_nan());
        assert!(state[(4, c)].is_nan());
    }
    for r in [0, 1, 2, 3, 5, 6, 7, 8] {
        for c in 0..9 {
            assert!(flux[(r, c)].is_finite());
            assert_eq!(state[(r, c)], 0.25);
        }
    }
}

#[test]
fn flow_into_a_neighboring_partitions_no_data_cell_is_terminal() {
    // The no-data cell sits just across the partition border, so the
    // upstream walk must stop without handing anything over.
    let codes = [EAST, EAST, NO_DATA, SINK];
    let material_of = |(_, c): (usize, usize)| (c + 1) as f64;

    let reference = {
        let flow_direction =
            PartitionedArray::from_shape_fn((1, 4), (1, 4), |(_, c)| codes[c]).unwrap();
        let material = PartitionedArray::from_shape_fn((1, 4), (1, 4), material_of).unwrap();
        accu(&flow_direction, &material).unwrap().to_array()
    };

    let flow_direction =
        PartitionedArray::from_shape_fn((1, 4), (1, 2), |(_, c)| codes[c]).unwrap();
    let material = PartitionedArray::from_shape_fn((1, 4), (1, 2), material_of).unwrap();
    let result = accu(&flow_direction, &material).unwrap().to_array();

    assert_eq!(result[(0, 0)], 1.0);
    assert_eq!(result[(0, 1)], 3.0, "accumulates up to the border, no further");
    assert!(result[(0, 2)].is_nan());
    assert_eq!(result[(0, 3)], 4.0, "untouched by the blocked stream");

    for c in [0, 1, 3] {
        assert_eq!(result[(0, c)], reference[(0, c)]);
    }
    assert!(reference[(0, 2)].is_nan());
}

#[test]
fn streamed_flow_into_a_neighboring_partitions_no_data_cell_is_terminal() {
    // South-flowing columns in 2x2 partitions; (2, 1) is no-data, so the
    // upper partition's column 1 ends at the border.
    let flow_direction = PartitionedArray::from_shape_fn((4, 4), (2, 2), |(r, c)| {
        if (r, c) == (2, 1) {
            NO_DATA
        } else {
            SOUTH
        }
    })
    .unwrap();
    let material: PartitionedArray<f64> = PartitionedArray::filled((4, 4), (2, 2), 1.0).unwrap();
    let threshold = PartitionedArray::filled((4, 4), (2, 2), 0.5).unwrap();

    let (flux3, state3) = accu_threshold3(&flow_direction, &material, &threshold).unwrap();
    let (flux, state) = accu_threshold(&flow_direction, &material, &threshold).unwrap();
    assert_eq!(flux3.to_array(), flux.to_array());
    assert_eq!(state3.to_array(), state.to_array());

    let flux = flux3.to_array();
    let state = state3.to_array();

    assert!(flux[(2, 1)].is_nan());
    assert!(state[(2, 1)].is_nan());
    assert_eq!(flux[(1, 1)], 1.0, "the border cell itself still settles");
    assert_eq!(flux[(3, 1)], 0.5, "below the gap the stream restarts");
    for (r, c) in (0..4).flat_map(|r| (0..4).map(move |c| (r, c))) {
        if (r, c) != (2, 1) {
            assert!(flux[(r, c)].is_finite(), "cell ({r}, {c})");
            assert_eq!(state[(r, c)], 0.5, "cell ({r}, {c})");
        }
    }
}

#[test]
fn all_no_data_flow_direction_yields_no_data_everywhere() {
    let flow_direction = PartitionedArray::filled((6, 6), (2, 3), NO_DATA).unwrap();
    let material: PartitionedArray<f64> = PartitionedArray::filled((6, 6), (2, 3), 3.0).unwrap();
    let threshold = PartitionedArray::filled((6, 6), (2, 3), 1.0).unwrap();

    let plain = accu(&flow_direction, &material).unwrap();
    assert!(plain.to_array().iter().all(|v| v.is_nan()));

    let (flux, state) = accu_threshold3(&flow_direction, &material, &threshold).unwrap();
    assert!(flux.to_array().iter().all(|v| v.is_nan()));
    assert!(state.to_array().iter().all(|v| v.is_nan()));
}

#[test]
fn elevation_to_accumulation_pipeline() {
    // A valley along the middle column of a tilted surface
    let elevation = PartitionedArray::from_shape_fn((9, 9), (3, 3), |(r, c)| {
        let across = (c as f64 - 4.0).abs();
        across * 10.0 + (8 - r) as f64
    })
    .unwrap();

    let flow_direction = d8_flow_direction(&elevation).unwrap();
    let counts = inflow_count(&flow_direction).unwrap();
    let material = PartitionedArray::filled((9, 9), (3, 3), 1.0).unwrap();
    let result = accu(&flow_direction, &material).unwrap().to_array();

    // The valley bottom collects more than any cell of the side slopes
    let valley_outlet = result[(8, 4)];
    for r in 0..9 {
        for c in [0, 1, 2, 6, 7, 8] {
            assert!(result[(r, c)] < valley_outlet, "cell ({r}, {c})");
        }
    }

    // Counts and classes agree on ridges
    let info = accu_info(&flow_direction).unwrap();
    let counts = counts.to_array();
    let classes = info.cell_class.to_array();
    for r in 0..9 {
        for c in 0..9 {
            if classes[(r, c)] == rillflow_routing::cell_class::RIDGE {
                assert_eq!(counts[(r, c)], 0, "ridge cell ({r}, {c})");
            }
        }
    }
}

#[test]
fn accu_matches_itself_under_many_tilings() {
    let codes = |(r, c): (usize, usize)| {
        if (r, c) == (6, 0) {
            SINK
        } else if r == 6 {
            WEST
        } else if c % 2 == 0 {
            SOUTH
        } else {
            SOUTH_WEST
        }
    };
    let material_of = |(r, c): (usize, usize)| (1 + (r * 13 + c * 7) % 5) as f64;

    let reference = {
        let flow_direction = PartitionedArray::from_shape_fn((7, 7), (7, 7), codes).unwrap();
        let material = PartitionedArray::from_shape_fn((7, 7), (7, 7), material_of).unwrap();
        accu(&flow_direction, &material).unwrap().to_array()
    };

    for partition_shape in [(1, 1), (2, 2), (3, 4), (7, 1)] {
        let flow_direction =
            PartitionedArray::from_shape_fn((7, 7), partition_shape, codes).unwrap();
        let material =
            PartitionedArray::from_shape_fn((7, 7), partition_shape, material_of).unwrap();
        let result = accu(&flow_direction, &material).unwrap().to_array();

        assert_eq!(result, reference, "partition shape {partition_shape:?}");
    }
}
