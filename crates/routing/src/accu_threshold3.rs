//! Streaming threshold accumulation
//!
//! Behaviorally identical to [`accu_threshold()`], but cross-partition flow
//! is streamed per cell through the communicator instead of batched into
//! exchange rounds. Each partition gets a walk task plus one receiver task
//! per incoming channel with predicted traffic; the tasks share the
//! partition's session behind a mutex. A receiver consumes exactly the
//! number of messages the inflow pass predicted for its channel.
//!
//! [`accu_threshold()`]: crate::accu_threshold()

use crate::accumulate::ThresholdAccumulator;
use crate::inflow_count::partition_inflow;
use crate::router::{assemble, require_same_partitioning, Outgoing, Session};
use rayon::prelude::*;
use rillflow_core::{DomainMode, MaterialElement, NoData, Result};
use rillflow_parallel::{Communicator, CommunicatorGrid, Direction, PartitionedArray};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;

/// Streamed [`accu_threshold`](crate::accu_threshold()): same outputs, but
/// partitions hand values downstream as soon as each border cell settles.
pub fn accu_threshold3<M>(
    flow_direction: &PartitionedArray<u8>,
    external_inflow: &PartitionedArray<M>,
    threshold: &PartitionedArray<M>,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    accu_threshold3_with(
        flow_direction,
        external_inflow,
        threshold,
        NoData::default(),
        DomainMode::default(),
    )
}

/// [`accu_threshold3`] with caller-chosen no-data and domain policies
pub fn accu_threshold3_with<M>(
    flow_direction: &PartitionedArray<u8>,
    external_inflow: &PartitionedArray<M>,
    threshold: &PartitionedArray<M>,
    no_data: NoData<M>,
    domain: DomainMode,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    require_same_partitioning(flow_direction, external_inflow, "external inflow")?;
    require_same_partitioning(flow_direction, threshold, "threshold")?;

    let (grid_rows, grid_cols) = flow_direction.shape_in_partitions();
    let nr_partitions = flow_direction.nr_partitions();
    debug!(shape = ?flow_direction.shape(), partitions = nr_partitions, "accu_threshold3");

    let inflows: Vec<_> = (0..nr_partitions)
        .into_par_iter()
        .map(|i| partition_inflow(flow_direction, i / grid_cols, i % grid_cols))
        .collect();

    let sessions: Vec<Arc<Mutex<Session<ThresholdAccumulator<M>>>>> = inflows
        .iter()
        .enumerate()
        .map(|(i, inflow)| {
            let (gr, gc) = (i / grid_cols, i % grid_cols);
            let accumulator = ThresholdAccumulator::new(
                external_inflow.partition(gr, gc).clone(),
                threshold.partition(gr, gc).clone(),
                no_data,
                domain,
            );
            Arc::new(Mutex::new(Session::new(
                flow_direction.partition(gr, gc).clone(),
                inflow,
                accumulator,
            )))
        })
        .collect();

    let mut grid = CommunicatorGrid::<(usize, M)>::new((grid_rows, grid_cols));

    thread::scope(|scope| {
        for i in 0..nr_partitions {
            let (gr, gc) = (i / grid_cols, i % grid_cols);
            let mut communicator = grid.take(gr, gc);

            let mut receivers = Vec::new();
            for direction in Direction::ALL {
                let expected = inflows[i].expected[direction.index()];
                if expected > 0 {
                    let receiver = communicator
                        .take_receiver(direction)
                        .expect("messages predicted over an unwired channel");
                    receivers.push((direction, receiver, expected));
                }
            }

            let communicator = Arc::new(communicator);

            {
                let session = Arc::clone(&sessions[i]);
                let communicator = Arc::clone(&communicator);
                scope.spawn(move || {
                    let mut out = Vec::new();
                    session
                        .lock()
                        .expect("partition task panicked holding the session")
                        .start(&mut out);
                    forward(&communicator, out);
                });
            }

            for (direction, receiver, expected) in receivers {
                let session = Arc::clone(&sessions[i]);
                let communicator = Arc::clone(&communicator);
                scope.spawn(move || {
                    for _ in 0..expected {
                        let (index, value) = receiver
                            .recv()
                            .expect("channel closed before all predicted messages arrived");
                        let mut out = Vec::new();
                        session
                            .lock()
                            .expect("partition task panicked holding the session")
                            .deliver(direction, index, value, &mut out);
                        forward(&communicator, out);
                    }
                });
            }
        }
    });

    let (flux, state): (Vec<_>, Vec<_>) = sessions
        .into_iter()
        .map(|session| {
            Arc::try_unwrap(session)
                .ok()
                .expect("all partition tasks finished")
                .into_inner()
                .expect("partition task panicked holding the session")
                .into_accumulator()
                .into_outputs()
        })
        .unzip();

    Ok((
        assemble(flow_direction, flux)?,
        assemble(flow_direction, state)?,
    ))
}

fn forward<M: MaterialElement>(communicator: &Communicator<(usize, M)>, out: Vec<Outgoing<M>>) {
    for message in out {
        communicator.send(message.direction, (message.index, message.value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accu_threshold::accu_threshold;
    use crate::flow_direction::{EAST, NO_DATA, SINK, SOUTH, SOUTH_EAST};

    fn fixture(
        partition_shape: (usize, usize),
    ) -> (
        PartitionedArray<u8>,
        PartitionedArray<f64>,
        PartitionedArray<f64>,
    ) {
        let codes = |(r, c): (usize, usize)| {
            if (r, c) == (8, 8) {
                SINK
            } else if r == 8 {
                EAST
            } else if c == 8 {
                SOUTH
            } else if (r + c) % 4 == 0 {
                SOUTH_EAST
            } else if r % 3 == 0 {
                SOUTH
            } else {
                EAST
            }
        };
        let flow_direction = PartitionedArray::from_shape_fn((9, 9), partition_shape, codes).unwrap();
        let inflow =
            PartitionedArray::from_shape_fn((9, 9), partition_shape, |(r, c)| {
                (1 + (r * c) % 3) as f64
            })
            .unwrap();
        let threshold = PartitionedArray::filled((9, 9), partition_shape, 1.5_f64).unwrap();
        (flow_direction, inflow, threshold)
    }

    #[test]
    fn matches_the_batch_variant() {
        let (flow_direction, inflow, threshold) = fixture((3, 3));

        let (flux3, state3) = accu_threshold3(&flow_direction, &inflow, &threshold).unwrap();
        let (flux, state) = accu_threshold(&flow_direction, &inflow, &threshold).unwrap();

        assert_eq!(flux3.to_array(), flux.to_array());
        assert_eq!(state3.to_array(), state.to_array());
    }

    #[test]
    fn result_is_independent_of_partitioning() {
        let (flow_direction, inflow, threshold) = fixture((9, 9));
        let (reference_flux, reference_state) =
            accu_threshold3(&flow_direction, &inflow, &threshold).unwrap();

        for partition_shape in [(3, 3), (2, 5), (4, 4)] {
            let (flow_direction, inflow, threshold) = fixture(partition_shape);
            let (flux, state) = accu_threshold3(&flow_direction, &inflow, &threshold).unwrap();

            assert_eq!(flux.to_array(), reference_flux.to_array(), "{partition_shape:?}");
            assert_eq!(state.to_array(), reference_state.to_array(), "{partition_shape:?}");
        }
    }

    #[test]
    fn no_data_flow_direction_stays_no_data() {
        let flow_direction = PartitionedArray::from_shape_fn((4, 4), (2, 2), |(r, _)| {
            if r == 0 {
                NO_DATA
            } else {
                SOUTH
            }
        })
        .unwrap();
        let inflow = PartitionedArray::filled((4, 4), (2, 2), 1.0_f64).unwrap();
        let threshold = PartitionedArray::filled((4, 4), (2, 2), 0.5_f64).unwrap();

        let (flux, state) = accu_threshold3(&flow_direction, &inflow, &threshold).unwrap();
        let flux = flux.to_array();
        let state = state.to_array();

        for c in 0..4 {
            assert!(flux[(0, c)].is_nan());
            assert!(state[(0, c)].is_nan());
            assert!(flux[(3, c)].is_finite(), "valid rows are unaffected");
            assert!(state[(3, c)].is_finite());
        }
    }
}
