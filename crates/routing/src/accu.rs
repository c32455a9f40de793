//! Unconditional flow accumulation

use crate::accumulate::SumAccumulator;
use crate::router::{assemble, build_sessions, require_same_partitioning, run_rounds};
use rillflow_core::{MaterialElement, NoData, Result};
use rillflow_parallel::PartitionedArray;
use tracing::debug;

/// Accumulate `material` along the flow directions.
///
/// Every cell's output is its own material plus everything received from
/// upstream; nothing is retained. No-data flow direction or material at a
/// cell makes that cell and everything downstream of it no-data.
pub fn accu<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
) -> Result<PartitionedArray<M>>
where
    M: MaterialElement,
{
    accu_with(flow_direction, material, NoData::default())
}

/// [`accu`] with a caller-chosen material no-data policy
pub fn accu_with<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
    no_data: NoData<M>,
) -> Result<PartitionedArray<M>>
where
    M: MaterialElement,
{
    require_same_partitioning(flow_direction, material, "material")?;
    debug!(shape = ?flow_direction.shape(), "accu");

    let mut sessions = build_sessions(flow_direction, |gr, gc, _| {
        SumAccumulator::new(material.partition(gr, gc).clone(), no_data)
    });
    run_rounds(flow_direction.shape_in_partitions(), &mut sessions);

    let buffers = sessions
        .into_iter()
        .map(|session| session.into_accumulator().into_flux())
        .collect();
    assemble(flow_direction, buffers)
}
