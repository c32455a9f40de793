//! Flow accumulation with a per-cell retention threshold

use crate::accumulate::ThresholdAccumulator;
use crate::router::{assemble, build_sessions, require_same_partitioning, run_rounds};
use rillflow_core::{DomainMode, MaterialElement, NoData, Result};
use rillflow_parallel::PartitionedArray;
use tracing::debug;

/// Accumulate `material` along the flow directions, each cell retaining up
/// to `threshold` and passing the rest downstream.
///
/// Returns `(flux, state)`: for every cell with valid inputs,
/// `flux + state` equals the cell's accumulated inflow, with
/// `state = min(inflow, threshold)`. Thresholds must be non-negative;
/// negative ones yield no-data under the default lenient policy.
pub fn accu_threshold<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
    threshold: &PartitionedArray<M>,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    accu_threshold_with(
        flow_direction,
        material,
        threshold,
        NoData::default(),
        DomainMode::default(),
    )
}

/// [`accu_threshold`] with caller-chosen no-data and domain policies
pub fn accu_threshold_with<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
    threshold: &PartitionedArray<M>,
    no_data: NoData<M>,
    domain: DomainMode,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    require_same_partitioning(flow_direction, material, "material")?;
    require_same_partitioning(flow_direction, threshold, "threshold")?;
    debug!(shape = ?flow_direction.shape(), "accu_threshold");

    let mut sessions = build_sessions(flow_direction, |gr, gc, _| {
        ThresholdAccumulator::new(
            material.partition(gr, gc).clone(),
            threshold.partition(gr, gc).clone(),
            no_data,
            domain,
        )
    });
    run_rounds(flow_direction.shape_in_partitions(), &mut sessions);

    let (flux, state): (Vec<_>, Vec<_>) = sessions
        .into_iter()
        .map(|session| session.into_accumulator().into_outputs())
        .unzip();

    Ok((
        assemble(flow_direction, flux)?,
        assemble(flow_direction, state)?,
    ))
}
