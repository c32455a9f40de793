//! Flow accumulation passing a per-cell fraction downstream

use crate::accumulate::FractionAccumulator;
use crate::router::{assemble, build_sessions, require_same_partitioning, run_rounds};
use rillflow_core::{DomainMode, MaterialElement, NoData, Result};
use rillflow_parallel::PartitionedArray;
use tracing::debug;

/// Accumulate `material` along the flow directions, each cell passing
/// `fraction * inflow` downstream and retaining the rest.
///
/// Returns `(flux, state)` with `flux + state` equal to the accumulated
/// inflow wherever inputs are valid. Fractions must lie in (0, 1];
/// out-of-domain fractions yield no-data under the default lenient policy.
pub fn accu_fraction<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
    fraction: &PartitionedArray<M>,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    accu_fraction_with(
        flow_direction,
        material,
        fraction,
        NoData::default(),
        DomainMode::default(),
    )
}

/// [`accu_fraction`] with caller-chosen no-data and domain policies
pub fn accu_fraction_with<M>(
    flow_direction: &PartitionedArray<u8>,
    material: &PartitionedArray<M>,
    fraction: &PartitionedArray<M>,
    no_data: NoData<M>,
    domain: DomainMode,
) -> Result<(PartitionedArray<M>, PartitionedArray<M>)>
where
    M: MaterialElement,
{
    require_same_partitioning(flow_direction, material, "material")?;
    require_same_partitioning(flow_direction, fraction, "fraction")?;
    debug!(shape = ?flow_direction.shape(), "accu_fraction");

    let mut sessions = build_sessions(flow_direction, |gr, gc, _| {
        FractionAccumulator::new(
            material.partition(gr, gc).clone(),
            fraction.partition(gr, gc).clone(),
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
