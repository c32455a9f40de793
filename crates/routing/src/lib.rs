//! # Rillflow Routing
//!
//! Flow-direction derivation and flow accumulation over partitioned
//! rasters.
//!
//! Cells carry an eight-direction flow code ([`flow_direction`]); material
//! is routed along these codes by the accumulation operations, which split
//! it into flux passed downstream and state retained per cell:
//!
//! - [`d8_flow_direction()`]: steepest-descent directions from elevation
//! - [`inflow_count()`]: upstream contributors per cell
//! - [`accu()`]: unconditional accumulation
//! - [`accu_threshold()`] / [`accu_fraction()`]: flux/state splitting variants
//! - [`accu_threshold3()`]: streaming cross-partition threshold variant
//! - [`accu_info()`]: per-cell role classification under a partitioning
//!
//! All operations take inputs of identical shape and partitioning and
//! return arrays partitioned the same way. Partitions are processed in
//! parallel; values crossing a partition border travel as
//! (border index, value) messages between neighboring partitions.

pub mod accu;
pub mod accu_fraction;
pub mod accu_info;
pub mod accu_threshold;
pub mod accu_threshold3;
pub mod accumulate;
pub mod d8;
pub mod flow_direction;
pub mod inflow_count;
mod router;

pub use accu::{accu, accu_with};
pub use accu_fraction::{accu_fraction, accu_fraction_with};
pub use accu_info::{accu_info, cell_class, AccuInfo};
pub use accu_threshold::{accu_threshold, accu_threshold_with};
pub use accu_threshold3::{accu_threshold3, accu_threshold3_with};
pub use accumulate::{
    CellAccumulator, FractionAccumulator, SumAccumulator, ThresholdAccumulator,
};
pub use d8::{d8_flow_direction, d8_flow_direction_with};
pub use inflow_count::inflow_count;

/// Common imports for working with the routing operations
pub mod prelude {
    pub use crate::accu::accu;
    pub use crate::accu_fraction::accu_fraction;
    pub use crate::accu_info::{accu_info, AccuInfo};
    pub use crate::accu_threshold::accu_threshold;
    pub use crate::accu_threshold3::accu_threshold3;
    pub use crate::d8::d8_flow_direction;
    pub use crate::flow_direction;
    pub use crate::inflow_count::inflow_count;
    pub use rillflow_core::{DomainMode, Element, MaterialElement, NoData};
    pub use rillflow_parallel::{Partition, PartitionedArray};
}
