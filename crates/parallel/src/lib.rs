//! # Rillflow Parallel
//!
//! Partitioned-array substrate and inter-partition communication for
//! Rillflow.
//!
//! This crate provides:
//! - `Partition` / `PartitionedArray`: a logical 2-D array split into a grid
//!   of rectangular partitions, each owned by a locality
//! - `Direction` / `Communicator` / `CommunicatorGrid`: one bidirectional
//!   channel per compass direction between each partition and its neighbor

pub mod array;
pub mod communicator;
pub mod halo;
pub mod partition;

pub use array::{Localities, Locality, PartitionedArray};
pub use communicator::{Communicator, CommunicatorGrid, Direction};
pub use halo::Halo;
pub use partition::Partition;
