//! Partitioned 2-D arrays

use crate::partition::Partition;
use ndarray::Array2;
use rillflow_core::{Element, Error, Result};

/// Identifier of the compute node owning a partition.
///
/// In this process-local implementation a locality maps to a worker slot;
/// the type exists so operations stay explicit about where each partition's
/// work is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locality(pub usize);

/// Grid of localities, same shape as the partition grid
pub type Localities = Array2<Locality>;

/// Assign localities round-robin over the available parallelism
pub fn default_localities(shape_in_partitions: (usize, usize)) -> Localities {
    let slots = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let (rows, cols) = shape_in_partitions;

    Array2::from_shape_fn((rows, cols), |(r, c)| Locality((r * cols + c) % slots))
}

/// A logical 2-D array split into a grid of rectangular partitions.
///
/// Invariant: the partitions form a non-overlapping, fully covering tiling
/// of `shape`, and the partition grid has the same shape as the locality
/// grid. Constructors validate this; all cross-partition operations are
/// expressed as tasks over the partitions.
#[derive(Debug, Clone)]
pub struct PartitionedArray<T: Element> {
    shape: (usize, usize),
    localities: Localities,
    partitions: Array2<Partition<T>>,
}

impl<T: Element> PartitionedArray<T> {
    /// Construct from parts, validating the tiling invariant.
    pub fn new(
        shape: (usize, usize),
        localities: Localities,
        partitions: Array2<Partition<T>>,
    ) -> Result<Self> {
        if localities.dim() != partitions.dim() {
            return Err(Error::PartitioningMismatch(format!(
                "locality grid {:?} vs partition grid {:?}",
                localities.dim(),
                partitions.dim()
            )));
        }

        let (grid_rows, grid_cols) = partitions.dim();
        if grid_rows == 0 || grid_cols == 0 {
            return Err(Error::InvalidDimensions { rows: grid_rows, cols: grid_cols });
        }

        // Row heights must agree along each grid row, column widths along
        // each grid column, and offsets must accumulate exactly.
        let mut row_offset = 0;
        for gr in 0..grid_rows {
            let height = partitions[(gr, 0)].rows();
            let mut col_offset = 0;

            for gc in 0..grid_cols {
                let partition = &partitions[(gr, gc)];
                let width = partitions[(0, gc)].cols();

                if partition.shape() != (height, width)
                    || partition.offset() != (row_offset, col_offset)
                {
                    return Err(Error::PartitioningMismatch(format!(
                        "partition ({gr}, {gc}) at {:?} with shape {:?} does not tile",
                        partition.offset(),
                        partition.shape()
                    )));
                }

                col_offset += width;
            }

            if col_offset != shape.1 {
                return Err(Error::PartitioningMismatch(format!(
                    "grid row {gr} covers {col_offset} columns, array has {}",
                    shape.1
                )));
            }

            row_offset += height;
        }

        if row_offset != shape.0 {
            return Err(Error::PartitioningMismatch(format!(
                "partitions cover {row_offset} rows, array has {}",
                shape.0
            )));
        }

        Ok(Self { shape, localities, partitions })
    }

    /// Create an array of `shape`, tiled by `partition_shape`, filled with
    /// `fill`. Partitions in the last grid row/column may be smaller.
    pub fn filled(
        shape: (usize, usize),
        partition_shape: (usize, usize),
        fill: T,
    ) -> Result<Self> {
        Self::from_shape_fn(shape, partition_shape, |_| fill)
    }

    /// Create an array of `shape`, tiled by `partition_shape`, with each
    /// cell's value produced from its (row, col) in the full array.
    pub fn from_shape_fn(
        shape: (usize, usize),
        partition_shape: (usize, usize),
        mut f: impl FnMut((usize, usize)) -> T,
    ) -> Result<Self> {
        let (rows, cols) = shape;
        let (p_rows, p_cols) = partition_shape;

        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions { rows, cols });
        }
        if p_rows == 0 || p_cols == 0 {
            return Err(Error::InvalidDimensions { rows: p_rows, cols: p_cols });
        }

        let grid_rows = rows.div_ceil(p_rows);
        let grid_cols = cols.div_ceil(p_cols);

        let mut partitions = Vec::with_capacity(grid_rows * grid_cols);

        for gr in 0..grid_rows {
            for gc in 0..grid_cols {
                let offset = (gr * p_rows, gc * p_cols);
                let height = p_rows.min(rows - offset.0);
                let width = p_cols.min(cols - offset.1);

                let data = Array2::from_shape_fn((height, width), |(r, c)| {
                    f((offset.0 + r, offset.1 + c))
                });
                partitions.push(Partition::new(offset, data));
            }
        }

        let partitions = Array2::from_shape_vec((grid_rows, grid_cols), partitions)
            .map_err(|e| Error::Other(e.to_string()))?;
        let localities = default_localities((grid_rows, grid_cols));

        Self::new(shape, localities, partitions)
    }

    /// Partition a dense array by `partition_shape`
    pub fn from_array(data: &Array2<T>, partition_shape: (usize, usize)) -> Result<Self> {
        Self::from_shape_fn(data.dim(), partition_shape, |(r, c)| data[(r, c)])
    }

    /// Full extent as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Shape of the partition grid
    pub fn shape_in_partitions(&self) -> (usize, usize) {
        self.partitions.dim()
    }

    pub fn nr_partitions(&self) -> usize {
        self.partitions.len()
    }

    pub fn localities(&self) -> &Localities {
        &self.localities
    }

    pub fn partitions(&self) -> &Array2<Partition<T>> {
        &self.partitions
    }

    /// Partition by (row, col) grid index
    pub fn partition(&self, grid_row: usize, grid_col: usize) -> &Partition<T> {
        &self.partitions[(grid_row, grid_col)]
    }

    /// Partition by linear grid index (row-major)
    pub fn partition_linear(&self, idx: usize) -> &Partition<T> {
        let (_, grid_cols) = self.partitions.dim();
        &self.partitions[(idx / grid_cols, idx % grid_cols)]
    }

    /// Whether `other` shares this array's shape and partition grid
    pub fn same_partitioning<U: Element>(&self, other: &PartitionedArray<U>) -> bool {
        self.shape == other.shape
            && self.partitions.dim() == other.partitions.dim()
            && self
                .partitions
                .iter()
                .zip(other.partitions.iter())
                .all(|(a, b)| a.offset() == b.offset() && a.shape() == b.shape())
    }

    /// Assemble the full dense array. Intended for assembling final results
    /// and for tests; large arrays should stay partitioned.
    pub fn to_array(&self) -> Array2<T> {
        let mut out = Array2::from_elem(self.shape, T::zero());

        for partition in self.partitions.iter() {
            let (ro, co) = partition.offset();
            let (rows, cols) = partition.shape();

            for r in 0..rows {
                for c in 0..cols {
                    out[(ro + r, co + c)] = partition.get(r, c);
                }
            }
        }

        out
    }

    /// Value at (row, col) in the full array
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        let (rows, cols) = self.shape;
        if row >= rows || col >= cols {
            return Err(Error::IndexOutOfBounds { row, col, rows, cols });
        }

        for partition in self.partitions.iter() {
            let (ro, co) = partition.offset();
            let (pr, pc) = partition.shape();
            if row >= ro && row < ro + pr && col >= co && col < co + pc {
                return Ok(partition.get(row - ro, col - co));
            }
        }

        unreachable!("tiling invariant guarantees a covering partition");
    }
}
