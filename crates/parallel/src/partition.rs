//! A rectangular sub-array of a logical array

use ndarray::Array2;
use rillflow_core::Element;
use std::sync::Arc;

/// One rectangular partition of a [`PartitionedArray`].
///
/// Owns a dense buffer for a sub-rectangle of the logical array, plus the
/// offset of that rectangle within the full extent. The buffer is
/// reference-counted: in-flight tasks keep a partition alive after the
/// array it came from moved on.
///
/// [`PartitionedArray`]: crate::PartitionedArray
#[derive(Debug, Clone)]
pub struct Partition<T: Element> {
    /// (row, col) of this partition's first cell within the full array
    offset: (usize, usize),
    data: Arc<Array2<T>>,
}

impl<T: Element> Partition<T> {
    pub fn new(offset: (usize, usize), data: Array2<T>) -> Self {
        Self {
            offset,
            data: Arc::new(data),
        }
    }

    /// Partition filled with a single value
    pub fn filled(offset: (usize, usize), shape: (usize, usize), value: T) -> Self {
        Self::new(offset, Array2::from_elem(shape, value))
    }

    pub fn offset(&self) -> (usize, usize) {
        self.offset
    }

    /// Shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reference to the dense buffer
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Value at partition-local (row, col)
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[(row, col)]
    }

    /// Whether the partition-local cell lies on the partition's outer edge
    pub fn on_border(&self, row: usize, col: usize) -> bool {
        let (rows, cols) = self.shape();
        row == 0 || row == rows - 1 || col == 0 || col == cols - 1
    }
}
