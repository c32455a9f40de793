//! Accumulation rules
//!
//! An accumulator owns the per-partition output buffers of one run and
//! implements the cell-level contract the walk drives: fold external
//! material into a cell once all upstream contributions arrived, push an
//! entered cell's flux downstream, and fold values delivered from
//! neighboring partitions.
//!
//! Running totals live in the flux buffer until a cell is entered; entering
//! splits the total into flux and retained state according to the rule.

use ndarray::Array2;
use rillflow_core::{DomainMode, MaterialElement, NoData};
use rillflow_parallel::Partition;

pub trait CellAccumulator {
    type Material: MaterialElement;

    /// Mark the cell's outputs as no-data
    fn mark_no_data(&mut self, cell: (usize, usize));

    /// Fold the cell's external material into its running total and split
    /// the result, once all upstream contributions are in
    fn enter_cell(&mut self, cell: (usize, usize));

    /// Add the entered upstream cell's flux to the downstream cell's
    /// running total
    fn push_downstream(&mut self, upstream: (usize, usize), downstream: (usize, usize));

    /// Fold a value delivered from a neighboring partition into the cell's
    /// running total
    fn receive(&mut self, cell: (usize, usize), value: Self::Material);

    /// Value leaving the partition at a partition-output cell
    fn outflow(&self, cell: (usize, usize)) -> Self::Material;
}

/// Unconditional sum: every cell passes everything downstream
pub struct SumAccumulator<M: MaterialElement> {
    inflow: Partition<M>,
    flux: Array2<M>,
    no_data: NoData<M>,
}

impl<M: MaterialElement> SumAccumulator<M> {
    pub fn new(inflow: Partition<M>, no_data: NoData<M>) -> Self {
        let flux = Array2::zeros(inflow.shape());
        Self {
            inflow,
            flux,
            no_data,
        }
    }

    pub fn into_flux(self) -> Array2<M> {
        self.flux
    }
}

impl<M: MaterialElement> CellAccumulator for SumAccumulator<M> {
    type Material = M;

    fn mark_no_data(&mut self, cell: (usize, usize)) {
        self.no_data.mark_no_data(&mut self.flux[cell]);
    }

    fn enter_cell(&mut self, cell: (usize, usize)) {
        if self.no_data.is_no_data(self.flux[cell]) {
            return;
        }
        let material = self.inflow.get(cell.0, cell.1);
        if self.no_data.is_no_data(material) {
            self.mark_no_data(cell);
        } else {
            self.flux[cell] = self.flux[cell] + material;
        }
    }

    fn push_downstream(&mut self, upstream: (usize, usize), downstream: (usize, usize)) {
        let value = self.flux[upstream];
        self.receive(downstream, value);
    }

    fn receive(&mut self, cell: (usize, usize), value: M) {
        if self.no_data.is_no_data(self.flux[cell]) {
            return;
        }
        if self.no_data.is_no_data(value) {
            self.mark_no_data(cell);
        } else {
            self.flux[cell] = self.flux[cell] + value;
        }
    }

    fn outflow(&self, cell: (usize, usize)) -> M {
        self.flux[cell]
    }
}

/// Threshold split: each cell retains up to its threshold, the rest flows
/// on. Thresholds must be non-negative.
pub struct ThresholdAccumulator<M: MaterialElement> {
    material: Partition<M>,
    threshold: Partition<M>,
    flux: Array2<M>,
    state: Array2<M>,
    no_data: NoData<M>,
    domain: DomainMode,
}

impl<M: MaterialElement> ThresholdAccumulator<M> {
    pub fn new(
        material: Partition<M>,
        threshold: Partition<M>,
        no_data: NoData<M>,
        domain: DomainMode,
    ) -> Self {
        let shape = material.shape();
        Self {
            material,
            threshold,
            flux: Array2::zeros(shape),
            state: Array2::zeros(shape),
            no_data,
            domain,
        }
    }

    pub fn into_outputs(self) -> (Array2<M>, Array2<M>) {
        (self.flux, self.state)
    }
}

impl<M: MaterialElement> CellAccumulator for ThresholdAccumulator<M> {
    type Material = M;

    fn mark_no_data(&mut self, cell: (usize, usize)) {
        self.no_data.mark_no_data(&mut self.flux[cell]);
        self.no_data.mark_no_data(&mut self.state[cell]);
    }

    fn enter_cell(&mut self, cell: (usize, usize)) {
        if self.no_data.is_no_data(self.flux[cell]) {
            self.no_data.mark_no_data(&mut self.state[cell]);
            return;
        }

        let material = self.material.get(cell.0, cell.1);
        let threshold = self.threshold.get(cell.0, cell.1);
        if self.no_data.is_no_data(material) || self.no_data.is_no_data(threshold) {
            self.mark_no_data(cell);
            return;
        }
        if !self
            .domain
            .check(threshold >= M::zero(), "threshold >= 0")
        {
            self.mark_no_data(cell);
            return;
        }

        let total = self.flux[cell] + material;
        let retained = if total < threshold { total } else { threshold };
        self.state[cell] = retained;
        self.flux[cell] = total - retained;
    }

    fn push_downstream(&mut self, upstream: (usize, usize), downstream: (usize, usize)) {
        let value = self.flux[upstream];
        self.receive(downstream, value);
    }

    fn receive(&mut self, cell: (usize, usize), value: M) {
        if self.no_data.is_no_data(self.flux[cell]) {
            return;
        }
        if self.no_data.is_no_data(value) {
            self.mark_no_data(cell);
        } else {
            self.flux[cell] = self.flux[cell] + value;
        }
    }

    fn outflow(&self, cell: (usize, usize)) -> M {
        self.flux[cell]
    }
}

/// Fraction split: each cell passes `fraction * total` downstream and
/// retains the rest. Fractions must lie in (0, 1].
pub struct FractionAccumulator<M: MaterialElement> {
    material: Partition<M>,
    fraction: Partition<M>,
    flux: Array2<M>,
    state: Array2<M>,
    no_data: NoData<M>,
    domain: DomainMode,
}

impl<M: MaterialElement> FractionAccumulator<M> {
    pub fn new(
        material: Partition<M>,
        fraction: Partition<M>,
        no_data: NoData<M>,
        domain: DomainMode,
    ) -> Self {
        let shape = material.shape();
        Self {
            material,
            fraction,
            flux: Array2::zeros(shape),
            state: Array2::zeros(shape),
            no_data,
            domain,
        }
    }

    pub fn into_outputs(self) -> (Array2<M>, Array2<M>) {
        (self.flux, self.state)
    }
}

impl<M: MaterialElement> CellAccumulator for FractionAccumulator<M> {
    type Material = M;

    fn mark_no_data(&mut self, cell: (usize, usize)) {
        self.no_data.mark_no_data(&mut self.flux[cell]);
        self.no_data.mark_no_data(&mut self.state[cell]);
    }

    fn enter_cell(&mut self, cell: (usize, usize)) {
        if self.no_data.is_no_data(self.flux[cell]) {
            self.no_data.mark_no_data(&mut self.state[cell]);
            return;
        }

        let material = self.material.get(cell.0, cell.1);
        let fraction = self.fraction.get(cell.0, cell.1);
        if self.no_data.is_no_data(material) || self.no_data.is_no_data(fraction) {
            self.mark_no_data(cell);
            return;
        }
        if !self.domain.check(
            fraction > M::zero() && fraction <= M::one(),
            "fraction in (0, 1]",
        ) {
            self.mark_no_data(cell);
            return;
        }

        let total = self.flux[cell] + material;
        let flux = fraction * total;
        self.flux[cell] = flux;
        self.state[cell] = total - flux;
    }

    fn push_downstream(&mut self, upstream: (usize, usize), downstream: (usize, usize)) {
        let value = self.flux[upstream];
        self.receive(downstream, value);
    }

    fn receive(&mut self, cell: (usize, usize), value: M) {
        if self.no_data.is_no_data(self.flux[cell]) {
            return;
        }
        if self.no_data.is_no_data(value) {
            self.mark_no_data(cell);
        } else {
            self.flux[cell] = self.flux[cell] + value;
        }
    }

    fn outflow(&self, cell: (usize, usize)) -> M {
        self.flux[cell]
    }
}
