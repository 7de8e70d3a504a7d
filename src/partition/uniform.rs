//! Uniform-grid partitioner: splits every dimension into a fixed number of
//! equal parts, propagates each cell independently, and aggregates
//! (§4.6's "Uniform" variant, and spec.md's monotone-refinement property:
//! `Uniform(k) subset-or-eq Uniform(k')` for `k <= k'` elementwise).

use rayon::prelude::*;

use crate::closed_loop;
use crate::constraint::{BoundaryType, BoxSet};
use crate::diagnostics::Diagnostics;
use crate::dynamics::Dynamics;
use crate::network::Network;
use crate::propagator::{Propagator, PropagatorError};

use super::{hull_cells, PartitionContext, Partitioner, StepOutcome};

/// Splits each dimension `i` of the input set into `num_partitions[i]`
/// equal parts (a dimension not present in `num_partitions` gets 1 part,
/// i.e. is left unsplit).
///
/// Grid cells are independent by construction (§4.6), so this is the one
/// partitioner where §5's parallel mode applies directly: when `parallel`
/// is set, every cell's closed-loop step runs on the `rayon` global pool
/// and the per-cell diagnostics are folded back on the calling thread in
/// grid order, so the recorded warnings stay deterministic even though the
/// propagation order does not. The final reduction (`hull_cells`) is
/// associative, so the aggregate bound is identical either way.
#[derive(Debug, Clone)]
pub struct UniformPartitioner {
    num_partitions: Vec<usize>,
    parallel: bool,
}

impl UniformPartitioner {
    /// Builds a serial partitioner with the given per-dimension part counts.
    pub fn new(num_partitions: Vec<usize>) -> Self {
        Self {
            num_partitions,
            parallel: false,
        }
    }

    /// Builds a partitioner that propagates its grid cells on the `rayon`
    /// global thread pool instead of in a sequential loop.
    pub fn new_parallel(num_partitions: Vec<usize>) -> Self {
        Self {
            num_partitions,
            parallel: true,
        }
    }

    fn parts_for(&self, axis: usize) -> usize {
        self.num_partitions.get(axis).copied().unwrap_or(1).max(1)
    }

    /// Enumerates every grid cell of `state` as a vector of per-axis
    /// `(lb, ub)` sub-intervals, via a mixed-radix counter over the
    /// per-dimension part counts.
    fn grid_cells(&self, state: &BoxSet) -> Vec<BoxSet> {
        let dim = state.dim();
        let parts: Vec<usize> = (0..dim).map(|axis| self.parts_for(axis)).collect();
        let total: usize = parts.iter().product();
        let mut cells = Vec::with_capacity(total);
        for mut idx in 0..total {
            let mut lb = state.lb().clone();
            let mut ub = state.ub().clone();
            for axis in 0..dim {
                let p = parts[axis];
                let coord = idx % p;
                idx /= p;
                let width = (state.ub()[axis] - state.lb()[axis]) / p as f64;
                lb[axis] = state.lb()[axis] + coord as f64 * width;
                ub[axis] = if coord + 1 == p {
                    state.ub()[axis]
                } else {
                    state.lb()[axis] + (coord + 1) as f64 * width
                };
            }
            cells.push(BoxSet::new(lb, ub).expect("grid sub-cell stays ordered"));
        }
        cells
    }
}

impl Partitioner for UniformPartitioner {
    fn bound_step(
        &self,
        state: &BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        propagator: &dyn Propagator,
        boundary_type: BoundaryType,
        ctx: &mut PartitionContext,
    ) -> Result<StepOutcome, PropagatorError> {
        let cells = self.grid_cells(state);
        let mut next_boxes = if self.parallel && !ctx.expired() {
            let results: Vec<(Result<BoxSet, PropagatorError>, Diagnostics)> = cells
                .par_iter()
                .map(|cell| {
                    let mut diagnostics = Diagnostics::new();
                    let result = closed_loop::step(cell, controller, dynamics, propagator, &mut diagnostics);
                    (result, diagnostics)
                })
                .collect();
            let mut boxes = Vec::with_capacity(results.len());
            for (result, diagnostics) in results {
                ctx.diagnostics.extend(diagnostics);
                boxes.push(result?);
            }
            boxes
        } else {
            let mut boxes = Vec::with_capacity(cells.len());
            for cell in &cells {
                if ctx.expired() {
                    break;
                }
                boxes.push(closed_loop::step(
                    cell,
                    controller,
                    dynamics,
                    propagator,
                    ctx.diagnostics,
                )?);
            }
            boxes
        };
        if next_boxes.is_empty() {
            // Deadline hit before even the first cell; fall back to the
            // unsplit step so the caller always gets a sound bound.
            next_boxes.push(closed_loop::step(
                state,
                controller,
                dynamics,
                propagator,
                ctx.diagnostics,
            )?);
        }
        let n = next_boxes.len();
        Ok(StepOutcome {
            bound: hull_cells(&next_boxes, boundary_type),
            cells: n,
        })
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::network::{Activation, Layer};
    use crate::propagator::CrownPropagator;

    fn double_integrator() -> Dynamics {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.5, 1.0]);
        let c = DVector::zeros(2);
        let u_min = DVector::from_row_slice(&[-1.0]);
        let u_max = DVector::from_row_slice(&[1.0]);
        Dynamics::new(a, b, c, u_min, u_max, 1.0).unwrap()
    }

    fn crossing_relu_controller() -> Network {
        let weight = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Relu).unwrap();
        Network::from_layers(vec![layer]).unwrap()
    }

    #[test]
    fn finer_grid_is_never_looser() {
        let dyn_ = double_integrator();
        let net = crossing_relu_controller();
        let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut rng = crate::rng::seeded(0);
        let mut diagnostics = Diagnostics::new();

        let coarse = UniformPartitioner::new(vec![1, 1]);
        let fine = UniformPartitioner::new(vec![4, 4]);

        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };
        let coarse_out = coarse
            .bound_step(&state, &net, &dyn_, &CrownPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();
        let fine_out = fine
            .bound_step(&state, &net, &dyn_, &CrownPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();

        let coarse_box = coarse_out.bound.bounding_box();
        let fine_box = fine_out.bound.bounding_box();
        for i in 0..2 {
            assert!(fine_box.lb()[i] >= coarse_box.lb()[i] - 1e-9);
            assert!(fine_box.ub()[i] <= coarse_box.ub()[i] + 1e-9);
        }
        assert_eq!(fine_out.cells, 16);
    }

    #[test]
    fn parallel_mode_matches_serial_bound() {
        let dyn_ = double_integrator();
        let net = crossing_relu_controller();
        let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut rng = crate::rng::seeded(0);
        let mut diagnostics = Diagnostics::new();

        let serial = UniformPartitioner::new(vec![3, 3]);
        let parallel = UniformPartitioner::new_parallel(vec![3, 3]);

        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };
        let serial_out = serial
            .bound_step(&state, &net, &dyn_, &CrownPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();
        let parallel_out = parallel
            .bound_step(&state, &net, &dyn_, &CrownPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();

        assert_eq!(serial_out.cells, parallel_out.cells);
        assert_eq!(serial_out.bound.bounding_box(), parallel_out.bound.bounding_box());
    }
}
