//! The trivial partitioner: a single cell, delegating straight to the
//! closed-loop step (§4.6's "None" variant).

use crate::closed_loop;
use crate::constraint::BoundaryType;
use crate::constraint::BoxSet;
use crate::dynamics::Dynamics;
use crate::network::Network;
use crate::propagator::{Propagator, PropagatorError};

use super::{hull_cells, PartitionContext, Partitioner, StepOutcome};

/// No partitioning: the whole input set is one cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonePartitioner;

impl Partitioner for NonePartitioner {
    fn bound_step(
        &self,
        state: &BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        propagator: &dyn Propagator,
        boundary_type: BoundaryType,
        ctx: &mut PartitionContext,
    ) -> Result<StepOutcome, PropagatorError> {
        let next = closed_loop::step(state, controller, dynamics, propagator, ctx.diagnostics)?;
        Ok(StepOutcome {
            bound: hull_cells(&[next], boundary_type),
            cells: 1,
        })
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::network::{Activation, Layer};
    use crate::propagator::IbpPropagator;

    #[test]
    fn single_cell_matches_raw_closed_loop_step() {
        let a = DMatrix::identity(1, 1);
        let b = DMatrix::from_row_slice(1, 1, &[1.0]);
        let c = DVector::zeros(1);
        let u_min = DVector::from_row_slice(&[-1.0]);
        let u_max = DVector::from_row_slice(&[1.0]);
        let dyn_ = Dynamics::new(a, b, c, u_min, u_max, 1.0).unwrap();
        let weight = DMatrix::identity(1, 1);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Linear).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let state = BoxSet::from_bounds(&[0.0], &[0.5]).unwrap();

        let mut rng = crate::rng::seeded(0);
        let mut diagnostics = Diagnostics::new();
        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };
        let outcome = NonePartitioner
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();
        assert_eq!(outcome.cells, 1);
        assert_eq!(outcome.bound.bounding_box(), BoxSet::from_bounds(&[0.0], &[1.0]).unwrap());
    }
}
