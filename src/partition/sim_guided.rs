//! Simulation-guided partitioners: iteratively split the cell whose
//! propagated bound most over-approximates a sampled ground truth (§4.6's
//! "Simulation-guided" and "Greedy simulation-guided" variants), which
//! differ only in the splitting criterion (see [`SplitCriterion`]).

use crate::closed_loop;
use crate::constraint::{BoundaryType, BoxSet};
use crate::dynamics::Dynamics;
use crate::network::Network;
use crate::propagator::{Propagator, PropagatorError};

use super::queue::ScoredQueue;
use super::{hull_cells, PartitionContext, Partitioner, StepOutcome};

/// How a simulation-guided partitioner picks the next cell to split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitCriterion {
    /// Split the cell whose propagated bound has the largest gap against
    /// its own sampled ground truth (the plain "Simulation-guided" variant).
    /// Purely local: amenable to a priority queue, since a cell's gap never
    /// changes once computed.
    Gap,
    /// Split the cell whose propagated output contributes the most *new
    /// area* to the aggregate hull over all current cells (the "Greedy
    /// simulation-guided" variant). Global: recomputed against the current
    /// cell set every round, since splitting any cell can change every
    /// other cell's contribution.
    NewArea,
}

struct Cell {
    input: BoxSet,
    next: BoxSet,
    sampled: BoxSet,
    /// `false` once this cell has been split; a split (non-leaf) cell is
    /// excluded from the final hull, since its children's propagated
    /// bounds already cover (and, by monotonicity, never exceed) its own.
    leaf: bool,
}

impl Cell {
    fn gap(&self) -> f64 {
        (self.next.volume() - self.sampled.volume()).max(0.0)
    }
}

/// Refines a single cell's input set into cells along the criterion's
/// chosen axis/score, terminating on a cell-count budget or a worst-gap
/// tolerance, then hulls every leaf cell's propagated bound.
#[derive(Debug, Clone)]
pub struct SimGuidedPartitioner {
    criterion: SplitCriterion,
    max_cells: usize,
    tolerance: f64,
    sample_count: usize,
}

impl SimGuidedPartitioner {
    /// Builds a partitioner with the given criterion, cell-count budget and
    /// worst-gap tolerance (refinement stops once both are satisfied: at
    /// least one cell has been produced, the budget has not been exceeded,
    /// and either no cell exceeds `tolerance` or the budget is exhausted).
    pub fn new(criterion: SplitCriterion, max_cells: usize, tolerance: f64) -> Self {
        Self {
            criterion,
            max_cells: max_cells.max(1),
            tolerance,
            sample_count: 64,
        }
    }

    fn build_cell(
        &self,
        input: BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        propagator: &dyn Propagator,
        ctx: &mut PartitionContext,
    ) -> Result<Cell, PropagatorError> {
        let next = closed_loop::step(&input, controller, dynamics, propagator, ctx.diagnostics)?;
        let sampled = Self::sample_next_state(&input, controller, dynamics, self.sample_count, ctx);
        Ok(Cell {
            input,
            next,
            sampled,
            leaf: true,
        })
    }

    /// Draws samples from `input`, advances each one step through the
    /// closed loop (sharing [`Dynamics::simulate`]'s code path, per
    /// SPEC_FULL's "one code path" note), and returns their bounding box as
    /// a sample-based estimate of the cell's true next-state range.
    fn sample_next_state(
        input: &BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        count: usize,
        ctx: &mut PartitionContext,
    ) -> BoxSet {
        let points = input.sample(count.max(1), ctx.rng);
        let mut next_points = Vec::with_capacity(points.nrows());
        for row in points.row_iter() {
            let x0 = row.transpose();
            let trajectory = dynamics.simulate(&x0, controller, 1);
            next_points.push(trajectory[1].clone());
        }
        let lb = BoxSet::point(next_points[0].clone());
        next_points
            .iter()
            .fold(lb, |acc, p| {
                let point_box = BoxSet::point(p.clone());
                BoxSet::hull([&acc, &point_box]).expect("samples share the state dimension")
            })
    }

    fn split_axis(cell: &Cell) -> usize {
        cell.input.longest_axis()
    }
}

impl Partitioner for SimGuidedPartitioner {
    fn bound_step(
        &self,
        state: &BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        propagator: &dyn Propagator,
        boundary_type: BoundaryType,
        ctx: &mut PartitionContext,
    ) -> Result<StepOutcome, PropagatorError> {
        let root = self.build_cell(state.clone(), controller, dynamics, propagator, ctx)?;
        let mut cells = vec![root];

        match self.criterion {
            SplitCriterion::Gap => {
                let mut queue = ScoredQueue::with_capacity(self.max_cells);
                queue.push(0usize, cells[0].gap());
                // `cells` grows; the queue holds indices, always valid
                // because cells are only ever appended, never removed.
                // Splitting a cell marks it non-leaf rather than removing
                // it, so its index (and every later one) stays stable; the
                // final hull below then skips non-leaf cells explicitly.
                while cells.len() < self.max_cells && !ctx.expired() {
                    let Some(idx) = queue.pop_max() else {
                        break;
                    };
                    if cells[idx].gap() <= self.tolerance {
                        break;
                    }
                    let axis = Self::split_axis(&cells[idx]);
                    let (left, right) = cells[idx].input.split(axis);
                    cells[idx].leaf = false;
                    let left_cell = self.build_cell(left, controller, dynamics, propagator, ctx)?;
                    if ctx.expired() {
                        cells.push(left_cell);
                        break;
                    }
                    let right_cell = self.build_cell(right, controller, dynamics, propagator, ctx)?;
                    let left_idx = cells.len();
                    queue.push(left_idx, left_cell.gap());
                    cells.push(left_cell);
                    let right_idx = cells.len();
                    queue.push(right_idx, right_cell.gap());
                    cells.push(right_cell);
                }
            }
            SplitCriterion::NewArea => {
                while cells.len() < self.max_cells && !ctx.expired() {
                    let boxes: Vec<BoxSet> = cells.iter().map(|c| c.next.clone()).collect();
                    let total_volume = BoxSet::hull(&boxes)
                        .expect("at least one cell")
                        .volume();
                    let (worst_idx, worst_contribution, worst_gap) = cells
                        .iter()
                        .enumerate()
                        .map(|(i, c)| {
                            let others: Vec<BoxSet> = boxes
                                .iter()
                                .enumerate()
                                .filter(|(j, _)| *j != i)
                                .map(|(_, b)| b.clone())
                                .collect();
                            let without = if others.is_empty() {
                                0.0
                            } else {
                                BoxSet::hull(&others).expect("non-empty").volume()
                            };
                            (i, total_volume - without, c.gap())
                        })
                        .fold((0usize, f64::MIN, 0.0), |best, cand| {
                            if cand.1 > best.1 {
                                cand
                            } else {
                                best
                            }
                        });
                    if worst_contribution <= self.tolerance && worst_gap <= self.tolerance {
                        break;
                    }
                    let axis = Self::split_axis(&cells[worst_idx]);
                    let (left, right) = cells[worst_idx].input.split(axis);
                    let removed = cells.swap_remove(worst_idx);
                    drop(removed);
                    let left_cell = self.build_cell(left, controller, dynamics, propagator, ctx)?;
                    cells.push(left_cell);
                    if ctx.expired() {
                        break;
                    }
                    let right_cell = self.build_cell(right, controller, dynamics, propagator, ctx)?;
                    cells.push(right_cell);
                }
            }
        }

        let boxes: Vec<BoxSet> = cells.into_iter().filter(|c| c.leaf).map(|c| c.next).collect();
        let n = boxes.len();
        Ok(StepOutcome {
            bound: hull_cells(&boxes, boundary_type),
            cells: n,
        })
    }

    fn name(&self) -> &'static str {
        match self.criterion {
            SplitCriterion::Gap => "sim_guided",
            SplitCriterion::NewArea => "greedy_sim_guided",
        }
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::network::{Activation, Layer};
    use crate::propagator::IbpPropagator;

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
    fn refining_with_a_larger_budget_never_loses_soundness() {
        let dyn_ = double_integrator();
        let net = crossing_relu_controller();
        let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut rng = crate::rng::seeded(7);
        let mut diagnostics = Diagnostics::new();
        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };

        let small_budget = SimGuidedPartitioner::new(SplitCriterion::Gap, 1, 0.0);
        let wide_budget = SimGuidedPartitioner::new(SplitCriterion::Gap, 8, 0.0);
        let coarse = small_budget
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();
        let refined = wide_budget
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();

        let coarse_box = coarse.bound.bounding_box();
        let refined_box = refined.bound.bounding_box();
        for i in 0..2 {
            assert!(refined_box.lb()[i] >= coarse_box.lb()[i] - 1e-9);
            assert!(refined_box.ub()[i] <= coarse_box.ub()[i] + 1e-9);
        }
    }

    #[test]
    fn gap_criterion_actually_tightens_the_bound_vs_no_partitioning() {
        let dyn_ = double_integrator();
        let net = crossing_relu_controller();
        let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut rng = crate::rng::seeded(11);
        let mut diagnostics = Diagnostics::new();
        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };

        let none = super::super::none::NonePartitioner;
        let unpartitioned = none
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();

        let refined_partitioner = SimGuidedPartitioner::new(SplitCriterion::Gap, 16, 0.0);
        let refined = refined_partitioner
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();

        assert!(refined.cells > 1, "refinement should have split the root cell");
        let unpartitioned_volume = unpartitioned.bound.bounding_box().volume();
        let refined_volume = refined.bound.bounding_box().volume();
        assert!(
            refined_volume < unpartitioned_volume - 1e-9,
            "refined volume {refined_volume} should be strictly tighter than the unpartitioned volume {unpartitioned_volume}"
        );
    }

    #[test]
    fn greedy_variant_terminates_within_budget() {
        let dyn_ = double_integrator();
        let net = crossing_relu_controller();
        let state = BoxSet::from_bounds(&[-1.0, -1.0], &[1.0, 1.0]).unwrap();
        let mut rng = crate::rng::seeded(3);
        let mut diagnostics = Diagnostics::new();
        let mut ctx = PartitionContext {
            rng: &mut rng,
            diagnostics: &mut diagnostics,
            deadline: None,
        };
        let partitioner = SimGuidedPartitioner::new(SplitCriterion::NewArea, 6, 0.0);
        let outcome = partitioner
            .bound_step(&state, &net, &dyn_, &IbpPropagator, BoundaryType::Box, &mut ctx)
            .unwrap();
        assert!(outcome.cells <= 6);
    }
}
