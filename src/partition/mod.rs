//! Partitioners: strategies for subdividing an input set to tighten the
//! aggregate propagated-output bound of a closed-loop step (§4.6).
//!
//! All four variants share one contract, [`Partitioner::bound_step`], and
//! differ only in how they choose and refine cells; the final reduction —
//! hulling per-cell next-state boxes into a [`Constraint`] of the
//! configured [`BoundaryType`] — is common code in [`hull_cells`].

mod none;
mod queue;
mod sim_guided;
mod uniform;

pub use none::NonePartitioner;
pub use sim_guided::{SimGuidedPartitioner, SplitCriterion};
pub use uniform::UniformPartitioner;

use crate::constraint::{BoundaryType, BoxSet, Constraint, Polytope};
use crate::deadline::Deadline;
use crate::diagnostics::Diagnostics;
use crate::dynamics::Dynamics;
use crate::error::ConfigError;
use crate::network::Network;
use crate::propagator::{Propagator, PropagatorError};
use crate::rng::Rng;

/// The outcome of one partitioned closed-loop step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The aggregated next-state bound, in the configured [`BoundaryType`].
    pub bound: Constraint,
    /// How many cells were propagated to produce `bound` (a diagnostic,
    /// surfacing in [`crate::analyzer::AnalysisResult::cells_per_step`]).
    pub cells: usize,
}

/// Shared context threaded through a partitioner invocation: the only
/// mutable state permitted outside the returned result (§5).
pub struct PartitionContext<'a> {
    /// The analysis run's seeded RNG, for simulation-guided sampling.
    pub rng: &'a mut Rng,
    /// The diagnostics sink for numerical degeneracies encountered by the
    /// propagator.
    pub diagnostics: &'a mut Diagnostics,
    /// The wall-clock deadline, checked between cell splits and before each
    /// propagator call.
    pub deadline: Option<&'a Deadline>,
}

impl PartitionContext<'_> {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(Deadline::expired)
    }
}

/// A strategy for subdividing the current input set into cells, propagating
/// each cell's closed-loop step, and aggregating the per-cell bounds.
pub trait Partitioner {
    /// Computes `S_{t+1}`'s bound from `state`, per §4.6.
    ///
    /// # Errors
    ///
    /// Returns [`PropagatorError`] if any cell's propagator call fails.
    fn bound_step(
        &self,
        state: &BoxSet,
        controller: &Network,
        dynamics: &Dynamics,
        propagator: &dyn Propagator,
        boundary_type: BoundaryType,
        ctx: &mut PartitionContext,
    ) -> Result<StepOutcome, PropagatorError>;

    /// A short tag identifying this partitioner, matching the
    /// `analysis.partitioner.type` configuration values (§6).
    fn name(&self) -> &'static str;
}

/// Instantiates a [`Partitioner`] from its configuration string tag.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownVariant`] if `tag` is not one of `"none"`,
/// `"uniform"`, `"sim_guided"`, `"greedy_sim_guided"`.
pub fn from_tag(
    tag: &str,
    num_partitions: &[usize],
    budget: usize,
    tolerance: f64,
    parallel: bool,
) -> Result<Box<dyn Partitioner>, ConfigError> {
    match tag {
        "none" => Ok(Box::new(NonePartitioner)),
        "uniform" => Ok(Box::new(if parallel {
            UniformPartitioner::new_parallel(num_partitions.to_vec())
        } else {
            UniformPartitioner::new(num_partitions.to_vec())
        })),
        "sim_guided" => Ok(Box::new(SimGuidedPartitioner::new(
            SplitCriterion::Gap,
            budget,
            tolerance,
        ))),
        "greedy_sim_guided" => Ok(Box::new(SimGuidedPartitioner::new(
            SplitCriterion::NewArea,
            budget,
            tolerance,
        ))),
        other => Err(ConfigError::UnknownVariant {
            option: "analysis.partitioner.type".to_string(),
            value: other.to_string(),
        }),
    }
}

/// Hulls a finite, non-empty list of per-cell next-state boxes into a
/// [`Constraint`] of the requested [`BoundaryType`] (Open Question (a) of
/// spec.md §9, resolved by this option): `Box` takes the axis-aligned hull,
/// `Polytope` templates every box onto [`Polytope::octagon_directions`] and
/// hulls those, which is never looser than the box hull and strictly
/// tighter whenever cells are not axis-aligned with each other.
///
/// # Panics
///
/// Panics if `boxes` is empty; callers always propagate at least one cell.
pub(crate) fn hull_cells(boxes: &[BoxSet], boundary_type: BoundaryType) -> Constraint {
    assert!(!boxes.is_empty(), "partitioner must propagate at least one cell");
    match boundary_type {
        BoundaryType::Box => {
            Constraint::Box(BoxSet::hull(boxes).expect("same-dimension cells by construction"))
        }
        BoundaryType::Polytope => {
            let dim = boxes[0].dim();
            let dirs = Polytope::octagon_directions(dim);
            let polys: Vec<Polytope> = boxes
                .iter()
                .map(|b| Polytope::from_box(b, &dirs).expect("same-dimension cells"))
                .collect();
            let refs: Vec<&Polytope> = polys.iter().collect();
            Constraint::Polytope(Polytope::hull(refs).expect("shared direction template"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hull_cells_box_matches_box_hull() {
        let a = BoxSet::from_bounds(&[0.0], &[1.0]).unwrap();
        let b = BoxSet::from_bounds(&[0.5], &[2.0]).unwrap();
        let c = hull_cells(&[a, b], BoundaryType::Box);
        assert_eq!(c.bounding_box(), BoxSet::from_bounds(&[0.0], &[2.0]).unwrap());
    }

    #[test]
    fn hull_cells_polytope_is_never_looser_than_box() {
        let a = BoxSet::from_bounds(&[0.0, 0.0], &[1.0, 0.2]).unwrap();
        let b = BoxSet::from_bounds(&[0.8, 0.8], &[1.2, 1.2]).unwrap();
        let boxed = hull_cells(&[a.clone(), b.clone()], BoundaryType::Box);
        let polyed = hull_cells(&[a, b], BoundaryType::Polytope);
        let mut rng = crate::rng::seeded(0);
        assert!(polyed.volume(&mut rng) <= boxed.volume(&mut rng) + 1e-6);
    }
}
