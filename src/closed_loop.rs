//! Closed-loop step: composes a propagator's output bound with the plant
//! dynamics and actuator saturation to produce the next-step state set
//! (§4.5). This is the point where a [`Propagator`] and a [`Dynamics`]
//! become one step of the reachable tube.

use thiserror::Error;

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::dynamics::Dynamics;
use crate::error::{ConfigError, DimensionError};
use crate::network::Network;
use crate::propagator::{Propagator, PropagatorError};

/// A failure of [`step_backward`]: either the propagator failed, or the
/// dynamics were never configured for backward analysis (see
/// [`Dynamics::with_inverse`]).
#[derive(Debug, Clone, Error)]
pub enum BackwardStepError {
    /// The propagator bounding the controller's input-output relation failed.
    #[error(transparent)]
    Propagator(#[from] PropagatorError),
    /// The dynamics has no precomputed inverse; backward analysis requires
    /// [`Dynamics::with_inverse`] to have been called during setup.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The inverse affine map's shapes did not line up with `next`.
    #[error(transparent)]
    Dimension(#[from] DimensionError),
}

/// Advances a single state-set cell one closed-loop step:
/// `U = clip(P.bound(S), u_min, u_max)`, `S' = A S (+) B U (+) {c}`.
///
/// Monotone by construction: both the propagator bound and the dynamics'
/// signed-matrix affine image are monotone in their input box, so
/// `S subset-or-eq S'` implies `step(S) subset-or-eq step(S')`.
///
/// # Errors
///
/// Returns [`PropagatorError`] if the propagator fails (dimension mismatch
/// or, for the SDP propagator, a solver failure).
pub fn step(
    state: &BoxSet,
    controller: &Network,
    dynamics: &Dynamics,
    propagator: &dyn Propagator,
    diagnostics: &mut Diagnostics,
) -> Result<BoxSet, PropagatorError> {
    let control_bound = propagator.bound(state, controller, diagnostics)?;
    let u_min = dynamics.saturate(control_bound.lb());
    let u_max = dynamics.saturate(control_bound.ub());
    let clipped = BoxSet::new(u_min, u_max).unwrap_or_else(|_| {
        // Saturation can invert an already-degenerate bound by epsilon;
        // collapse to the midpoint rather than propagate an invalid box.
        let mid = (control_bound.lb() + control_bound.ub()) * 0.5;
        BoxSet::point(dynamics.saturate(&mid))
    });
    dynamics
        .step(state, &clipped)
        .map_err(PropagatorError::Dimension)
}

/// The inverse of [`step`]: bounds the states that can reach `next` within
/// one step under `controller`, by propagating the controller's bound over
/// the current back-projected cell and inverting the affine dynamics.
///
/// # Errors
///
/// Returns [`BackwardStepError::Propagator`] on a propagator failure, or
/// [`BackwardStepError::Config`] if the dynamics are not configured for
/// backward analysis (no precomputed `A^-1`, see [`Dynamics::with_inverse`]).
pub fn step_backward(
    next: &BoxSet,
    current_guess: &BoxSet,
    controller: &Network,
    dynamics: &Dynamics,
    propagator: &dyn Propagator,
    diagnostics: &mut Diagnostics,
) -> Result<BoxSet, BackwardStepError> {
    let control_bound = propagator.bound(current_guess, controller, diagnostics)?;
    let u_min = dynamics.saturate(control_bound.lb());
    let u_max = dynamics.saturate(control_bound.ub());
    let clipped = BoxSet::new(u_min, u_max).unwrap_or_else(|_| {
        let mid = (control_bound.lb() + control_bound.ub()) * 0.5;
        BoxSet::point(dynamics.saturate(&mid))
    });
    let result = dynamics.step_backward(next, &clipped)?;
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
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

    /// A controller whose output range, amplified enough by the network
    /// gain, saturates to the full actuator range `[-1, 1]` regardless of
    /// `x0` — so the closed-loop step below exercises the same `u in [-1,
    /// 1]` envelope as spec scenario 1, without needing the network to be
    /// the true (unspecified) policy from that scenario.
    fn saturating_controller() -> Network {
        let weight = DMatrix::from_row_slice(1, 2, &[0.0, 100.0]);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Linear).unwrap();
        Network::from_layers(vec![layer]).unwrap()
    }

    #[test]
    fn scenario_double_integrator_ibp_step() {
        let dyn_ = double_integrator();
        let net = saturating_controller();
        let s0 = BoxSet::from_bounds(&[2.5, -0.25], &[3.0, 0.25]).unwrap();
        let mut diag = Diagnostics::new();
        let s1 = step(&s0, &net, &dyn_, &IbpPropagator, &mut diag).unwrap();
        assert!(s1.lb()[0] <= 1.75 + 1e-9);
        assert!(s1.ub()[0] >= 3.25 - 1e-9);
        assert!(s1.lb()[1] <= -1.25 + 1e-9);
        assert!(s1.ub()[1] >= 1.25 - 1e-9);
    }

    #[test]
    fn backward_step_requires_invertible_dynamics() {
        let dyn_ = double_integrator();
        let net = saturating_controller();
        let target = BoxSet::from_bounds(&[-0.1, -0.1], &[0.1, 0.1]).unwrap();
        let guess = BoxSet::from_bounds(&[-5.0, -5.0], &[5.0, 5.0]).unwrap();
        let mut diag = Diagnostics::new();
        assert!(matches!(
            step_backward(&target, &guess, &net, &dyn_, &IbpPropagator, &mut diag),
            Err(BackwardStepError::Config(_))
        ));

        let dyn_inv = double_integrator().with_inverse().unwrap();
        let pre = step_backward(&target, &guess, &net, &dyn_inv, &IbpPropagator, &mut diag).unwrap();
        assert!(pre.dim() == 2);
    }

    #[test]
    fn step_is_monotone_in_input_box() {
        let dyn_ = double_integrator();
        let net = saturating_controller();
        let small = BoxSet::from_bounds(&[0.0, 0.0], &[0.5, 0.5]).unwrap();
        let big = BoxSet::from_bounds(&[-1.0, -1.0], &[1.5, 1.5]).unwrap();
        let mut diag = Diagnostics::new();
        let small_step = step(&small, &net, &dyn_, &IbpPropagator, &mut diag).unwrap();
        let big_step = step(&big, &net, &dyn_, &IbpPropagator, &mut diag).unwrap();
        for i in 0..2 {
            assert!(big_step.lb()[i] <= small_step.lb()[i] + 1e-9);
            assert!(big_step.ub()[i] >= small_step.ub()[i] - 1e-9);
        }
    }
}
