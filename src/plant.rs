//! Reference plant catalogue (§6's "Plant model ... reference
//! implementations: `DoubleIntegrator`, `Quadrotor`, etc., are external").
//!
//! These are concrete, in-tree instances of the abstract plant interface so
//! the crate is exercisable end to end without a separate catalogue crate.
//! Both carry the parameters used by spec.md's own scenarios.

use nalgebra::{DMatrix, DVector};

use crate::config::ReachabilityDirection;
use crate::dynamics::Dynamics;
use crate::error::ConfigError;

/// An abstract plant: anything that can produce a [`Dynamics`] instance.
pub trait Plant {
    /// The plant's discrete-time affine dynamics.
    fn dynamics(&self) -> &Dynamics;

    /// A short tag identifying this plant, matching `system.type` (§6).
    fn name(&self) -> &'static str;

    /// Rebuilds this plant with its dynamics' inverse precomputed, for
    /// backward analysis (see [`Dynamics::with_inverse`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonInvertibleDynamics`] if the plant's `A`
    /// matrix is not invertible.
    fn with_inverse(self: Box<Self>) -> Result<Box<dyn Plant>, ConfigError>;
}

/// The 1-D double integrator `x' = [[1,dt],[0,1]] x + [[dt^2/2],[dt]] u`,
/// used directly by spec.md's scenarios 1, 2 and 4 with `dt = 1`.
#[derive(Debug, Clone)]
pub struct DoubleIntegrator {
    dynamics: Dynamics,
}

impl DoubleIntegrator {
    /// Builds a double integrator with the given timestep and actuator
    /// bound `u in [-u_max, u_max]`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `dt <= 0.0` (propagated from [`Dynamics::new`]'s
    /// shape checks, which always succeed for this fixed 2-state layout).
    pub fn new(dt: f64, u_max: f64) -> Result<Self, ConfigError> {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[dt * dt / 2.0, dt]);
        let c = DVector::zeros(2);
        let u_min = DVector::from_row_slice(&[-u_max]);
        let u_max_vec = DVector::from_row_slice(&[u_max]);
        let dynamics = Dynamics::new(a, b, c, u_min, u_max_vec, dt)?;
        Ok(Self { dynamics })
    }

    /// The canonical instance used by spec.md's scenarios: `dt = 1`,
    /// `u in [-1, 1]`.
    pub fn canonical() -> Self {
        Self::new(1.0, 1.0).expect("fixed canonical parameters are always valid")
    }
}

impl Plant for DoubleIntegrator {
    fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    fn name(&self) -> &'static str {
        "double_integrator"
    }

    fn with_inverse(self: Box<Self>) -> Result<Box<dyn Plant>, ConfigError> {
        let dynamics = self.dynamics.with_inverse()?;
        Ok(Box::new(Self { dynamics }))
    }
}

/// A linearized planar quadrotor: state `[x, y, vx, vy]`, control
/// `[ax, ay]` (commanded horizontal/vertical acceleration about a hover
/// trim point, gravity already cancelled out of `c`).
#[derive(Debug, Clone)]
pub struct Quadrotor2d {
    dynamics: Dynamics,
}

impl Quadrotor2d {
    /// Builds a planar quadrotor with the given timestep and symmetric
    /// actuator bound `a in [-a_max, a_max]` per axis.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the fixed 4-state/2-control layout is
    /// ever made inconsistent (never happens for this constructor's fixed
    /// shapes, but propagated for symmetry with [`DoubleIntegrator::new`]).
    pub fn new(dt: f64, a_max: f64) -> Result<Self, ConfigError> {
        #[rustfmt::skip]
        let a = DMatrix::from_row_slice(4, 4, &[
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]);
        #[rustfmt::skip]
        let b = DMatrix::from_row_slice(4, 2, &[
            dt * dt / 2.0, 0.0,
            0.0,           dt * dt / 2.0,
            dt,            0.0,
            0.0,           dt,
        ]);
        let c = DVector::zeros(4);
        let u_min = DVector::from_row_slice(&[-a_max, -a_max]);
        let u_max = DVector::from_row_slice(&[a_max, a_max]);
        let dynamics = Dynamics::new(a, b, c, u_min, u_max, dt)?;
        Ok(Self { dynamics })
    }

    /// A reasonable default: `dt = 0.1`, `a_max = 4.0 m/s^2`.
    pub fn canonical() -> Self {
        Self::new(0.1, 4.0).expect("fixed canonical parameters are always valid")
    }
}

impl Plant for Quadrotor2d {
    fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    fn name(&self) -> &'static str {
        "quadrotor_2d"
    }

    fn with_inverse(self: Box<Self>) -> Result<Box<dyn Plant>, ConfigError> {
        let dynamics = self.dynamics.with_inverse()?;
        Ok(Box::new(Self { dynamics }))
    }
}

/// Instantiates a [`Plant`] from its configuration string tag (`system.type`,
/// §6), wiring up [`Dynamics::with_inverse`] whenever `direction` is
/// [`ReachabilityDirection::Backward`] — the binary's backward path needs
/// the precomputed inverse to get past the first step (see
/// [`crate::closed_loop::step_backward`]), and a plant built for forward
/// analysis never needs it, so it is only paid for on request.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownVariant`] if `tag` is not one of
/// `"double_integrator"`, `"quadrotor_2d"`, or [`ConfigError::NonInvertibleDynamics`]
/// if `direction` is `Backward` and the plant's `A` matrix is not invertible.
pub fn from_tag(tag: &str, direction: ReachabilityDirection) -> Result<Box<dyn Plant>, ConfigError> {
    let plant: Box<dyn Plant> = match tag {
        "double_integrator" => Box::new(DoubleIntegrator::canonical()),
        "quadrotor_2d" => Box::new(Quadrotor2d::canonical()),
        other => {
            return Err(ConfigError::UnknownVariant {
                option: "system.type".to_string(),
                value: other.to_string(),
            })
        }
    };
    match direction {
        ReachabilityDirection::Forward => Ok(plant),
        ReachabilityDirection::Backward => plant.with_inverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_integrator_matches_scenario_parameters() {
        let plant = DoubleIntegrator::canonical();
        assert_eq!(plant.dynamics().a(), &DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]));
        assert_eq!(plant.dynamics().b(), &DMatrix::from_row_slice(2, 1, &[0.5, 1.0]));
    }

    #[test]
    fn quadrotor_has_four_states_two_controls() {
        let plant = Quadrotor2d::canonical();
        assert_eq!(plant.dynamics().state_dim(), 4);
        assert_eq!(plant.dynamics().control_dim(), 2);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(from_tag("nonexistent", ReachabilityDirection::Forward).is_err());
    }

    #[test]
    fn known_tags_resolve() {
        for tag in ["double_integrator", "quadrotor_2d"] {
            assert!(from_tag(tag, ReachabilityDirection::Forward).is_ok());
        }
    }

    #[test]
    fn backward_direction_wires_the_inverse() {
        for tag in ["double_integrator", "quadrotor_2d"] {
            let plant = from_tag(tag, ReachabilityDirection::Backward).unwrap();
            assert!(plant.dynamics().inverse().is_some());
        }
    }
}
