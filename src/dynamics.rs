//! Discrete-time affine plant dynamics: `x' = A x + B u + c`.

use nalgebra::{DMatrix, DVector};

use crate::constraint::BoxSet;
use crate::error::{ConfigError, DimensionError};
use crate::network::Network;

/// A discrete-time affine plant with bounded actuation.
#[derive(Debug, Clone)]
pub struct Dynamics {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DVector<f64>,
    u_min: DVector<f64>,
    u_max: DVector<f64>,
    dt: f64,
    a_inv: Option<DMatrix<f64>>,
}

impl Dynamics {
    /// Builds a plant from its state matrix `A`, input matrix `B`, affine
    /// offset `c`, actuator bounds and the timestep duration used for
    /// reporting only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonSquareDynamics`] if `A` is not square, or
    /// [`DimensionError`] if the remaining operands' shapes are inconsistent
    /// with `A`.
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DVector<f64>,
        u_min: DVector<f64>,
        u_max: DVector<f64>,
        dt: f64,
    ) -> Result<Self, ConfigError> {
        if a.nrows() != a.ncols() {
            return Err(ConfigError::NonSquareDynamics {
                rows: a.nrows(),
                cols: a.ncols(),
            });
        }
        let n = a.nrows();
        if b.nrows() != n || c.len() != n {
            return Err(ConfigError::NonSquareDynamics {
                rows: b.nrows(),
                cols: c.len(),
            });
        }
        if u_min.len() != b.ncols() || u_max.len() != b.ncols() {
            return Err(ConfigError::NonSquareDynamics {
                rows: u_min.len(),
                cols: b.ncols(),
            });
        }
        Ok(Self {
            a,
            b,
            c,
            u_min,
            u_max,
            dt,
            a_inv: None,
        })
    }

    /// Enables backward analysis by precomputing `A^-1`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonInvertibleDynamics`] if `A` has no inverse.
    pub fn with_inverse(mut self) -> Result<Self, ConfigError> {
        let inv = self
            .a
            .clone()
            .try_inverse()
            .ok_or(ConfigError::NonInvertibleDynamics)?;
        self.a_inv = Some(inv);
        Ok(self)
    }

    /// The state dimension.
    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    /// The control (actuator) dimension.
    pub fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    /// The timestep duration this plant was configured with, for reporting.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// The state matrix.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// The input matrix.
    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    /// The affine offset.
    pub fn c(&self) -> &DVector<f64> {
        &self.c
    }

    /// The precomputed inverse of `A`, if [`Self::with_inverse`] has been
    /// called.
    pub fn inverse(&self) -> Option<&DMatrix<f64>> {
        self.a_inv.as_ref()
    }

    /// Elementwise-clamps `u` to the actuator bounds.
    pub fn saturate(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            u.len(),
            (0..u.len()).map(|i| u[i].max(self.u_min[i]).min(self.u_max[i])),
        )
    }

    /// The forward affine image of a joint state/control box:
    /// `step(state_set, u_set) = A * state_set (+) B * u_set (+) {c}`.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError`] if `state_set`/`u_set` do not match `A`/`B`.
    pub fn step(&self, state_set: &BoxSet, u_set: &BoxSet) -> Result<BoxSet, DimensionError> {
        let state_image = state_set.affine_image(&self.a, &self.c)?;
        let zero = DVector::zeros(self.state_dim());
        let control_image = u_set.affine_image(&self.b, &zero)?;
        state_image.minkowski_add(&control_image)
    }

    /// The backward pre-image of `next_set` under a fixed control box `u_set`:
    /// `x = A^-1 (x' - B u - c)`, bounded as an interval affine map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonInvertibleDynamics`] if
    /// [`Self::with_inverse`] was never called, or [`DimensionError`] on
    /// shape mismatch.
    pub fn step_backward(
        &self,
        next_set: &BoxSet,
        u_set: &BoxSet,
    ) -> Result<Result<BoxSet, DimensionError>, ConfigError> {
        let a_inv = self
            .a_inv
            .as_ref()
            .ok_or(ConfigError::NonInvertibleDynamics)?;
        let zero = DVector::zeros(self.state_dim());
        let control_image = match u_set.affine_image(&self.b, &zero) {
            Ok(img) => img,
            Err(e) => return Ok(Err(e)),
        };
        let shifted = DVector::from_iterator(
            self.state_dim(),
            (0..self.state_dim()).map(|i| -self.c[i]),
        );
        let offset_set = match next_set.affine_image(&DMatrix::identity(self.state_dim(), self.state_dim()), &shifted) {
            Ok(s) => s,
            Err(e) => return Ok(Err(e)),
        };
        let pre_control = match offset_set.minkowski_add(&control_image.affine_image(
            &DMatrix::from_diagonal_element(self.state_dim(), self.state_dim(), -1.0),
            &zero,
        )?) {
            Ok(s) => s,
            Err(e) => return Ok(Err(e)),
        };
        Ok(pre_control.affine_image(a_inv, &zero))
    }

    /// Rolls a ground-truth trajectory forward from `x0` for `steps` steps,
    /// using `controller` to choose and saturate each control input. Shares
    /// its evaluation path with the analyzer's sampling-based error
    /// estimator (§4.2's "one code path" requirement).
    pub fn simulate(&self, x0: &DVector<f64>, controller: &Network, steps: usize) -> Vec<DVector<f64>> {
        let mut trajectory = Vec::with_capacity(steps + 1);
        let mut x = x0.clone();
        trajectory.push(x.clone());
        for _ in 0..steps {
            let raw_u = controller.eval(&x);
            let u = self.saturate(&raw_u);
            x = &self.a * &x + &self.b * &u + &self.c;
            trajectory.push(x.clone());
        }
        trajectory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_integrator() -> Dynamics {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.5, 1.0]);
        let c = DVector::zeros(2);
        let u_min = DVector::from_row_slice(&[-1.0]);
        let u_max = DVector::from_row_slice(&[1.0]);
        Dynamics::new(a, b, c, u_min, u_max, 1.0).unwrap()
    }

    #[test]
    fn rejects_non_square_a() {
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let b = DMatrix::from_row_slice(1, 1, &[1.0]);
        let c = DVector::zeros(1);
        let u_min = DVector::from_row_slice(&[-1.0]);
        let u_max = DVector::from_row_slice(&[1.0]);
        assert!(Dynamics::new(a, b, c, u_min, u_max, 1.0).is_err());
    }

    #[test]
    fn saturate_clamps_to_actuator_bounds() {
        let dyn_ = double_integrator();
        let u = DVector::from_row_slice(&[5.0]);
        assert_eq!(dyn_.saturate(&u), DVector::from_row_slice(&[1.0]));
    }

    #[test]
    fn step_grows_with_control_authority() {
        let dyn_ = double_integrator();
        let state = BoxSet::from_bounds(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
        let u_narrow = BoxSet::from_bounds(&[0.0], &[0.0]).unwrap();
        let u_wide = BoxSet::from_bounds(&[-1.0], &[1.0]).unwrap();
        let narrow = dyn_.step(&state, &u_narrow).unwrap();
        let wide = dyn_.step(&state, &u_wide).unwrap();
        assert!(wide.volume() >= narrow.volume());
    }

    #[test]
    fn backward_requires_invertible_a() {
        let dyn_ = double_integrator();
        let next = BoxSet::from_bounds(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let u = BoxSet::from_bounds(&[-1.0], &[1.0]).unwrap();
        assert!(dyn_.step_backward(&next, &u).is_err());
    }
}
