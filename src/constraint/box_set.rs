//! Axis-aligned boxes: `{x : lb <= x <= ub}` elementwise.

use nalgebra::{DMatrix, DVector};
use rand::Rng as _;

use crate::error::DimensionError;
use crate::rng::Rng;

/// An axis-aligned box in `R^n`, represented as per-dimension intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSet {
    lb: DVector<f64>,
    ub: DVector<f64>,
}

impl BoxSet {
    /// Builds a box from lower and upper bound vectors.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if the two vectors have different
    /// lengths, or [`DimensionError::InvalidBox`] if `lb[i] > ub[i]` for some
    /// `i`.
    pub fn new(lb: DVector<f64>, ub: DVector<f64>) -> Result<Self, DimensionError> {
        if lb.len() != ub.len() {
            return Err(DimensionError::Mismatch {
                expected: lb.len(),
                actual: ub.len(),
            });
        }
        for axis in 0..lb.len() {
            if lb[axis] > ub[axis] {
                return Err(DimensionError::InvalidBox {
                    axis,
                    lb: lb[axis],
                    ub: ub[axis],
                });
            }
        }
        Ok(Self { lb, ub })
    }

    /// Builds a box from plain slices, for convenience at call sites.
    pub fn from_bounds(lb: &[f64], ub: &[f64]) -> Result<Self, DimensionError> {
        Self::new(DVector::from_row_slice(lb), DVector::from_row_slice(ub))
    }

    /// A degenerate box consisting of the single point `p`.
    pub fn point(p: DVector<f64>) -> Self {
        let lb = p.clone();
        let ub = p;
        Self { lb, ub }
    }

    /// The ambient dimension `n`.
    pub fn dim(&self) -> usize {
        self.lb.len()
    }

    /// The lower bound vector.
    pub fn lb(&self) -> &DVector<f64> {
        &self.lb
    }

    /// The upper bound vector.
    pub fn ub(&self) -> &DVector<f64> {
        &self.ub
    }

    /// The midpoint of the box.
    pub fn center(&self) -> DVector<f64> {
        (&self.lb + &self.ub) * 0.5
    }

    /// Per-dimension widths `ub - lb`.
    pub fn widths(&self) -> DVector<f64> {
        &self.ub - &self.lb
    }

    /// The axis with the greatest width, ties broken by the lowest index.
    pub fn longest_axis(&self) -> usize {
        let widths = self.widths();
        let mut best = 0;
        let mut best_width = widths[0];
        for axis in 1..widths.len() {
            if widths[axis] > best_width {
                best = axis;
                best_width = widths[axis];
            }
        }
        best
    }

    /// `true` if `p` lies within the box (inclusive bounds).
    pub fn contains(&self, p: &DVector<f64>) -> Result<bool, DimensionError> {
        self.check_dim(p.len())?;
        Ok((0..self.dim()).all(|i| self.lb[i] <= p[i] && p[i] <= self.ub[i]))
    }

    /// Splits the box at the midpoint of `axis` into two half-boxes.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= self.dim()`.
    pub fn split(&self, axis: usize) -> (Self, Self) {
        assert!(axis < self.dim(), "axis out of range");
        let mid = (self.lb[axis] + self.ub[axis]) * 0.5;
        let mut lower_ub = self.ub.clone();
        lower_ub[axis] = mid;
        let mut upper_lb = self.lb.clone();
        upper_lb[axis] = mid;
        (
            Self {
                lb: self.lb.clone(),
                ub: lower_ub,
            },
            Self {
                lb: upper_lb,
                ub: self.ub.clone(),
            },
        )
    }

    /// Uniform-enough samples of the box, one per row of the returned matrix.
    pub fn sample(&self, n: usize, rng: &mut Rng) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(n, self.dim());
        for row in 0..n {
            for col in 0..self.dim() {
                let (lb, ub) = (self.lb[col], self.ub[col]);
                let v = if lb == ub {
                    lb
                } else {
                    rng.gen_range(lb..=ub)
                };
                out[(row, col)] = v;
            }
        }
        out
    }

    /// The affine image `{M x + d : x in self}`, via signed-matrix interval
    /// arithmetic (the same formulas used by the IBP propagator, see §4.4):
    /// `lb' = W+ lb + W- ub + d`, `ub' = W+ ub + W- lb + d` where `W+ =
    /// max(M, 0)` and `W- = min(M, 0)` elementwise.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::ShapeMismatch`] if `M`'s column count does
    /// not match `self.dim()`, or if `d`'s length does not match `M`'s row
    /// count.
    pub fn affine_image(&self, m: &DMatrix<f64>, d: &DVector<f64>) -> Result<Self, DimensionError> {
        if m.ncols() != self.dim() {
            return Err(DimensionError::ShapeMismatch {
                rows: m.nrows(),
                cols: m.ncols(),
                vec_len: self.dim(),
            });
        }
        if d.len() != m.nrows() {
            return Err(DimensionError::ShapeMismatch {
                rows: m.nrows(),
                cols: m.ncols(),
                vec_len: d.len(),
            });
        }
        let w_pos = m.map(|v| v.max(0.0));
        let w_neg = m.map(|v| v.min(0.0));
        let lb = &w_pos * &self.lb + &w_neg * &self.ub + d;
        let ub = &w_pos * &self.ub + &w_neg * &self.lb + d;
        Ok(Self { lb, ub })
    }

    /// The Minkowski sum `self + other`.
    pub fn minkowski_add(&self, other: &Self) -> Result<Self, DimensionError> {
        self.check_dim(other.dim())?;
        Ok(Self {
            lb: &self.lb + &other.lb,
            ub: &self.ub + &other.ub,
        })
    }

    /// The elementwise-clipped box `clip(self, lb, ub)`.
    ///
    /// Idempotent: `clip(clip(u, l, h), l, h) == clip(u, l, h)`.
    pub fn clip(&self, lb: &DVector<f64>, ub: &DVector<f64>) -> Result<Self, DimensionError> {
        self.check_dim(lb.len())?;
        if ub.len() != self.dim() {
            return Err(DimensionError::Mismatch {
                expected: self.dim(),
                actual: ub.len(),
            });
        }
        let new_lb = DVector::from_iterator(
            self.dim(),
            (0..self.dim()).map(|i| self.lb[i].max(lb[i]).min(ub[i])),
        );
        let new_ub = DVector::from_iterator(
            self.dim(),
            (0..self.dim()).map(|i| self.ub[i].max(lb[i]).min(ub[i])),
        );
        Ok(Self {
            lb: new_lb,
            ub: new_ub,
        })
    }

    /// The product of per-dimension widths.
    pub fn volume(&self) -> f64 {
        self.widths().iter().product()
    }

    /// The smallest box enclosing every box in `cells`.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if `cells` is empty or the boxes
    /// do not all share the same dimension.
    pub fn hull<'a, I: IntoIterator<Item = &'a Self>>(cells: I) -> Result<Self, DimensionError> {
        let mut iter = cells.into_iter();
        let first = iter.next().ok_or(DimensionError::Mismatch {
            expected: 1,
            actual: 0,
        })?;
        let mut lb = first.lb.clone();
        let mut ub = first.ub.clone();
        for cell in iter {
            if cell.dim() != lb.len() {
                return Err(DimensionError::Mismatch {
                    expected: lb.len(),
                    actual: cell.dim(),
                });
            }
            for i in 0..lb.len() {
                lb[i] = lb[i].min(cell.lb[i]);
                ub[i] = ub[i].max(cell.ub[i]);
            }
        }
        Ok(Self { lb, ub })
    }

    fn check_dim(&self, other: usize) -> Result<(), DimensionError> {
        if self.dim() != other {
            Err(DimensionError::Mismatch {
                expected: self.dim(),
                actual: other,
            })
        } else {
            Ok(())
        }
    }
}
