//! H-polytopes `{x : A x <= b}`, used only at network output interfaces
//! (see §4.1): a fixed template of row directions is agreed for an analysis
//! run, and every polytope operation below is phrased in terms of that
//! shared template. This keeps `hull` and `minkowski_add` exact closed-form
//! operations instead of requiring a general linear program; `affine_image`
//! is the one operation that falls back to a sound-but-looser bound (see its
//! doc comment).

use nalgebra::{DMatrix, DVector};
use rand::Rng as _;

use super::box_set::BoxSet;
use crate::error::DimensionError;
use crate::rng::Rng;

/// An H-represented polytope over a fixed set of template directions.
///
/// By construction the first `2n` rows of the direction template are always
/// the positive and negative axis directions (`+e_0, -e_0, +e_1, -e_1, ...`),
/// which lets [`Polytope::bounding_box`] read off an exact bounding box
/// without solving a linear program.
#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    directions: DMatrix<f64>,
    offsets: DVector<f64>,
    dim: usize,
}

impl Polytope {
    /// The axis-aligned direction template: `+e_i` then `-e_i` for each axis.
    pub fn axis_directions(dim: usize) -> DMatrix<f64> {
        let mut dirs = DMatrix::zeros(2 * dim, dim);
        for i in 0..dim {
            dirs[(2 * i, i)] = 1.0;
            dirs[(2 * i + 1, i)] = -1.0;
        }
        dirs
    }

    /// The axis template enriched with pairwise diagonal directions
    /// `(e_i +/- e_{i+1}) / sqrt(2)` for adjacent axes (an "octagon" domain),
    /// giving the hull operation more than box tightness without the cost
    /// of a full vertex enumeration.
    pub fn octagon_directions(dim: usize) -> DMatrix<f64> {
        let axis = Self::axis_directions(dim);
        if dim < 2 {
            return axis;
        }
        let diag_rows = 4 * (dim - 1);
        let mut dirs = DMatrix::zeros(axis.nrows() + diag_rows, dim);
        for r in 0..axis.nrows() {
            for c in 0..dim {
                dirs[(r, c)] = axis[(r, c)];
            }
        }
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut row = axis.nrows();
        for i in 0..dim - 1 {
            for (si, sj) in [(s, s), (s, -s), (-s, s), (-s, -s)] {
                dirs[(row, i)] = si;
                dirs[(row, i + 1)] = sj;
                row += 1;
            }
        }
        dirs
    }

    /// Builds a polytope directly from a direction template and matching offsets.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::ShapeMismatch`] if `offsets.len()` does not
    /// match `directions.nrows()`.
    pub fn new(directions: DMatrix<f64>, offsets: DVector<f64>) -> Result<Self, DimensionError> {
        if directions.nrows() != offsets.len() {
            return Err(DimensionError::ShapeMismatch {
                rows: directions.nrows(),
                cols: directions.ncols(),
                vec_len: offsets.len(),
            });
        }
        let dim = directions.ncols();
        Ok(Self {
            directions,
            offsets,
            dim,
        })
    }

    /// The exact H-representation of `set` under the given direction template.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if `directions.ncols() !=
    /// set.dim()`.
    pub fn from_box(set: &BoxSet, directions: &DMatrix<f64>) -> Result<Self, DimensionError> {
        if directions.ncols() != set.dim() {
            return Err(DimensionError::Mismatch {
                expected: set.dim(),
                actual: directions.ncols(),
            });
        }
        let offsets = Self::box_support(set, directions);
        Ok(Self {
            directions: directions.clone(),
            offsets,
            dim: set.dim(),
        })
    }

    /// The support function of a box along each row of `directions`:
    /// `h(d) = sum_j max(d_j lb_j, d_j ub_j)`.
    fn box_support(set: &BoxSet, directions: &DMatrix<f64>) -> DVector<f64> {
        DVector::from_iterator(
            directions.nrows(),
            (0..directions.nrows()).map(|r| {
                (0..directions.ncols())
                    .map(|c| {
                        let d = directions[(r, c)];
                        (d * set.lb()[c]).max(d * set.ub()[c])
                    })
                    .sum()
            }),
        )
    }

    /// The ambient dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The direction template shared by this polytope.
    pub fn directions(&self) -> &DMatrix<f64> {
        &self.directions
    }

    /// `true` if `p` satisfies every halfspace (with a small numerical tolerance).
    pub fn contains(&self, p: &DVector<f64>) -> Result<bool, DimensionError> {
        if p.len() != self.dim {
            return Err(DimensionError::Mismatch {
                expected: self.dim,
                actual: p.len(),
            });
        }
        const TOL: f64 = 1e-9;
        Ok((0..self.directions.nrows()).all(|r| {
            let lhs: f64 = (0..self.dim).map(|c| self.directions[(r, c)] * p[c]).sum();
            lhs <= self.offsets[r] + TOL
        }))
    }

    /// The exact axis-aligned bounding box, read directly off the first `2n`
    /// rows of the direction template.
    pub fn bounding_box(&self) -> BoxSet {
        let mut lb = DVector::zeros(self.dim);
        let mut ub = DVector::zeros(self.dim);
        for i in 0..self.dim {
            ub[i] = self.offsets[2 * i];
            lb[i] = -self.offsets[2 * i + 1];
        }
        BoxSet::new(lb, ub).expect("axis template bounds are always ordered")
    }

    /// Rejection-samples `n` points from the bounding box, keeping those that
    /// satisfy every halfspace. Gives up (returning fewer than `n` rows, never
    /// hanging) after `200 * n` attempts.
    pub fn sample(&self, n: usize, rng: &mut Rng) -> DMatrix<f64> {
        let bbox = self.bounding_box();
        let mut rows = Vec::with_capacity(n);
        let max_attempts = 200 * n.max(1);
        let mut attempts = 0;
        while rows.len() < n && attempts < max_attempts {
            attempts += 1;
            let candidate = DVector::from_iterator(
                self.dim,
                (0..self.dim).map(|i| {
                    let (lb, ub) = (bbox.lb()[i], bbox.ub()[i]);
                    if lb == ub {
                        lb
                    } else {
                        rng.gen_range(lb..=ub)
                    }
                }),
            );
            if self.contains(&candidate).unwrap_or(false) {
                rows.push(candidate);
            }
        }
        let mut out = DMatrix::zeros(rows.len(), self.dim);
        for (r, row) in rows.into_iter().enumerate() {
            for c in 0..self.dim {
                out[(r, c)] = row[c];
            }
        }
        out
    }

    /// A Monte-Carlo estimate of the polytope's volume, for diagnostics only
    /// (not used on any soundness-critical path).
    pub fn volume_estimate(&self, samples: usize, rng: &mut Rng) -> f64 {
        if samples == 0 {
            return 0.0;
        }
        let bbox = self.bounding_box();
        let bbox_volume = bbox.volume();
        if bbox_volume == 0.0 {
            return 0.0;
        }
        let hits = self.sample(samples, rng).nrows();
        bbox_volume * (hits as f64 / samples as f64)
    }

    /// The Minkowski sum `self + other`, exact: each halfspace offset is
    /// shifted by `other`'s support value in that direction.
    pub fn minkowski_add(&self, other: &BoxSet) -> Result<Self, DimensionError> {
        if other.dim() != self.dim {
            return Err(DimensionError::Mismatch {
                expected: self.dim,
                actual: other.dim(),
            });
        }
        let shift = Self::box_support(other, &self.directions);
        Ok(Self {
            directions: self.directions.clone(),
            offsets: &self.offsets + shift,
            dim: self.dim,
        })
    }

    /// A sound over-approximation of the affine image `{M x + d : x in self}`.
    ///
    /// Exact support-function propagation through an affine map would need a
    /// linear program per direction; since polytopes are only ever used at
    /// network output interfaces (never threaded back through dynamics, see
    /// §4.1), this instead bounds `self` by its exact [`Self::bounding_box`],
    /// affine-images *that* box (the same signed-matrix rule the IBP
    /// propagator uses), and re-templates the result — sound because the
    /// bounding box is a superset of `self`, at the cost of the tightness the
    /// polytope's non-axis-aligned halfspaces would otherwise have given.
    pub fn affine_image(&self, m: &DMatrix<f64>, d: &DVector<f64>) -> Result<Self, DimensionError> {
        let image = self.bounding_box().affine_image(m, d)?;
        Self::from_box(&image, &self.directions)
    }

    /// The tightest polytope (over the shared direction template) enclosing
    /// every polytope in `cells`: `offset_i = max_k cells[k].offsets[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if `cells` is empty, or if the
    /// cells do not all share an identical direction template.
    pub fn hull<'a, I: IntoIterator<Item = &'a Self>>(cells: I) -> Result<Self, DimensionError> {
        let mut iter = cells.into_iter();
        let first = iter.next().ok_or(DimensionError::Mismatch {
            expected: 1,
            actual: 0,
        })?;
        let mut offsets = first.offsets.clone();
        for cell in iter {
            if cell.directions != first.directions {
                return Err(DimensionError::Mismatch {
                    expected: first.directions.nrows(),
                    actual: cell.directions.nrows(),
                });
            }
            for i in 0..offsets.len() {
                offsets[i] = offsets[i].max(cell.offsets[i]);
            }
        }
        Ok(Self {
            directions: first.directions.clone(),
            offsets,
            dim: first.dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_round_trip_bounding_box() {
        let set = BoxSet::from_bounds(&[-1.0, -2.0], &[3.0, 4.0]).unwrap();
        let dirs = Polytope::axis_directions(2);
        let poly = Polytope::from_box(&set, &dirs).unwrap();
        assert_eq!(poly.bounding_box(), set);
    }

    #[test]
    fn hull_is_elementwise_max_offset() {
        let dirs = Polytope::axis_directions(1);
        let a = Polytope::from_box(&BoxSet::from_bounds(&[0.0], &[1.0]).unwrap(), &dirs).unwrap();
        let b = Polytope::from_box(&BoxSet::from_bounds(&[-1.0], &[0.5]).unwrap(), &dirs).unwrap();
        let hull = Polytope::hull([&a, &b]).unwrap();
        assert_eq!(hull.bounding_box(), BoxSet::from_bounds(&[-1.0], &[1.0]).unwrap());
    }

    #[test]
    fn octagon_directions_include_axes() {
        let dirs = Polytope::octagon_directions(2);
        assert_eq!(dirs.nrows(), 4 + 4);
        assert_eq!(dirs.ncols(), 2);
    }

    #[test]
    fn contains_matches_bounding_box_for_axis_template() {
        let set = BoxSet::from_bounds(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
        let dirs = Polytope::axis_directions(2);
        let poly = Polytope::from_box(&set, &dirs).unwrap();
        assert!(poly.contains(&DVector::from_row_slice(&[0.5, 0.5])).unwrap());
        assert!(!poly.contains(&DVector::from_row_slice(&[1.5, 0.5])).unwrap());
    }
}
