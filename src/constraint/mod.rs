//! Constraint algebra: the value types representing reachable state sets.
//!
//! [`Constraint`] is a tagged sum over two representations — [`BoxSet`] and
//! [`Polytope`] — with every operation dispatched per variant rather than
//! through a trait-object hierarchy (§9's design note). Mixing variants in a
//! binary operation (e.g. hulling a box with a polytope) is a
//! [`DimensionError`].

pub mod box_set;
pub mod polytope;

pub use box_set::BoxSet;
pub use polytope::Polytope;

use nalgebra::{DMatrix, DVector};

use crate::error::DimensionError;
use crate::rng::Rng;

/// Which representation a [`Constraint`] uses, mirroring
/// `analysis.propagator.boundary_type` in the configuration surface (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryType {
    /// Axis-aligned boxes.
    Box,
    /// H-represented polytopes over a fixed direction template.
    Polytope,
}

/// A state-set constraint: either a [`BoxSet`] or a [`Polytope`].
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// An axis-aligned box.
    Box(BoxSet),
    /// An H-polytope.
    Polytope(Polytope),
}

impl Constraint {
    /// The ambient dimension, regardless of variant.
    pub fn dim(&self) -> usize {
        match self {
            Self::Box(b) => b.dim(),
            Self::Polytope(p) => p.dim(),
        }
    }

    /// The [`BoundaryType`] of this constraint.
    pub fn boundary_type(&self) -> BoundaryType {
        match self {
            Self::Box(_) => BoundaryType::Box,
            Self::Polytope(_) => BoundaryType::Polytope,
        }
    }

    /// `true` if `p` lies within the set.
    pub fn contains(&self, p: &DVector<f64>) -> Result<bool, DimensionError> {
        match self {
            Self::Box(b) => b.contains(p),
            Self::Polytope(poly) => poly.contains(p),
        }
    }

    /// Uniform-enough samples of the set.
    pub fn sample(&self, n: usize, rng: &mut Rng) -> DMatrix<f64> {
        match self {
            Self::Box(b) => b.sample(n, rng),
            Self::Polytope(poly) => poly.sample(n, rng),
        }
    }

    /// The affine image `{M x + d : x in self}`, in the same variant as `self`.
    pub fn affine_image(&self, m: &DMatrix<f64>, d: &DVector<f64>) -> Result<Self, DimensionError> {
        match self {
            Self::Box(b) => Ok(Self::Box(b.affine_image(m, d)?)),
            Self::Polytope(poly) => Ok(Self::Polytope(poly.affine_image(m, d)?)),
        }
    }

    /// The Minkowski sum `self + other`, where `other` is always a box
    /// (§4.1's `minkowski_add(box)` contract).
    pub fn minkowski_add(&self, other: &BoxSet) -> Result<Self, DimensionError> {
        match self {
            Self::Box(b) => Ok(Self::Box(b.minkowski_add(other)?)),
            Self::Polytope(poly) => Ok(Self::Polytope(poly.minkowski_add(other)?)),
        }
    }

    /// A diagnostic volume measure (exact for boxes, Monte-Carlo for polytopes).
    pub fn volume(&self, rng: &mut Rng) -> f64 {
        match self {
            Self::Box(b) => b.volume(),
            Self::Polytope(poly) => poly.volume_estimate(2000, rng),
        }
    }

    /// The exact axis-aligned bounding box of this set, used wherever an
    /// operation needs a box regardless of the configured boundary type
    /// (e.g. polytope inputs must be bounded before propagation, per §4.4).
    pub fn bounding_box(&self) -> BoxSet {
        match self {
            Self::Box(b) => b.clone(),
            Self::Polytope(poly) => poly.bounding_box(),
        }
    }

    /// The smallest constraint of the same kind enclosing every cell in `cells`.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::Mismatch`] if `cells` is empty or mixes
    /// variants.
    pub fn hull<'a, I: IntoIterator<Item = &'a Self>>(cells: I) -> Result<Self, DimensionError> {
        let mut iter = cells.into_iter();
        let first = iter.next().ok_or(DimensionError::Mismatch {
            expected: 1,
            actual: 0,
        })?;
        match first {
            Self::Box(_) => {
                let boxes: Result<Vec<&BoxSet>, DimensionError> = std::iter::once(first)
                    .chain(iter)
                    .map(|c| match c {
                        Self::Box(b) => Ok(b),
                        Self::Polytope(_) => Err(DimensionError::Mismatch {
                            expected: 0,
                            actual: 1,
                        }),
                    })
                    .collect();
                Ok(Self::Box(BoxSet::hull(boxes?)?))
            }
            Self::Polytope(_) => {
                let polys: Result<Vec<&Polytope>, DimensionError> = std::iter::once(first)
                    .chain(iter)
                    .map(|c| match c {
                        Self::Polytope(p) => Ok(p),
                        Self::Box(_) => Err(DimensionError::Mismatch {
                            expected: 1,
                            actual: 0,
                        }),
                    })
                    .collect();
                Ok(Self::Polytope(Polytope::hull(polys?)?))
            }
        }
    }
}

impl From<BoxSet> for Constraint {
    fn from(b: BoxSet) -> Self {
        Self::Box(b)
    }
}

impl From<Polytope> for Constraint {
    fn from(p: Polytope) -> Self {
        Self::Polytope(p)
    }
}
