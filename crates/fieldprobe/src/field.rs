//! Field collaborators.
//!
//! The collection never looks inside a field. It needs two things:
//!
//! - a [`FieldSpace`] that says which points this rank owns
//! - a [`Field`] that evaluates to `value_size` reals at an owned point

use thiserror::Error;

/// Errors a [`Field`] may report from `evaluate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("point {0:?} lies outside the local domain")]
    OutsideDomain(Vec<f64>),

    #[error("{0}")]
    Failed(String),
}

/// Describes the discretized space a probed field lives in, as seen by one rank.
pub trait FieldSpace {
    /// Number of coordinates of a point.
    fn geometric_dim(&self) -> usize;

    /// Number of scalar components produced by one evaluation.
    fn value_size(&self) -> usize;

    /// Pure ownership test against this rank's portion of the domain.
    ///
    /// Over all ranks of a group at most one may return true for a point.
    fn owns(&self, point: &[f64]) -> bool;
}

/// A field that can be evaluated pointwise.
pub trait Field: Sync {
    fn value_size(&self) -> usize;

    fn evaluate(&self, point: &[f64]) -> Result<Vec<f64>, FieldError>;
}

/// Axis-aligned box split into equal slabs along one axis, one slab per rank.
///
/// Rank `r` owns `lo_r <= x[axis] < hi_r`; the last slab also owns its upper
/// face. Points outside the box are owned by nobody.
#[derive(Debug, Clone, PartialEq)]
pub struct SlabPartition {
    lower: Vec<f64>,
    upper: Vec<f64>,
    axis: usize,
    rank: usize,
    size: usize,
    value_size: usize,
}

impl SlabPartition {
    /// Create the partition seen by `rank` of `size`.
    ///
    /// Returns `None` if the corners disagree in length, `axis` is not a
    /// coordinate, the box is empty along `axis` or `rank >= size`.
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        axis: usize,
        rank: usize,
        size: usize,
        value_size: usize,
    ) -> Option<Self> {
        if lower.len() != upper.len() || axis >= lower.len() || rank >= size {
            return None;
        }
        if lower[axis].is_nan() || upper[axis].is_nan() || lower[axis] >= upper[axis] {
            return None;
        }
        Some(Self {
            lower,
            upper,
            axis,
            rank,
            size,
            value_size,
        })
    }

    /// Bounds `[lo, hi)` of this rank's slab along the split axis.
    pub fn slab(&self) -> (f64, f64) {
        let lo = self.lower[self.axis];
        let width = (self.upper[self.axis] - lo) / self.size as f64;
        let slab_lo = lo + width * self.rank as f64;
        let slab_hi = if self.rank + 1 == self.size {
            self.upper[self.axis]
        } else {
            lo + width * (self.rank + 1) as f64
        };
        (slab_lo, slab_hi)
    }

    fn in_box(&self, point: &[f64]) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(x, (lo, hi))| *lo <= *x && *x <= *hi)
    }
}

impl FieldSpace for SlabPartition {
    fn geometric_dim(&self) -> usize {
        self.lower.len()
    }

    fn value_size(&self) -> usize {
        self.value_size
    }

    fn owns(&self, point: &[f64]) -> bool {
        if point.len() != self.lower.len() || !self.in_box(point) {
            return false;
        }
        let x = point[self.axis];
        let (lo, hi) = self.slab();
        if self.rank + 1 == self.size {
            lo <= x && x <= hi
        } else {
            lo <= x && x < hi
        }
    }
}

/// Closure-backed field.
pub struct FnField<F> {
    value_size: usize,
    f: F,
}

impl<F> FnField<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FieldError> + Sync,
{
    pub fn new(value_size: usize, f: F) -> Self {
        Self { value_size, f }
    }
}

impl<F> Field for FnField<F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FieldError> + Sync,
{
    fn value_size(&self) -> usize {
        self.value_size
    }

    fn evaluate(&self, point: &[f64]) -> Result<Vec<f64>, FieldError> {
        (self.f)(point)
    }
}
