//! Scalar grid fields with staggered cell locations.

use crate::error::FieldError;
use crate::location::{CellLoc, Dims};

/// A scalar quantity on the local mesh block, including guard cells.
///
/// Storage is row-major in `(x, y, z)`: the flat index of a point is
/// `(x * ny + y) * nz + z`. Axisymmetric ([`Dims::Two`]) fields store a
/// single plane and ignore the z index on access. Storage may be
/// unallocated; every accessor reports [`FieldError::Unallocated`]
/// rather than panicking.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    dims: Dims,
    loc: CellLoc,
    nx: usize,
    ny: usize,
    nz: usize,
    data: Option<Vec<f64>>,
}

impl Field {
    /// A field with the given shape and no backing storage.
    ///
    /// For [`Dims::Two`] the `nz` argument is ignored.
    pub fn unallocated(dims: Dims, nx: usize, ny: usize, nz: usize, loc: CellLoc) -> Self {
        let nz = match dims {
            Dims::Two => 1,
            Dims::Three => nz,
        };
        Self {
            dims,
            loc,
            nx,
            ny,
            nz,
            data: None,
        }
    }

    /// An allocated, zero-valued field.
    pub fn zeros(dims: Dims, nx: usize, ny: usize, nz: usize, loc: CellLoc) -> Self {
        let mut f = Self::unallocated(dims, nx, ny, nz, loc);
        f.allocate();
        f
    }

    /// An allocated field with values from `init(x, y, z)`.
    ///
    /// For 2D fields `init` is called with `z == 0`.
    pub fn from_fn(
        dims: Dims,
        nx: usize,
        ny: usize,
        nz: usize,
        loc: CellLoc,
        mut init: impl FnMut(usize, usize, usize) -> f64,
    ) -> Self {
        let mut f = Self::unallocated(dims, nx, ny, nz, loc);
        let mut data = Vec::with_capacity(f.len());
        for x in 0..f.nx {
            for y in 0..f.ny {
                for z in 0..f.nz {
                    data.push(init(x, y, z));
                }
            }
        }
        f.data = Some(data);
        f
    }

    /// Wrap an existing buffer. The buffer length must match the shape.
    pub fn from_values(
        dims: Dims,
        shape: (usize, usize, usize),
        loc: CellLoc,
        values: Vec<f64>,
    ) -> Result<Self, FieldError> {
        let mut f = Self::unallocated(dims, shape.0, shape.1, shape.2, loc);
        if values.len() != f.len() {
            return Err(FieldError::LengthMismatch {
                expected: f.len(),
                actual: values.len(),
            });
        }
        f.data = Some(values);
        Ok(f)
    }

    /// An allocated zero field with this field's shape and location.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.dims, self.nx, self.ny, self.nz, self.loc)
    }

    /// An unallocated field with this field's shape and location.
    pub fn unallocated_like(&self) -> Self {
        Self::unallocated(self.dims, self.nx, self.ny, self.nz, self.loc)
    }

    /// Dimensionality.
    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Whether this field varies in z.
    pub fn is_3d(&self) -> bool {
        self.dims == Dims::Three
    }

    /// Cell location tag.
    pub fn loc(&self) -> CellLoc {
        self.loc
    }

    /// Retag the field's cell location without touching values.
    pub fn set_loc(&mut self, loc: CellLoc) {
        self.loc = loc;
    }

    /// Builder-style [`set_loc`](Self::set_loc).
    pub fn with_loc(mut self, loc: CellLoc) -> Self {
        self.loc = loc;
        self
    }

    /// `(nx, ny, nz)`; `nz == 1` for 2D fields.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Whether the field has zero points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether backing storage exists.
    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// Allocate zero-filled storage if none exists. Existing values are kept.
    pub fn allocate(&mut self) {
        if self.data.is_none() {
            self.data = Some(vec![0.0; self.len()]);
        }
    }

    /// Release backing storage.
    pub fn deallocate(&mut self) {
        self.data = None;
    }

    /// Flat index of `(x, y, z)`. The z index is ignored for 2D fields.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        match self.dims {
            Dims::Two => x * self.ny + y,
            Dims::Three => (x * self.ny + y) * self.nz + z,
        }
    }

    /// Read-only view of the values.
    pub fn values(&self) -> Result<&[f64], FieldError> {
        self.data.as_deref().ok_or(FieldError::Unallocated)
    }

    /// Mutable view of the values.
    pub fn values_mut(&mut self) -> Result<&mut [f64], FieldError> {
        self.data.as_deref_mut().ok_or(FieldError::Unallocated)
    }

    /// Value at `(x, y, z)`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Result<f64, FieldError> {
        let i = self.index(x, y, z);
        Ok(self.values()?[i])
    }

    /// Set the value at `(x, y, z)`.
    pub fn set(&mut self, x: usize, y: usize, z: usize, v: f64) -> Result<(), FieldError> {
        let i = self.index(x, y, z);
        self.values_mut()?[i] = v;
        Ok(())
    }

    /// Set every value, allocating if needed.
    pub fn fill(&mut self, v: f64) {
        self.allocate();
        if let Some(data) = self.data.as_mut() {
            data.fill(v);
        }
    }

    /// Apply `op` to every value.
    pub fn map(&self, op: impl Fn(f64) -> f64) -> Result<Field, FieldError> {
        let values = self.values()?.iter().map(|&v| op(v)).collect();
        Ok(Self {
            data: Some(values),
            ..self.unallocated_like()
        })
    }

    /// Multiply by a constant.
    pub fn scale(&self, k: f64) -> Result<Field, FieldError> {
        self.map(|v| v * k)
    }

    /// Pointwise sum, broadcasting a 2D operand over z.
    pub fn add(&self, other: &Field) -> Result<Field, FieldError> {
        self.zip(other, |a, b| a + b)
    }

    /// Pointwise difference, broadcasting a 2D operand over z.
    pub fn sub(&self, other: &Field) -> Result<Field, FieldError> {
        self.zip(other, |a, b| a - b)
    }

    /// Pointwise product, broadcasting a 2D operand over z.
    pub fn mul(&self, other: &Field) -> Result<Field, FieldError> {
        self.zip(other, |a, b| a * b)
    }

    /// Pointwise quotient, broadcasting a 2D operand over z.
    pub fn div(&self, other: &Field) -> Result<Field, FieldError> {
        self.zip(other, |a, b| a / b)
    }

    /// Largest absolute pointwise difference between two fields.
    pub fn max_abs_diff(&self, other: &Field) -> Result<f64, FieldError> {
        let d = self.sub(other)?;
        Ok(d.values()?.iter().fold(0.0_f64, |m, v| m.max(v.abs())))
    }

    /// Combine two fields pointwise.
    ///
    /// The result takes the larger dimensionality; when one operand is
    /// 2D its value is reused on every plane. The result's location is
    /// that of the 3D operand, or of `self` when dimensionalities match.
    pub fn zip(&self, other: &Field, op: impl Fn(f64, f64) -> f64) -> Result<Field, FieldError> {
        if self.nx != other.nx
            || self.ny != other.ny
            || (self.is_3d() && other.is_3d() && self.nz != other.nz)
        {
            return Err(FieldError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let a = self.values()?;
        let b = other.values()?;
        let (dims, nz, loc) = if !self.is_3d() && other.is_3d() {
            (Dims::Three, other.nz, other.loc)
        } else {
            (self.dims.max(other.dims), self.nz, self.loc)
        };
        let mut out = Field::unallocated(dims, self.nx, self.ny, nz, loc);
        let mut data = Vec::with_capacity(out.len());
        for x in 0..self.nx {
            for y in 0..self.ny {
                for z in 0..out.nz {
                    data.push(op(a[self.index(x, y, z)], b[other.index(x, y, z)]));
                }
            }
        }
        out.data = Some(data);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp3(nx: usize, ny: usize, nz: usize) -> Field {
        Field::from_fn(Dims::Three, nx, ny, nz, CellLoc::Centre, |x, y, z| {
            (x * 100 + y * 10 + z) as f64
        })
    }

    #[test]
    fn unallocated_reports_error() {
        let f = Field::unallocated(Dims::Three, 2, 2, 2, CellLoc::Centre);
        assert!(!f.is_allocated());
        assert_eq!(f.values(), Err(FieldError::Unallocated));
        assert_eq!(f.get(0, 0, 0), Err(FieldError::Unallocated));
    }

    #[test]
    fn allocate_zero_fills_and_keeps_existing() {
        let mut f = Field::unallocated(Dims::Two, 3, 2, 5, CellLoc::Centre);
        f.allocate();
        assert_eq!(f.values().unwrap(), &[0.0; 6]);
        f.set(1, 1, 0, 4.0).unwrap();
        f.allocate();
        assert_eq!(f.get(1, 1, 0).unwrap(), 4.0);
    }

    #[test]
    fn two_d_ignores_z() {
        let f = Field::from_fn(Dims::Two, 2, 3, 8, CellLoc::Centre, |x, y, _| (x * 3 + y) as f64);
        assert_eq!(f.shape(), (2, 3, 1));
        assert_eq!(f.get(1, 2, 0).unwrap(), f.get(1, 2, 7).unwrap());
    }

    #[test]
    fn from_values_checks_length() {
        let err = Field::from_values(Dims::Three, (2, 2, 2), CellLoc::Centre, vec![0.0; 7]);
        assert_eq!(
            err,
            Err(FieldError::LengthMismatch {
                expected: 8,
                actual: 7
            })
        );
    }

    #[test]
    fn broadcast_two_d_over_planes() {
        let f = ramp3(2, 2, 3).with_loc(CellLoc::XLow);
        let g = Field::from_fn(Dims::Two, 2, 2, 1, CellLoc::Centre, |x, _, _| (x + 1) as f64);
        let p = g.mul(&f).unwrap();
        assert!(p.is_3d());
        assert_eq!(p.loc(), CellLoc::XLow);
        assert_eq!(p.get(1, 1, 2).unwrap(), 2.0 * 112.0);
        assert_eq!(p.get(0, 1, 2).unwrap(), 12.0);
    }

    #[test]
    fn shape_mismatch_rejected() {
        let a = ramp3(2, 2, 2);
        let b = ramp3(2, 3, 2);
        assert!(matches!(a.add(&b), Err(FieldError::ShapeMismatch { .. })));
    }

    #[test]
    fn max_abs_diff_finds_largest() {
        let a = ramp3(2, 2, 2);
        let mut b = a.clone();
        b.set(1, 0, 1, 0.0).unwrap();
        assert_eq!(a.max_abs_diff(&b).unwrap(), 101.0);
    }

    proptest! {
        #[test]
        fn index_is_bijective(nx in 1usize..5, ny in 1usize..5, nz in 1usize..5) {
            let f = Field::unallocated(Dims::Three, nx, ny, nz, CellLoc::Centre);
            let mut seen = vec![false; f.len()];
            for x in 0..nx {
                for y in 0..ny {
                    for z in 0..nz {
                        let i = f.index(x, y, z);
                        prop_assert!(!seen[i]);
                        seen[i] = true;
                    }
                }
            }
            prop_assert!(seen.iter().all(|&s| s));
        }

        #[test]
        fn sub_self_is_zero(vals in proptest::collection::vec(-1e6f64..1e6, 12)) {
            let f = Field::from_values(Dims::Three, (2, 3, 2), CellLoc::Centre, vals).unwrap();
            let d = f.sub(&f).unwrap();
            prop_assert!(d.values().unwrap().iter().all(|&v| v == 0.0));
        }
    }
}
