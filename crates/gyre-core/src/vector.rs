//! Three-component vector fields in curvilinear coordinates.

use crate::error::FieldError;
use crate::field::Field;
use crate::location::{CellLoc, Dims};

/// Which dual representation a vector's components are stored in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Components `v_i` along the covariant basis.
    #[default]
    Covariant,
    /// Components `v^i` along the contravariant basis.
    Contravariant,
}

/// Three [`Field`] components plus a basis flag.
///
/// All components share dimensionality and shape. The basis flag
/// describes how the components are to be read; it is only changed by
/// an explicit conversion through the metric or by
/// [`set_basis`](Self::set_basis) when the caller knows the components
/// already match.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorField {
    /// First component.
    pub x: Field,
    /// Second component.
    pub y: Field,
    /// Third component.
    pub z: Field,
    basis: Basis,
}

impl VectorField {
    /// Assemble a vector from components.
    pub fn new(x: Field, y: Field, z: Field, basis: Basis) -> Result<Self, FieldError> {
        if x.dims() != y.dims() || x.dims() != z.dims() {
            return Err(FieldError::MixedDims);
        }
        for c in [&y, &z] {
            if c.shape() != x.shape() {
                return Err(FieldError::ShapeMismatch {
                    expected: x.shape(),
                    actual: c.shape(),
                });
            }
        }
        Ok(Self { x, y, z, basis })
    }

    /// A vector whose components are unallocated.
    pub fn unallocated(dims: Dims, nx: usize, ny: usize, nz: usize, basis: Basis) -> Self {
        let c = Field::unallocated(dims, nx, ny, nz, CellLoc::Centre);
        Self {
            x: c.clone(),
            y: c.clone(),
            z: c,
            basis,
        }
    }

    /// The zero vector with this vector's shape and basis.
    pub fn zeros_like(&self) -> Self {
        Self {
            x: self.x.zeros_like(),
            y: self.y.zeros_like(),
            z: self.z.zeros_like(),
            basis: self.basis,
        }
    }

    /// Dimensionality of the components.
    pub fn dims(&self) -> Dims {
        self.x.dims()
    }

    /// Current basis.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Relabel the basis without converting components.
    pub fn set_basis(&mut self, basis: Basis) {
        self.basis = basis;
    }

    /// Whether every component has storage.
    pub fn is_allocated(&self) -> bool {
        self.x.is_allocated() && self.y.is_allocated() && self.z.is_allocated()
    }

    /// Allocate every component.
    pub fn allocate(&mut self) {
        for c in self.components_mut() {
            c.allocate();
        }
    }

    /// Release every component.
    pub fn deallocate(&mut self) {
        for c in self.components_mut() {
            c.deallocate();
        }
    }

    /// Components in `x, y, z` order.
    pub fn components(&self) -> [&Field; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Mutable components in `x, y, z` order.
    pub fn components_mut(&mut self) -> [&mut Field; 3] {
        [&mut self.x, &mut self.y, &mut self.z]
    }
}
