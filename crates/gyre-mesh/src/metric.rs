//! Metric tensor, Christoffel symbols, and grid-spacing factors.
//!
//! All metric quantities are axisymmetric ([`Dims::Two`]) fields over
//! the local block including guard cells, except `dz`, which is a
//! single constant because z is uniform and periodic.

use gyre_core::{Basis, CellLoc, Dims, Field, FieldError, VectorField};

/// A symmetric rank-2 tensor stored as its six independent components.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// `g11`.
    pub g11: Field,
    /// `g22`.
    pub g22: Field,
    /// `g33`.
    pub g33: Field,
    /// `g12 = g21`.
    pub g12: Field,
    /// `g13 = g31`.
    pub g13: Field,
    /// `g23 = g32`.
    pub g23: Field,
}

impl Tensor {
    /// The identity tensor on an `nx * ny` block.
    pub fn identity(nx: usize, ny: usize) -> Self {
        let one = constant(nx, ny, 1.0);
        let zero = constant(nx, ny, 0.0);
        Self {
            g11: one.clone(),
            g22: one.clone(),
            g33: one,
            g12: zero.clone(),
            g13: zero.clone(),
            g23: zero,
        }
    }

    /// Component `(i, j)` with `i, j` in `0..3`.
    pub fn get(&self, i: usize, j: usize) -> &Field {
        match (i.min(j), i.max(j)) {
            (0, 0) => &self.g11,
            (1, 1) => &self.g22,
            (0, 1) => &self.g12,
            (0, 2) => &self.g13,
            (1, 2) => &self.g23,
            _ => &self.g33,
        }
    }

    /// Contract with a vector: `r_i = Σ_j g_ij v_j`.
    fn apply(&self, v: &VectorField) -> Result<[Field; 3], FieldError> {
        let comps = v.components();
        let row = |i: usize| -> Result<Field, FieldError> {
            let mut acc = self.get(i, 0).mul(comps[0])?;
            for (j, c) in comps.iter().enumerate().skip(1) {
                acc = acc.add(&self.get(i, j).mul(c)?)?;
            }
            Ok(acc.with_loc(comps[i].loc()))
        };
        Ok([row(0)?, row(1)?, row(2)?])
    }
}

/// Christoffel symbols of the second kind, `Γ^k_ij`, symmetric in `i, j`.
#[derive(Clone, Debug, PartialEq)]
pub struct Christoffel {
    symbols: Vec<Field>,
}

impl Christoffel {
    /// All symbols zero: a Cartesian-like metric.
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            symbols: vec![constant(nx, ny, 0.0); 27],
        }
    }

    /// `Γ^k_ij`.
    pub fn get(&self, k: usize, i: usize, j: usize) -> &Field {
        &self.symbols[k * 9 + i * 3 + j]
    }

    /// Set `Γ^k_ij` and its mirror `Γ^k_ji`.
    pub fn set(&mut self, k: usize, i: usize, j: usize, value: Field) {
        self.symbols[k * 9 + j * 3 + i] = value.clone();
        self.symbols[k * 9 + i * 3 + j] = value;
    }
}

/// Geometry of the local mesh block.
#[derive(Clone, Debug, PartialEq)]
pub struct Metric {
    /// Grid spacing in x.
    pub dx: Field,
    /// Grid spacing in y.
    pub dy: Field,
    /// Grid spacing in z.
    pub dz: f64,
    /// Contravariant components `g^ij`.
    pub contravariant: Tensor,
    /// Covariant components `g_ij`.
    pub covariant: Tensor,
    /// Christoffel symbols.
    pub christoffel: Christoffel,
    /// `d(1/dx)/d(index)`, used when `non_uniform` is set.
    pub d1_dx: Field,
    /// `d(1/dy)/d(index)`, used when `non_uniform` is set.
    pub d1_dy: Field,
    /// Whether second derivatives include the variable-spacing correction.
    pub non_uniform: bool,
    /// Integrated shift torsion, used when `inc_int_shear` is set.
    pub int_shift_torsion: Field,
    /// Whether x derivatives of 3D fields include the shear term.
    pub inc_int_shear: bool,
}

impl Metric {
    /// An orthonormal metric with constant spacing.
    pub fn uniform(nx: usize, ny: usize, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            dx: constant(nx, ny, dx),
            dy: constant(nx, ny, dy),
            dz,
            contravariant: Tensor::identity(nx, ny),
            covariant: Tensor::identity(nx, ny),
            christoffel: Christoffel::zeros(nx, ny),
            d1_dx: constant(nx, ny, 0.0),
            d1_dy: constant(nx, ny, 0.0),
            non_uniform: false,
            int_shift_torsion: constant(nx, ny, 0.0),
            inc_int_shear: false,
        }
    }

    /// `(nx, ny)` of the metric fields.
    pub fn shape(&self) -> (usize, usize) {
        let (nx, ny, _) = self.dx.shape();
        (nx, ny)
    }

    /// Replace the spacing with variable `dx` and `dy`, derive the
    /// `d(1/h)/d(index)` factors by central differences (one-sided at the
    /// block edges) and switch the non-uniform correction on.
    pub fn with_spacing(mut self, dx: Field, dy: Field) -> Result<Self, FieldError> {
        self.d1_dx = index_slope(&dx.map(|h| 1.0 / h)?, true)?;
        self.d1_dy = index_slope(&dy.map(|h| 1.0 / h)?, false)?;
        self.dx = dx;
        self.dy = dy;
        self.non_uniform = true;
        Ok(self)
    }

    /// Switch on the integrated-shear term with the given torsion factor.
    pub fn with_shear(mut self, int_shift_torsion: Field) -> Self {
        self.int_shift_torsion = int_shift_torsion;
        self.inc_int_shear = true;
        self
    }

    /// Convert `v` to covariant components in place.
    pub fn to_covariant(&self, v: &mut VectorField) -> Result<(), FieldError> {
        if v.basis() == Basis::Covariant {
            return Ok(());
        }
        let [x, y, z] = self.covariant.apply(v)?;
        *v = VectorField::new(x, y, z, Basis::Covariant)?;
        Ok(())
    }

    /// Convert `v` to contravariant components in place.
    pub fn to_contravariant(&self, v: &mut VectorField) -> Result<(), FieldError> {
        if v.basis() == Basis::Contravariant {
            return Ok(());
        }
        let [x, y, z] = self.contravariant.apply(v)?;
        *v = VectorField::new(x, y, z, Basis::Contravariant)?;
        Ok(())
    }

    /// Convert `v` to `basis` in place.
    pub fn to_basis(&self, v: &mut VectorField, basis: Basis) -> Result<(), FieldError> {
        match basis {
            Basis::Covariant => self.to_covariant(v),
            Basis::Contravariant => self.to_contravariant(v),
        }
    }
}

fn constant(nx: usize, ny: usize, v: f64) -> Field {
    let mut f = Field::unallocated(Dims::Two, nx, ny, 1, CellLoc::Centre);
    f.fill(v);
    f
}

/// Derivative with respect to index along x (`along_x`) or y.
fn index_slope(f: &Field, along_x: bool) -> Result<Field, FieldError> {
    let (nx, ny, _) = f.shape();
    let n = if along_x { nx } else { ny };
    let at = |i: usize, j: usize| -> Result<f64, FieldError> {
        if along_x {
            f.get(i, j, 0)
        } else {
            f.get(j, i, 0)
        }
    };
    let mut out = f.zeros_like();
    if n < 2 {
        return Ok(out);
    }
    let m = if along_x { ny } else { nx };
    for j in 0..m {
        for i in 0..n {
            let d = if i == 0 {
                at(1, j)? - at(0, j)?
            } else if i == n - 1 {
                at(n - 1, j)? - at(n - 2, j)?
            } else {
                0.5 * (at(i + 1, j)? - at(i - 1, j)?)
            };
            if along_x {
                out.set(i, j, 0, d)?;
            } else {
                out.set(j, i, 0, d)?;
            }
        }
    }
    Ok(out)
}
