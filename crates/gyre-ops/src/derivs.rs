//! Differential operators in physical units.
//!
//! [`Derivs`] wraps a mesh and a resolved [`DerivTable`]. Each operator
//! looks up its method and location route, calls the mesh's index-space
//! stencil, and scales by the grid spacing. Metric corrections (the
//! non-uniform second-derivative term, the integrated-shear term, the
//! Christoffel terms for vectors) are applied here.

use crate::args::DerivArgs;
use crate::error::OperatorError;
use crate::table::{DerivConfig, DerivTable, OpFamily, OpKey, Route};
use gyre_core::{Axis, Basis, CellLoc, Dims, Field, VectorField};
use gyre_mesh::{DiffMethod, Mesh, MeshError};
use std::sync::Arc;

/// Operator library bound to one mesh.
#[derive(Clone)]
pub struct Derivs {
    mesh: Arc<dyn Mesh>,
    table: DerivTable,
}

impl Derivs {
    /// Resolve `config` against `mesh`.
    pub fn new(mesh: Arc<dyn Mesh>, config: &DerivConfig) -> Result<Self, OperatorError> {
        let table = DerivTable::build(config, mesh.as_ref())?;
        Ok(Self { mesh, table })
    }

    /// The mesh operators run on.
    pub fn mesh(&self) -> &dyn Mesh {
        self.mesh.as_ref()
    }

    /// The resolved strategy table.
    pub fn table(&self) -> &DerivTable {
        &self.table
    }

    /// Look up method and route, then run `op` at the right location.
    fn dispatch(
        &self,
        family: OpFamily,
        axis: Axis,
        inloc: CellLoc,
        args: DerivArgs,
        op: impl Fn(CellLoc, DiffMethod) -> Result<Field, MeshError>,
    ) -> Result<Field, OperatorError> {
        let key = OpKey::new(family, axis);
        let outloc = args.outloc.unwrap_or(inloc);
        let (method, route) = self.table.resolve(key, args.method, inloc, outloc)?;
        match route {
            Route::Direct => Ok(op(outloc, method)?),
            Route::Interpolate => {
                let r = op(inloc, method)?;
                Ok(self.mesh.interp_to(&r, outloc)?)
            }
        }
    }

    fn first_index(&self, f: &Field, axis: Axis, args: DerivArgs) -> Result<Field, OperatorError> {
        self.dispatch(OpFamily::First, axis, f.loc(), args, |loc, m| {
            self.mesh.index_dd(f, axis, loc, m)
        })
    }

    fn second_index(&self, f: &Field, axis: Axis, args: DerivArgs) -> Result<Field, OperatorError> {
        self.dispatch(OpFamily::Second, axis, f.loc(), args, |loc, m| {
            self.mesh.index_d2(f, axis, loc, m)
        })
    }

    fn fourth_index(&self, f: &Field, axis: Axis, args: DerivArgs) -> Result<Field, OperatorError> {
        self.dispatch(OpFamily::Fourth, axis, f.loc(), args, |loc, m| {
            self.mesh.index_d4(f, axis, loc, m)
        })
    }

    // ── First derivatives ───────────────────────────────────────

    /// `df/dx`. For 3D fields on an integrated-shear mesh this adds
    /// `IntShiftTorsion * df/dz`.
    pub fn ddx(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        let args = args.into();
        let metric = self.mesh.coordinates();
        let r = self.first_index(f, Axis::X, args)?.div(&metric.dx)?;
        if f.is_3d() && metric.inc_int_shear {
            let dz = self.ddz(f, args.location_only())?;
            return Ok(r.add(&metric.int_shift_torsion.mul(&dz)?)?);
        }
        Ok(r)
    }

    /// `df/dy`.
    pub fn ddy(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        let metric = self.mesh.coordinates();
        Ok(self.first_index(f, Axis::Y, args.into())?.div(&metric.dy)?)
    }

    /// `df/dz`; the zero field at `f`'s location when `f` is 2D.
    pub fn ddz(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        if !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let dz = self.mesh.coordinates().dz;
        Ok(self.first_index(f, Axis::Z, args.into())?.scale(1.0 / dz)?)
    }

    /// `dv/dz` of a vector, including the Christoffel terms of its basis.
    ///
    /// Covariant: `r_i = dv_i/dz - Σ_k v_k Γ^k_{i z}`.
    /// Contravariant: `r^i = dv^i/dz + Σ_k v^k Γ^i_{k z}`.
    /// A 2D vector gives the zero vector in the same basis.
    pub fn ddz_vector(
        &self,
        v: &VectorField,
        args: impl Into<DerivArgs>,
    ) -> Result<VectorField, OperatorError> {
        if v.dims() == Dims::Two {
            return Ok(v.zeros_like());
        }
        let args = args.into();
        let g = &self.mesh.coordinates().christoffel;
        let comps = v.components();
        let z = Axis::Z.index();
        let component = |i: usize| -> Result<Field, OperatorError> {
            let mut r = self.ddz(comps[i], args)?;
            for (k, vk) in comps.iter().enumerate() {
                r = match v.basis() {
                    Basis::Covariant => r.sub(&vk.mul(g.get(k, i, z))?)?,
                    Basis::Contravariant => r.add(&vk.mul(g.get(i, k, z))?)?,
                };
            }
            Ok(r)
        };
        Ok(VectorField::new(component(0)?, component(1)?, component(2)?, v.basis())?)
    }

    // ── Second derivatives ──────────────────────────────────────

    /// `d²f/dx²`, with `d1_dx * df/dx` added on a non-uniform mesh.
    pub fn d2dx2(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        self.second_along(f, Axis::X, args.into())
    }

    /// `d²f/dy²`, with `d1_dy * df/dy` added on a non-uniform mesh.
    pub fn d2dy2(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        self.second_along(f, Axis::Y, args.into())
    }

    fn second_along(&self, f: &Field, axis: Axis, args: DerivArgs) -> Result<Field, OperatorError> {
        let metric = self.mesh.coordinates();
        let (h, d1) = match axis {
            Axis::X => (&metric.dx, &metric.d1_dx),
            _ => (&metric.dy, &metric.d1_dy),
        };
        let r = self.second_index(f, axis, args)?.div(&h.mul(h)?)?;
        if !metric.non_uniform {
            return Ok(r);
        }
        // The correction always uses the default first-derivative method.
        let df = self.first_index(f, axis, args.location_only())?;
        Ok(r.add(&d1.mul(&df)?.div(h)?)?)
    }

    /// `d²f/dz²`; the zero field when `f` is 2D.
    pub fn d2dz2(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        if !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let dz = self.mesh.coordinates().dz;
        Ok(self.second_index(f, Axis::Z, args.into())?.scale(1.0 / (dz * dz))?)
    }

    // ── Fourth derivatives ──────────────────────────────────────

    /// `d⁴f/dx⁴`.
    pub fn d4dx4(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        let dx = &self.mesh.coordinates().dx;
        let dx2 = dx.mul(dx)?;
        Ok(self.fourth_index(f, Axis::X, args.into())?.div(&dx2.mul(&dx2)?)?)
    }

    /// `d⁴f/dy⁴`.
    pub fn d4dy4(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        let dy = &self.mesh.coordinates().dy;
        let dy2 = dy.mul(dy)?;
        Ok(self.fourth_index(f, Axis::Y, args.into())?.div(&dy2.mul(&dy2)?)?)
    }

    /// `d⁴f/dz⁴`; the zero field when `f` is 2D.
    pub fn d4dz4(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        if !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let dz = self.mesh.coordinates().dz;
        Ok(self.fourth_index(f, Axis::Z, args.into())?.scale(1.0 / dz.powi(4))?)
    }

    // ── Mixed derivatives ───────────────────────────────────────

    /// `d²f/dxdy`: y derivative, guard exchange, then x derivative.
    ///
    /// The exchange is collective; every rank must call this together.
    pub fn d2dxdy(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        let mut dfdy = self.ddy(f, ())?;
        self.mesh.communicate(&mut dfdy)?;
        self.ddx(&dfdy, args)
    }

    /// `d²f/dxdz` as `ddx(ddz(f))`; zero when `f` is 2D.
    ///
    /// The z derivative covers the x guard cells, so no exchange is needed.
    pub fn d2dxdz(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        if !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let dfdz = self.ddz(f, ())?;
        self.ddx(&dfdz, args)
    }

    /// `d²f/dydz` from the closed four-point stencil; zero when `f` is 2D.
    ///
    /// The result is computed at `f`'s location over the interior and
    /// interpolated if another output location is requested.
    pub fn d2dydz(&self, f: &Field, args: impl Into<DerivArgs>) -> Result<Field, OperatorError> {
        if !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let args = args.into();
        let mesh = self.mesh.as_ref();
        if mesh.ystart() == 0 {
            return Err(MeshError::InsufficientGuards {
                axis: Axis::Y,
                needed: 1,
                available: 0,
            }
            .into());
        }
        let metric = mesh.coordinates();
        let vals = f.values()?;
        let nz = f.shape().2;
        let mut r = f.zeros_like();
        for x in mesh.xstart()..=mesh.xend() {
            for y in mesh.ystart()..=mesh.yend() {
                let dy_up = metric.dy.get(x, y + 1, 0)?;
                let dy_dn = metric.dy.get(x, y - 1, 0)?;
                for z in 0..nz {
                    let kp = (z + 1) % nz;
                    let km = (z + nz - 1) % nz;
                    let at = |yy: usize, zz: usize| vals[f.index(x, yy, zz)];
                    let v = 0.25
                        * ((at(y + 1, kp) - at(y - 1, kp)) / dy_up
                            - (at(y + 1, km) - at(y - 1, km)) / dy_dn)
                        / metric.dz;
                    r.set(x, y, z, v)?;
                }
            }
        }
        match args.outloc {
            Some(loc) if loc != f.loc() => Ok(mesh.interp_to(&r, loc)?),
            _ => Ok(r),
        }
    }

    // ── Advection ───────────────────────────────────────────────

    /// `v * df/dx`.
    pub fn vddx(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let dx = &self.mesh.coordinates().dx;
        Ok(self.upwind_index(v, f, Axis::X, args.into())?.div(dx)?)
    }

    /// `v * df/dy`.
    pub fn vddy(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let dy = &self.mesh.coordinates().dy;
        Ok(self.upwind_index(v, f, Axis::Y, args.into())?.div(dy)?)
    }

    /// `v * df/dz`; zero when `f` is 2D.
    pub fn vddz(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let args = args.into();
        if !f.is_3d() {
            return Ok(self.zero_result(v, f, args));
        }
        let dz = self.mesh.coordinates().dz;
        Ok(self.upwind_index(v, f, Axis::Z, args)?.scale(1.0 / dz)?)
    }

    fn upwind_index(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        args: DerivArgs,
    ) -> Result<Field, OperatorError> {
        self.dispatch(OpFamily::Upwind, axis, f.loc(), args, |loc, m| {
            self.mesh.index_vdd(v, f, axis, loc, m)
        })
    }

    // ── Flux form ───────────────────────────────────────────────

    /// `d(v f)/dx`.
    pub fn fddx(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let dx = &self.mesh.coordinates().dx;
        Ok(self.flux_index(v, f, Axis::X, args.into())?.div(dx)?)
    }

    /// `d(v f)/dy`.
    pub fn fddy(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let dy = &self.mesh.coordinates().dy;
        Ok(self.flux_index(v, f, Axis::Y, args.into())?.div(dy)?)
    }

    /// `d(v f)/dz`; zero when `f` is 2D.
    pub fn fddz(
        &self,
        v: &Field,
        f: &Field,
        args: impl Into<DerivArgs>,
    ) -> Result<Field, OperatorError> {
        let args = args.into();
        if !f.is_3d() {
            return Ok(self.zero_result(v, f, args));
        }
        let dz = self.mesh.coordinates().dz;
        Ok(self.flux_index(v, f, Axis::Z, args)?.scale(1.0 / dz)?)
    }

    fn flux_index(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        args: DerivArgs,
    ) -> Result<Field, OperatorError> {
        self.dispatch(OpFamily::Flux, axis, f.loc(), args, |loc, m| {
            self.mesh.index_fdd(v, f, axis, loc, m)
        })
    }

    fn zero_result(&self, v: &Field, f: &Field, args: DerivArgs) -> Field {
        let (nx, ny, _) = f.shape();
        let nz = if v.is_3d() { v.shape().2 } else { 1 };
        Field::zeros(v.dims().max(f.dims()), nx, ny, nz, args.outloc.unwrap_or(f.loc()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_mesh::{Metric, StructuredMesh};

    fn derivs_with(metric: Option<Metric>, nz: usize) -> Derivs {
        let mut b = StructuredMesh::builder()
            .interior(6, 6)
            .planes(nz)
            .spacing(0.5, 0.25, 0.1);
        if let Some(m) = metric {
            b = b.metric(m);
        }
        let mesh: Arc<dyn Mesh> = Arc::new(b.build().unwrap());
        Derivs::new(mesh, &DerivConfig::default()).unwrap()
    }

    fn field3(d: &Derivs, init: impl FnMut(usize, usize, usize) -> f64) -> Field {
        let m = d.mesh();
        Field::from_fn(Dims::Three, m.local_nx(), m.local_ny(), m.local_nz(), CellLoc::Centre, init)
    }

    #[test]
    fn ddx_scales_by_spacing() {
        let d = derivs_with(None, 1);
        let f = field3(&d, |x, _, _| x as f64);
        let r = d.ddx(&f, ()).unwrap();
        assert!((r.get(4, 4, 0).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ddx_adds_shear_term_only_when_enabled() {
        let nz = 8;
        let base = Metric::uniform(10, 10, 0.5, 0.25, 0.1);
        let torsion = Field::from_fn(Dims::Two, 10, 10, 1, CellLoc::Centre, |_, _, _| 3.0);
        let plain = derivs_with(Some(base.clone()), nz);
        let sheared = derivs_with(Some(base.with_shear(torsion)), nz);
        let f = field3(&plain, |x, _, z| x as f64 + (z * z) as f64);
        let a = plain.ddx(&f, ()).unwrap();
        let b = sheared.ddx(&f, ()).unwrap();
        let dz = plain.ddz(&f, ()).unwrap();
        let expected = a.add(&dz.scale(3.0).unwrap()).unwrap();
        assert_eq!(b.max_abs_diff(&expected).unwrap(), 0.0);
        // A 2D field never picks up the shear term.
        let g = Field::from_fn(Dims::Two, 10, 10, 1, CellLoc::Centre, |x, _, _| x as f64);
        assert_eq!(plain.ddx(&g, ()).unwrap(), sheared.ddx(&g, ()).unwrap());
    }

    #[test]
    fn argument_order_is_irrelevant() {
        let d = derivs_with(None, 1);
        let f = field3(&d, |x, y, _| (x * y) as f64);
        let a = d.ddx(&f, (CellLoc::XLow, DiffMethod::C4)).unwrap();
        let b = d.ddx(&f, (DiffMethod::C4, CellLoc::XLow)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.loc(), CellLoc::XLow);
    }

    #[test]
    fn unsupported_call_method_rejected() {
        let d = derivs_with(None, 1);
        let f = field3(&d, |_, _, _| 1.0);
        let err = d.d2dy2(&f, DiffMethod::U2).unwrap_err();
        assert!(matches!(err, OperatorError::UnsupportedMethod { .. }));
    }

    #[test]
    fn mismatched_location_interpolates() {
        let d = derivs_with(None, 1);
        let f = field3(&d, |_, y, _| y as f64);
        let r = d.ddy(&f, CellLoc::XLow).unwrap();
        assert_eq!(r.loc(), CellLoc::XLow);
        assert!((r.get(5, 4, 0).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn z_operators_on_2d_keep_location() {
        let d = derivs_with(None, 4);
        let m = d.mesh();
        let f = Field::from_fn(Dims::Two, m.local_nx(), m.local_ny(), 1, CellLoc::YLow, |x, y, _| {
            (x * 7 + y) as f64
        });
        for r in [
            d.ddz(&f, ()).unwrap(),
            d.d2dz2(&f, ()).unwrap(),
            d.d4dz4(&f, ()).unwrap(),
            d.d2dxdz(&f, ()).unwrap(),
            d.d2dydz(&f, ()).unwrap(),
        ] {
            assert_eq!(r.loc(), CellLoc::YLow);
            assert_eq!(r.dims(), Dims::Two);
            assert!(r.values().unwrap().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn vddz_of_2d_advected_is_zero() {
        let d = derivs_with(None, 4);
        let v = field3(&d, |_, _, z| z as f64);
        let m = d.mesh();
        let f = Field::from_fn(
            Dims::Two,
            m.local_nx(),
            m.local_ny(),
            1,
            CellLoc::Centre,
            |x, _, _| x as f64,
        );
        let r = d.vddz(&v, &f, ()).unwrap();
        assert!(r.is_3d());
        assert!(r.values().unwrap().iter().all(|&x| x == 0.0));
        let q = d.fddz(&v, &f, ()).unwrap();
        assert!(q.values().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn d2dydz_matches_stencil_on_bilinear() {
        let nz = 8;
        let d = derivs_with(None, nz);
        // f = y * z with periodic wrap ignored away from the seam.
        let f = field3(&d, |_, y, z| (y * z) as f64);
        let r = d.d2dydz(&f, ()).unwrap();
        // Index derivatives: d/dy = z, d/dz = y; mixed = 1 in index units.
        let expected = 1.0 / (0.25 * 0.1);
        assert!((r.get(4, 4, 3).unwrap() - expected).abs() < 1e-9);
        assert_eq!(r.get(0, 4, 3).unwrap(), 0.0);
    }

    #[test]
    fn ddz_vector_covariant_and_contravariant_differ() {
        let nz = 4;
        let mut metric = Metric::uniform(10, 10, 0.5, 0.25, 0.1);
        let gamma = Field::from_fn(Dims::Two, 10, 10, 1, CellLoc::Centre, |_, _, _| 2.0);
        // Γ^0_{1z} only.
        metric.christoffel.set(0, 1, 2, gamma);
        let d = derivs_with(Some(metric), nz);
        let c = |v: f64| field3(&d, move |_, _, _| v);
        let cov = VectorField::new(c(1.0), c(10.0), c(100.0), Basis::Covariant).unwrap();
        let r = d.ddz_vector(&cov, ()).unwrap();
        // r_1 = 0 - v_0 Γ^0_{1z} = -2.
        assert_eq!(r.y.get(3, 3, 1).unwrap(), -2.0);
        assert_eq!(r.x.get(3, 3, 1).unwrap(), 0.0);
        assert_eq!(r.basis(), Basis::Covariant);

        let mut contra = cov.clone();
        contra.set_basis(Basis::Contravariant);
        let q = d.ddz_vector(&contra, ()).unwrap();
        // r^0 = 0 + v^1 Γ^0_{1z} = 20.
        assert_eq!(q.x.get(3, 3, 1).unwrap(), 20.0);
        assert_eq!(q.y.get(3, 3, 1).unwrap(), 0.0);
        assert_eq!(q.basis(), Basis::Contravariant);
    }

    #[test]
    fn ddz_vector_of_2d_is_zero_vector() {
        let d = derivs_with(None, 4);
        let m = d.mesh();
        let v = VectorField::unallocated(
            Dims::Two,
            m.local_nx(),
            m.local_ny(),
            1,
            Basis::Contravariant,
        );
        let r = d.ddz_vector(&v, ()).unwrap();
        assert_eq!(r.basis(), Basis::Contravariant);
        assert!(r.x.values().unwrap().iter().all(|&x| x == 0.0));
    }
}
