//! Rectangular mesh with x-slab decomposition.

use crate::comm::{Communicator, SingleProcess};
use crate::error::{CommError, MeshError};
use crate::interp::interpolate;
use crate::mesh::{BoundaryRanges, Mesh};
use crate::metric::Metric;
use crate::region::{XRange, YTopology};
use crate::stencil::{self, line, DiffMethod, Stagger};
use gyre_core::{Axis, CellLoc, Dims, Field, MeshInstanceId};
use smallvec::{smallvec, SmallVec};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// A logically rectangular mesh split into equal x-slabs, one per rank.
///
/// Each rank holds `nx / size` interior columns plus `mxg` guard
/// columns either side, all `ny` interior rows plus `myg` guard rows
/// either side, and every z plane. X guards on the first and last rank
/// are boundary points; interior-facing x guards are filled by
/// [`Mesh::communicate`].
///
/// # Examples
///
/// ```
/// use gyre_mesh::{Mesh, StructuredMesh};
///
/// let mesh = StructuredMesh::builder()
///     .interior(8, 6)
///     .planes(4)
///     .guards(2, 2)
///     .build()
///     .unwrap();
/// assert_eq!(mesh.local_nx(), 12);
/// assert_eq!((mesh.xstart(), mesh.xend()), (2, 9));
/// assert!(mesh.first_x() && mesh.last_x());
/// ```
pub struct StructuredMesh {
    id: MeshInstanceId,
    nx: usize,
    ny: usize,
    nz: usize,
    mxg: usize,
    myg: usize,
    x_offset: usize,
    y_topology: YTopology,
    metric: Metric,
    comm: Arc<dyn Communicator>,
}

/// Builder for [`StructuredMesh`].
pub struct StructuredMeshBuilder {
    nx: usize,
    ny: usize,
    nz: usize,
    mxg: usize,
    myg: usize,
    y_topology: YTopology,
    spacing: (f64, f64, f64),
    metric: Option<Metric>,
    comm: Option<Arc<dyn Communicator>>,
}

impl StructuredMesh {
    /// Start building a mesh.
    pub fn builder() -> StructuredMeshBuilder {
        StructuredMeshBuilder {
            nx: 0,
            ny: 0,
            nz: 1,
            mxg: 2,
            myg: 2,
            y_topology: YTopology::Open,
            spacing: (1.0, 1.0, 1.0),
            metric: None,
            comm: None,
        }
    }

    /// Global interior index of this rank's first interior column.
    pub fn x_offset(&self) -> usize {
        self.x_offset
    }

    fn check_field(&self, f: &Field) -> Result<(), MeshError> {
        let (nx, ny, nz) = f.shape();
        if nx != self.nx || ny != self.ny || (f.is_3d() && nz != self.nz) {
            return Err(MeshError::ShapeMismatch {
                expected: (self.nx, self.ny),
                actual: (nx, ny),
            });
        }
        Ok(())
    }

    /// Evaluate `point` over the region an `axis` derivative covers:
    /// the interior for x and y, every point for z. Other points are zero.
    fn sweep(
        &self,
        dims: Dims,
        axis: Axis,
        width: usize,
        outloc: CellLoc,
        point: impl Fn(usize, usize, usize) -> f64,
    ) -> Result<Field, MeshError> {
        let available = match axis {
            Axis::X => self.mxg,
            Axis::Y => self.myg,
            Axis::Z => usize::MAX,
        };
        if width > available {
            return Err(MeshError::InsufficientGuards {
                axis,
                needed: width,
                available,
            });
        }
        let mut out = Field::zeros(dims, self.nx, self.ny, self.nz, outloc);
        let (xs, ys) = match axis {
            Axis::Z => (0..=self.nx - 1, 0..=self.ny - 1),
            _ => (self.xstart()..=self.xend(), self.ystart()..=self.yend()),
        };
        let planes = out.shape().2;
        let ny = self.ny;
        let vals = out.values_mut()?;
        for x in xs {
            for y in ys.clone() {
                for z in 0..planes {
                    vals[(x * ny + y) * planes + z] = point(x, y, z);
                }
            }
        }
        Ok(out)
    }

    fn pack_columns(f: &Field, cols: Range<usize>) -> Result<Vec<f64>, MeshError> {
        let (_, ny, planes) = f.shape();
        let vals = f.values()?;
        let mut buf = Vec::with_capacity(cols.len() * ny * planes);
        for x in cols {
            let base = x * ny * planes;
            buf.extend_from_slice(&vals[base..base + ny * planes]);
        }
        Ok(buf)
    }

    fn unpack_columns(f: &mut Field, cols: Range<usize>, buf: &[f64]) -> Result<(), MeshError> {
        let (_, ny, planes) = f.shape();
        let expected = cols.len() * ny * planes;
        if buf.len() != expected {
            return Err(CommError::HaloLength {
                expected,
                actual: buf.len(),
            }
            .into());
        }
        let start = cols.start * ny * planes;
        f.values_mut()?[start..start + expected].copy_from_slice(buf);
        Ok(())
    }

    fn y_boundary(&self) -> BoundaryRanges {
        if self.y_topology == YTopology::Periodic || self.myg == 0 {
            return SmallVec::new();
        }
        let xs = if self.first_x() { 0 } else { self.xstart() };
        let xe = if self.last_x() {
            self.nx - 1
        } else {
            self.xend()
        };
        smallvec![XRange::new(xs, xe)]
    }
}

fn stagger(axis: Axis, from: CellLoc, to: CellLoc) -> Result<Stagger, MeshError> {
    if from == to {
        Ok(Stagger::None)
    } else if from == CellLoc::Centre && to == axis.low_loc() {
        Ok(Stagger::ToLow)
    } else if from == axis.low_loc() && to == CellLoc::Centre {
        Ok(Stagger::ToCentre)
    } else {
        Err(MeshError::UnsupportedLocation { axis, from, to })
    }
}

fn same_loc(axis: Axis, f: &Field, outloc: CellLoc) -> Result<(), MeshError> {
    if f.loc() != outloc {
        return Err(MeshError::UnsupportedLocation {
            axis,
            from: f.loc(),
            to: outloc,
        });
    }
    Ok(())
}

impl StructuredMeshBuilder {
    /// Global interior extent in x and y.
    pub fn interior(mut self, nx: usize, ny: usize) -> Self {
        self.nx = nx;
        self.ny = ny;
        self
    }

    /// Number of z planes.
    pub fn planes(mut self, nz: usize) -> Self {
        self.nz = nz;
        self
    }

    /// Guard widths in x and y.
    pub fn guards(mut self, mxg: usize, myg: usize) -> Self {
        self.mxg = mxg;
        self.myg = myg;
        self
    }

    /// Topology of the y axis.
    pub fn y_topology(mut self, t: YTopology) -> Self {
        self.y_topology = t;
        self
    }

    /// Constant spacing for the default uniform metric.
    pub fn spacing(mut self, dx: f64, dy: f64, dz: f64) -> Self {
        self.spacing = (dx, dy, dz);
        self
    }

    /// Use this metric instead of the uniform default. Its fields must
    /// match [`local_shape`](Self::local_shape).
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    /// Communicator; defaults to [`SingleProcess`].
    pub fn comm(mut self, comm: Arc<dyn Communicator>) -> Self {
        self.comm = Some(comm);
        self
    }

    /// Local `(nx, ny)` including guards that `build` will produce.
    pub fn local_shape(&self) -> (usize, usize) {
        let size = self.comm.as_ref().map_or(1, |c| c.size()).max(1);
        (self.nx / size + 2 * self.mxg, self.ny + 2 * self.myg)
    }

    /// Validate and build.
    pub fn build(self) -> Result<StructuredMesh, MeshError> {
        let invalid = |reason: String| Err(MeshError::InvalidConfig { reason });
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return invalid(format!(
                "extents must be non-zero, got {}x{}x{}",
                self.nx, self.ny, self.nz
            ));
        }
        let comm = self
            .comm
            .clone()
            .unwrap_or_else(|| Arc::new(SingleProcess) as Arc<dyn Communicator>);
        let size = comm.size();
        if size == 0 || self.nx % size != 0 {
            return invalid(format!("nx={} does not split over {size} ranks", self.nx));
        }
        let nx_local = self.nx / size;
        if size > 1 && nx_local < self.mxg {
            return invalid(format!(
                "{nx_local} columns per rank cannot fill {} guard columns",
                self.mxg
            ));
        }
        if self.y_topology == YTopology::Periodic && self.ny < self.myg {
            return invalid(format!(
                "periodic y needs ny >= myg, got ny={} myg={}",
                self.ny, self.myg
            ));
        }
        let (dx, dy, dz) = self.spacing;
        if !(dx > 0.0 && dy > 0.0 && dz > 0.0) {
            return invalid(format!("spacing must be positive, got ({dx}, {dy}, {dz})"));
        }
        let (lnx, lny) = self.local_shape();
        let metric = match self.metric {
            Some(m) => {
                if m.shape() != (lnx, lny) {
                    return Err(MeshError::ShapeMismatch {
                        expected: (lnx, lny),
                        actual: m.shape(),
                    });
                }
                m
            }
            None => Metric::uniform(lnx, lny, dx, dy, dz),
        };
        let rank = comm.rank();
        debug!(rank, nx = lnx, ny = lny, nz = self.nz, "mesh built");
        Ok(StructuredMesh {
            id: MeshInstanceId::next(),
            nx: lnx,
            ny: lny,
            nz: self.nz,
            mxg: self.mxg,
            myg: self.myg,
            x_offset: rank * nx_local,
            y_topology: self.y_topology,
            metric,
            comm,
        })
    }
}

impl Mesh for StructuredMesh {
    fn local_nx(&self) -> usize {
        self.nx
    }

    fn local_ny(&self) -> usize {
        self.ny
    }

    fn local_nz(&self) -> usize {
        self.nz
    }

    fn xstart(&self) -> usize {
        self.mxg
    }

    fn xend(&self) -> usize {
        self.nx - self.mxg - 1
    }

    fn ystart(&self) -> usize {
        self.myg
    }

    fn yend(&self) -> usize {
        self.ny - self.myg - 1
    }

    fn y_topology(&self) -> YTopology {
        self.y_topology
    }

    fn first_x(&self) -> bool {
        self.comm.rank() == 0
    }

    fn last_x(&self) -> bool {
        self.comm.rank() + 1 == self.comm.size()
    }

    fn lower_y_ranges(&self) -> BoundaryRanges {
        self.y_boundary()
    }

    fn upper_y_ranges(&self) -> BoundaryRanges {
        self.y_boundary()
    }

    fn coordinates(&self) -> &Metric {
        &self.metric
    }

    fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    fn index_dd(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError> {
        self.check_field(f)?;
        let kernel = stencil::first(method, stagger(axis, f.loc(), outloc)?).ok_or(
            MeshError::UnsupportedMethod {
                op: "first derivative",
                method,
            },
        )?;
        if axis == Axis::Z && !f.is_3d() {
            return Ok(Field::zeros(Dims::Two, self.nx, self.ny, 1, outloc));
        }
        let vals = f.values()?;
        self.sweep(f.dims(), axis, method.width(), outloc, |x, y, z| {
            kernel(&line(f, vals, axis, x, y, z))
        })
    }

    fn index_d2(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError> {
        self.check_field(f)?;
        same_loc(axis, f, outloc)?;
        let kernel = stencil::second(method).ok_or(MeshError::UnsupportedMethod {
            op: "second derivative",
            method,
        })?;
        if axis == Axis::Z && !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let vals = f.values()?;
        self.sweep(f.dims(), axis, method.width(), outloc, |x, y, z| {
            kernel(&line(f, vals, axis, x, y, z))
        })
    }

    fn index_d4(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError> {
        self.check_field(f)?;
        same_loc(axis, f, outloc)?;
        let kernel = stencil::fourth(method).ok_or(MeshError::UnsupportedMethod {
            op: "fourth derivative",
            method,
        })?;
        if axis == Axis::Z && !f.is_3d() {
            return Ok(f.zeros_like());
        }
        let vals = f.values()?;
        // The five-point stencil reaches two cells.
        self.sweep(f.dims(), axis, 2, outloc, |x, y, z| {
            kernel(&line(f, vals, axis, x, y, z))
        })
    }

    fn index_vdd(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError> {
        self.check_field(v)?;
        self.check_field(f)?;
        same_loc(axis, f, outloc)?;
        let kernel = stencil::upwind(method);
        let dims = v.dims().max(f.dims());
        if axis == Axis::Z && !f.is_3d() {
            return Ok(Field::zeros(dims, self.nx, self.ny, self.nz, outloc));
        }
        let vv = v.values()?;
        let fv = f.values()?;
        self.sweep(dims, axis, method.width(), outloc, |x, y, z| {
            kernel(vv[v.index(x, y, z)], &line(f, fv, axis, x, y, z))
        })
    }

    fn index_fdd(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError> {
        self.check_field(v)?;
        self.check_field(f)?;
        same_loc(axis, f, outloc)?;
        let kernel = stencil::flux(method).ok_or(MeshError::UnsupportedMethod {
            op: "flux derivative",
            method,
        })?;
        let dims = v.dims().max(f.dims());
        if axis == Axis::Z && !f.is_3d() {
            return Ok(Field::zeros(dims, self.nx, self.ny, self.nz, outloc));
        }
        let vv = v.values()?;
        let fv = f.values()?;
        self.sweep(dims, axis, method.width(), outloc, |x, y, z| {
            kernel(&line(v, vv, axis, x, y, z), &line(f, fv, axis, x, y, z))
        })
    }

    fn interp_to(&self, f: &Field, loc: CellLoc) -> Result<Field, MeshError> {
        self.check_field(f)?;
        interpolate(f, loc)
    }

    fn communicate(&self, f: &mut Field) -> Result<(), MeshError> {
        self.check_field(f)?;
        if self.comm.size() > 1 {
            let (xs, xe) = (self.xstart(), self.xend());
            let to_lower = Self::pack_columns(f, xs..xs + self.mxg)?;
            let to_upper = Self::pack_columns(f, xe + 1 - self.mxg..xe + 1)?;
            let halo = self.comm.exchange_x(to_lower, to_upper)?;
            if let Some(buf) = halo.from_lower {
                Self::unpack_columns(f, 0..self.mxg, &buf)?;
            }
            if let Some(buf) = halo.from_upper {
                Self::unpack_columns(f, xe + 1..self.nx, &buf)?;
            }
        }
        if self.y_topology == YTopology::Periodic && self.myg > 0 {
            let span = self.yend() + 1 - self.ystart();
            let planes = f.shape().2;
            for x in 0..self.nx {
                for z in 0..planes {
                    for y in 0..self.myg {
                        let v = f.get(x, y + span, z)?;
                        f.set(x, y, z, v)?;
                    }
                    for y in self.yend() + 1..self.ny {
                        let v = f.get(x, y - span, z)?;
                        f.set(x, y, z, v)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn instance_id(&self) -> MeshInstanceId {
        self.id
    }
}
