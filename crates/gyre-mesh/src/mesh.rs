//! The core `Mesh` trait and `dyn Mesh` downcast support.

use crate::comm::Communicator;
use crate::error::MeshError;
use crate::metric::Metric;
use crate::region::{XRange, YTopology};
use crate::stencil::DiffMethod;
use gyre_core::{Axis, CellLoc, Field, MeshInstanceId};
use smallvec::SmallVec;
use std::any::Any;

/// Ordered x ranges of a y-boundary region.
pub type BoundaryRanges = SmallVec<[XRange; 2]>;

/// A distributed structured grid as seen by one rank.
///
/// Index conventions: local arrays span `0..local_nx()` by
/// `0..local_ny()` by `0..local_nz()`, guard cells included. The evolved
/// interior is `xstart()..=xend()` by `ystart()..=yend()`.
///
/// The `index_*` primitives return derivatives in index units; the
/// caller divides by the spacing. Points they do not compute are zero.
///
/// # Object Safety
///
/// This trait is designed for use as `dyn Mesh` behind an `Arc`. Use
/// `downcast_ref` for opt-in specialization on concrete meshes.
pub trait Mesh: Any + Send + Sync + 'static {
    /// Local x extent including guards.
    fn local_nx(&self) -> usize;

    /// Local y extent including guards.
    fn local_ny(&self) -> usize;

    /// Number of z planes.
    fn local_nz(&self) -> usize;

    /// First interior x index.
    fn xstart(&self) -> usize;

    /// Last interior x index.
    fn xend(&self) -> usize;

    /// First interior y index.
    fn ystart(&self) -> usize;

    /// Last interior y index.
    fn yend(&self) -> usize;

    /// Whether the y guard cells wrap around or hold boundary points.
    fn y_topology(&self) -> YTopology;

    /// Whether this rank owns the global inner-x boundary.
    fn first_x(&self) -> bool;

    /// Whether this rank owns the global outer-x boundary.
    fn last_x(&self) -> bool;

    /// X ranges of the lower-y boundary region, in traversal order.
    fn lower_y_ranges(&self) -> BoundaryRanges;

    /// X ranges of the upper-y boundary region, in traversal order.
    fn upper_y_ranges(&self) -> BoundaryRanges;

    /// Geometry of the local block.
    fn coordinates(&self) -> &Metric;

    /// Communicator shared by the ranks of this mesh.
    fn comm(&self) -> &dyn Communicator;

    /// First derivative in index space.
    ///
    /// `outloc` may differ from `f.loc()` only for a centre/face pair
    /// along `axis`.
    fn index_dd(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError>;

    /// Second derivative in index space. `outloc` must equal `f.loc()`.
    fn index_d2(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError>;

    /// Fourth derivative in index space. `outloc` must equal `f.loc()`.
    fn index_d4(
        &self,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError>;

    /// Advection `v * df/di` in index space.
    fn index_vdd(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError>;

    /// Flux form `d(v f)/di` in index space.
    fn index_fdd(
        &self,
        v: &Field,
        f: &Field,
        axis: Axis,
        outloc: CellLoc,
        method: DiffMethod,
    ) -> Result<Field, MeshError>;

    /// Interpolate `f` onto cell location `loc`.
    fn interp_to(&self, f: &Field, loc: CellLoc) -> Result<Field, MeshError>;

    /// Fill `f`'s guard cells from neighbouring ranks and periodic
    /// images. Collective.
    fn communicate(&self, f: &mut Field) -> Result<(), MeshError>;

    /// Unique instance identifier for this mesh object.
    fn instance_id(&self) -> MeshInstanceId;

    /// Guard widths `(mxg, myg)`.
    fn guards(&self) -> (usize, usize) {
        (self.xstart(), self.ystart())
    }

    /// Number of interior x columns on this rank.
    fn interior_nx(&self) -> usize {
        self.xend() + 1 - self.xstart()
    }
}

impl dyn Mesh {
    /// Attempt to downcast a trait object to a concrete mesh type.
    pub fn downcast_ref<T: Mesh>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}
