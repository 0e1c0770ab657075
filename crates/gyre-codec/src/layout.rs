//! The canonical traversal order of the flat state vector.
//!
//! A [`StateLayout`] is compiled once from a registry and a mesh. It
//! lists the evolved `(x, y)` points of the local block region by region
//! and assigns every `(point, slot, z)` a fixed offset:
//!
//! ```text
//! point p:  [ 2D slots ][ plane 0: 3D slots ][ plane 1: 3D slots ] ...
//! offset =  p * per_point + slot                         (2D slot)
//!           p * per_point + n2d + z * n3d + slot         (3D slot)
//! ```
//!
//! Regions are visited in this order: inner-x stripe (first rank only),
//! lower-y boundary, interior, upper-y boundary, outer-x stripe (last
//! rank only). The order is part of the cached Jacobian contract and is
//! versioned by [`LAYOUT_VERSION`].

use crate::hash::Fnv1a;
use crate::registry::VariableRegistry;
use gyre_core::MeshInstanceId;
use gyre_mesh::{Mesh, YTopology};
use indexmap::IndexSet;
use smallvec::SmallVec;
use std::ops::Range;

/// Version of the traversal order. Bump on any change to [`StateLayout::build`].
pub const LAYOUT_VERSION: u32 = 1;

/// A part of the local block with its own traversal rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// `x < xstart`, interior y; first rank only.
    InnerX,
    /// `y < ystart`, x from the mesh's lower-y ranges.
    LowerY,
    /// The evolved interior.
    Interior,
    /// `y > yend`, x from the mesh's upper-y ranges.
    UpperY,
    /// `x > xend`, interior y; last rank only.
    OuterX,
}

/// A column of per-point state, resolved to its dimension group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotRef {
    /// Index into the 2D slots.
    Two(usize),
    /// Index into the 3D slots.
    Three(usize),
}

/// Compiled traversal order for one registry on one mesh block.
#[derive(Clone, Debug)]
pub struct StateLayout {
    points: IndexSet<(usize, usize)>,
    regions: SmallVec<[(Region, Range<usize>); 5]>,
    n2d: usize,
    n3d: usize,
    nz: usize,
    y_wrap: Option<(usize, usize)>,
    mesh_id: MeshInstanceId,
    fingerprint: u64,
}

impl StateLayout {
    /// Compile the layout.
    pub fn build(registry: &VariableRegistry, mesh: &dyn Mesh) -> Self {
        let (xs, xe, ys, ye) = (mesh.xstart(), mesh.xend(), mesh.ystart(), mesh.yend());
        let (nx, ny) = (mesh.local_nx(), mesh.local_ny());
        let mut points: IndexSet<(usize, usize)> = IndexSet::new();
        let mut regions: SmallVec<[(Region, Range<usize>); 5]> = SmallVec::new();

        let mut region = |r: Region, pts: &mut dyn Iterator<Item = (usize, usize)>| {
            let start = points.len();
            points.extend(pts);
            if points.len() > start {
                regions.push((r, start..points.len()));
            }
        };

        if mesh.first_x() {
            region(Region::InnerX, &mut (0..xs).flat_map(|x| (ys..=ye).map(move |y| (x, y))));
        }
        let lower = mesh.lower_y_ranges();
        region(
            Region::LowerY,
            &mut lower
                .iter()
                .flat_map(|r| r.iter())
                .flat_map(|x| (0..ys).map(move |y| (x, y))),
        );
        region(
            Region::Interior,
            &mut (xs..=xe).flat_map(|x| (ys..=ye).map(move |y| (x, y))),
        );
        let upper = mesh.upper_y_ranges();
        region(
            Region::UpperY,
            &mut upper
                .iter()
                .flat_map(|r| r.iter())
                .flat_map(|x| (ye + 1..ny).map(move |y| (x, y))),
        );
        if mesh.last_x() {
            region(
                Region::OuterX,
                &mut (xe + 1..nx).flat_map(|x| (ys..=ye).map(move |y| (x, y))),
            );
        }

        let n2d = registry.slots_2d().len();
        let n3d = registry.slots_3d().len();
        let nz = mesh.local_nz();
        let mut h = Fnv1a::new()
            .u32(LAYOUT_VERSION)
            .u64(n2d as u64)
            .u64(n3d as u64)
            .u64(nz as u64)
            .u64(points.len() as u64);
        for &(x, y) in &points {
            h = h.u64(x as u64).u64(y as u64);
        }
        Self {
            points,
            regions,
            n2d,
            n3d,
            nz,
            y_wrap: (mesh.y_topology() == YTopology::Periodic).then_some((ys, ye)),
            mesh_id: mesh.instance_id(),
            fingerprint: h.finish(),
        }
    }

    /// Evolved points in traversal order.
    pub fn points(&self) -> impl ExactSizeIterator<Item = (usize, usize)> + '_ {
        self.points.iter().copied()
    }

    /// Number of evolved points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// The `i`-th evolved point.
    pub fn point(&self, i: usize) -> Option<(usize, usize)> {
        self.points.get_index(i).copied()
    }

    /// Position of `(x, y)` in the traversal, if it is evolved.
    pub fn point_index(&self, x: usize, y: usize) -> Option<usize> {
        self.points.get_index_of(&(x, y))
    }

    /// Interior y span `(ystart, yend)` when y is periodic.
    pub fn y_wrap(&self) -> Option<(usize, usize)> {
        self.y_wrap
    }

    /// Non-empty regions with their point ranges, in traversal order.
    pub fn regions(&self) -> &[(Region, Range<usize>)] {
        &self.regions
    }

    /// Number of 2D slots per point.
    pub fn n2d(&self) -> usize {
        self.n2d
    }

    /// Number of 3D slots per plane.
    pub fn n3d(&self) -> usize {
        self.n3d
    }

    /// Number of z planes.
    pub fn nz(&self) -> usize {
        self.nz
    }

    /// Values stored per point.
    pub fn per_point(&self) -> usize {
        self.n2d + self.nz * self.n3d
    }

    /// Length of this rank's partition of the state vector.
    pub fn local_len(&self) -> usize {
        self.points.len() * self.per_point()
    }

    /// Flat offset of `slot` at point `point` and plane `z`.
    /// `z` is ignored for 2D slots.
    #[inline]
    pub fn index_of(&self, point: usize, slot: SlotRef, z: usize) -> usize {
        let base = point * self.per_point();
        match slot {
            SlotRef::Two(s) => base + s,
            SlotRef::Three(s) => base + self.n2d + z * self.n3d + s,
        }
    }

    /// Inverse of [`index_of`](Self::index_of).
    pub fn locate(&self, index: usize) -> (usize, SlotRef, usize) {
        let pp = self.per_point();
        let (point, rem) = (index / pp, index % pp);
        if rem < self.n2d {
            (point, SlotRef::Two(rem), 0)
        } else {
            let rem = rem - self.n2d;
            (point, SlotRef::Three(rem % self.n3d), rem / self.n3d)
        }
    }

    /// Mesh this layout was compiled against.
    pub fn mesh_id(&self) -> MeshInstanceId {
        self.mesh_id
    }

    /// FNV-1a over the version, slot counts and point list.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
