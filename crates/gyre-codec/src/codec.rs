//! Moving variable storage into and out of the flat state vector.
//!
//! [`StateCodec`] owns the frozen registry and the compiled layout. Its
//! three operations share a single traversal so packing, unpacking and
//! the layout's `index_of` can never disagree.

use crate::arena::{StateArena, VarStorage};
use crate::error::CodecError;
use crate::layout::{SlotRef, StateLayout};
use crate::registry::{Slot, VariableRegistry};
use gyre_core::{Dims, Field, FieldError, VarId};
use gyre_mesh::Mesh;
use indexmap::IndexMap;
use std::sync::Arc;

/// What one entry of the state vector holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateEntry {
    /// Variable and component.
    pub slot: Slot,
    /// Local x index.
    pub x: usize,
    /// Local y index.
    pub y: usize,
    /// Plane; 0 for 2D slots.
    pub z: usize,
}

/// Registry, layout and mesh bound together.
#[derive(Clone)]
pub struct StateCodec {
    mesh: Arc<dyn Mesh>,
    registry: VariableRegistry,
    layout: StateLayout,
}

impl StateCodec {
    /// Compile the layout of `registry` on `mesh`.
    pub fn new(registry: VariableRegistry, mesh: Arc<dyn Mesh>) -> Self {
        let layout = StateLayout::build(&registry, mesh.as_ref());
        Self {
            mesh,
            registry,
            layout,
        }
    }

    /// The frozen registry.
    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// The compiled layout.
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// The mesh.
    pub fn mesh(&self) -> &Arc<dyn Mesh> {
        &self.mesh
    }

    /// Length of this rank's state vector.
    pub fn local_len(&self) -> usize {
        self.layout.local_len()
    }

    /// Fresh unallocated storage for every variable.
    pub fn arena(&self) -> StateArena {
        StateArena::new(&self.registry, self.mesh.as_ref())
    }

    /// Identify entry `index` of the state vector.
    pub fn entry(&self, index: usize) -> Option<StateEntry> {
        if index >= self.local_len() {
            return None;
        }
        let (point, slot, z) = self.layout.locate(index);
        let (x, y) = self.layout.point(point)?;
        let slot = match slot {
            SlotRef::Two(s) => self.registry.slots_2d()[s],
            SlotRef::Three(s) => self.registry.slots_3d()[s],
        };
        Some(StateEntry { slot, x, y, z })
    }

    /// SAVE: convert vectors to their declared basis and pack every value.
    ///
    /// Fails with [`CodecError::Unallocated`] if any variable has no storage.
    pub fn save(&self, arena: &mut StateArena, out: &mut [f64]) -> Result<(), CodecError> {
        self.check(arena, out.len())?;
        self.check_shapes(arena.vars())?;
        let metric = self.mesh.coordinates();
        for d in self.registry.iter().filter(|d| d.kind.is_vector()) {
            let v = arena.vector_mut(d.id)?;
            if !v.is_allocated() {
                return Err(unallocated(&self.registry, d.id));
            }
            metric.to_basis(v, d.basis)?;
        }
        let (two, three) = columns(arena.vars(), &self.registry)?;
        self.walk(|flat, slot, k| {
            out[flat] = match slot {
                SlotRef::Two(s) => two[s][k],
                SlotRef::Three(s) => three[s][k],
            };
        });
        Ok(())
    }

    /// LOAD: unpack `u` into variable storage, allocating as needed.
    ///
    /// Every variable ends at its declared location, and every vector
    /// carries its declared basis flag.
    pub fn load(&self, arena: &mut StateArena, u: &[f64]) -> Result<(), CodecError> {
        self.check(arena, u.len())?;
        self.check_shapes(arena.vars())?;
        for (id, storage) in arena.vars_mut().iter_mut() {
            let Some(d) = self.registry.get(*id) else {
                continue;
            };
            match storage {
                VarStorage::Scalar(f) => {
                    f.allocate();
                    f.set_loc(d.location);
                }
                VarStorage::Vector(v) => {
                    v.allocate();
                    v.set_basis(d.basis);
                    for c in v.components_mut() {
                        c.set_loc(d.location);
                    }
                }
            }
        }
        let (mut two, mut three) = columns_mut(arena.vars_mut(), &self.registry)?;
        self.walk(|flat, slot, k| match slot {
            SlotRef::Two(s) => two[s][k] = u[flat],
            SlotRef::Three(s) => three[s][k] = u[flat],
        });
        Ok(())
    }

    /// SAVE_DERIVS: harmonise every time derivative and pack it.
    ///
    /// Vectors are converted to their declared basis; 3D derivatives not
    /// at their variable's declared location are interpolated onto it.
    /// A derivative the model never wrote is [`CodecError::Unallocated`].
    pub fn save_derivs(&self, arena: &mut StateArena, out: &mut [f64]) -> Result<(), CodecError> {
        self.check(arena, out.len())?;
        self.check_shapes(arena.ddts())?;
        let metric = self.mesh.coordinates();
        for (id, storage) in arena.ddts_mut().iter_mut() {
            let Some(d) = self.registry.get(*id) else {
                continue;
            };
            if !storage.is_allocated() {
                return Err(unallocated(&self.registry, *id));
            }
            let is_3d = d.kind.dims() == Dims::Three;
            match storage {
                VarStorage::Scalar(f) => {
                    if is_3d && f.loc() != d.location {
                        *f = self.mesh.interp_to(f, d.location)?;
                    }
                }
                VarStorage::Vector(v) => {
                    metric.to_basis(v, d.basis)?;
                    if is_3d {
                        for c in v.components_mut() {
                            if c.loc() != d.location {
                                *c = self.mesh.interp_to(c, d.location)?;
                            }
                        }
                    }
                }
            }
        }
        let (two, three) = columns(arena.ddts(), &self.registry)?;
        self.walk(|flat, slot, k| {
            out[flat] = match slot {
                SlotRef::Two(s) => two[s][k],
                SlotRef::Three(s) => three[s][k],
            };
        });
        Ok(())
    }

    fn check(&self, arena: &StateArena, len: usize) -> Result<(), CodecError> {
        if arena.mesh_id() != self.layout.mesh_id() {
            return Err(CodecError::MeshMismatch);
        }
        if len != self.local_len() {
            return Err(CodecError::LengthMismatch {
                expected: self.local_len(),
                actual: len,
            });
        }
        Ok(())
    }

    /// Every field must keep the dimensionality and local shape of its
    /// declaration; the traversal indexes storage by that shape.
    fn check_shapes(&self, map: &IndexMap<VarId, VarStorage>) -> Result<(), CodecError> {
        let (nx, ny, nz) = (self.mesh.local_nx(), self.mesh.local_ny(), self.mesh.local_nz());
        for d in self.registry.iter() {
            let Some(storage) = map.get(&d.id) else {
                return Err(unallocated(&self.registry, d.id));
            };
            let dims = d.kind.dims();
            let expected = (nx, ny, if dims == Dims::Three { nz } else { 1 });
            let check = |f: &Field| -> Result<(), CodecError> {
                if f.dims() != dims || f.shape() != expected {
                    return Err(FieldError::ShapeMismatch {
                        expected,
                        actual: f.shape(),
                    }
                    .into());
                }
                Ok(())
            };
            match storage {
                VarStorage::Scalar(f) => check(f)?,
                VarStorage::Vector(v) => {
                    for c in v.components() {
                        check(c)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Visit every entry as `(flat index, slot, index into the field)`.
    fn walk(&self, mut visit: impl FnMut(usize, SlotRef, usize)) {
        let ny = self.mesh.local_ny();
        let (n2d, n3d, nz) = (self.layout.n2d(), self.layout.n3d(), self.layout.nz());
        let mut flat = 0;
        for (x, y) in self.layout.points() {
            let col = x * ny + y;
            for s in 0..n2d {
                visit(flat, SlotRef::Two(s), col);
                flat += 1;
            }
            for z in 0..nz {
                for s in 0..n3d {
                    visit(flat, SlotRef::Three(s), col * nz + z);
                    flat += 1;
                }
            }
        }
    }
}

fn unallocated(registry: &VariableRegistry, id: VarId) -> CodecError {
    CodecError::Unallocated {
        name: registry
            .get(id)
            .map_or_else(|| id.to_string(), |d| d.name.clone()),
    }
}

type Columns<'a> = (Vec<&'a [f64]>, Vec<&'a [f64]>);
type ColumnsMut<'a> = (Vec<&'a mut [f64]>, Vec<&'a mut [f64]>);

/// Value slices in slot order, split by dimension.
///
/// Registry order (2D scalars, 3D scalars, 2D vectors, 3D vectors)
/// filtered by dimension is exactly slot order.
fn columns<'a>(
    map: &'a IndexMap<VarId, VarStorage>,
    registry: &VariableRegistry,
) -> Result<Columns<'a>, CodecError> {
    let mut two = Vec::with_capacity(registry.slots_2d().len());
    let mut three = Vec::with_capacity(registry.slots_3d().len());
    for (id, storage) in map {
        let err = |_| unallocated(registry, *id);
        match storage {
            VarStorage::Scalar(f) => {
                let dst = if f.is_3d() { &mut three } else { &mut two };
                dst.push(f.values().map_err(err)?);
            }
            VarStorage::Vector(v) => {
                let dst = if v.dims() == Dims::Three { &mut three } else { &mut two };
                for c in v.components() {
                    dst.push(c.values().map_err(err)?);
                }
            }
        }
    }
    Ok((two, three))
}

fn columns_mut<'a>(
    map: &'a mut IndexMap<VarId, VarStorage>,
    registry: &VariableRegistry,
) -> Result<ColumnsMut<'a>, CodecError> {
    let mut two = Vec::with_capacity(registry.slots_2d().len());
    let mut three = Vec::with_capacity(registry.slots_3d().len());
    for (id, storage) in map.iter_mut() {
        let err = |_| unallocated(registry, *id);
        match storage {
            VarStorage::Scalar(f) => {
                let dst = if f.is_3d() { &mut three } else { &mut two };
                dst.push(f.values_mut().map_err(err)?);
            }
            VarStorage::Vector(v) => {
                let dst = if v.dims() == Dims::Three { &mut three } else { &mut two };
                for c in v.components_mut() {
                    dst.push(c.values_mut().map_err(err)?);
                }
            }
        }
    }
    Ok((two, three))
}
