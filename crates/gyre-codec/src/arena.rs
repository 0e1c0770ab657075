//! Storage for evolving variables and their time derivatives.
//!
//! A [`StateArena`] holds one value and one time-derivative slot per
//! registered variable, shaped for the local mesh block. Values are
//! allocated on first load; derivatives are released at the start of
//! every residual evaluation so the model must write each one afresh.

use crate::error::CodecError;
use crate::registry::{VarKind, VariableRegistry};
use gyre_core::{Dims, Field, FieldError, MeshInstanceId, VarId, VectorField};
use gyre_mesh::Mesh;
use indexmap::IndexMap;

/// Storage for one variable.
#[derive(Clone, Debug, PartialEq)]
pub enum VarStorage {
    /// A scalar field.
    Scalar(Field),
    /// A vector field.
    Vector(VectorField),
}

impl VarStorage {
    /// Whether every component has backing storage.
    pub fn is_allocated(&self) -> bool {
        match self {
            VarStorage::Scalar(f) => f.is_allocated(),
            VarStorage::Vector(v) => v.is_allocated(),
        }
    }

    fn deallocate(&mut self) {
        match self {
            VarStorage::Scalar(f) => f.deallocate(),
            VarStorage::Vector(v) => v.deallocate(),
        }
    }
}

/// Value and time-derivative storage for every registered variable.
#[derive(Clone, Debug)]
pub struct StateArena {
    vars: IndexMap<VarId, VarStorage>,
    ddts: IndexMap<VarId, VarStorage>,
    mesh_id: MeshInstanceId,
}

impl StateArena {
    /// Unallocated storage for `registry` on `mesh`, at each variable's
    /// declared location and basis.
    pub fn new(registry: &VariableRegistry, mesh: &dyn Mesh) -> Self {
        let (nx, ny, nz) = (mesh.local_nx(), mesh.local_ny(), mesh.local_nz());
        let mut vars = IndexMap::with_capacity(registry.len());
        for d in registry.iter() {
            let dims = d.kind.dims();
            let planes = if dims == Dims::Three { nz } else { 1 };
            let storage = match d.kind {
                VarKind::Scalar2D | VarKind::Scalar3D => {
                    VarStorage::Scalar(Field::unallocated(dims, nx, ny, planes, d.location))
                }
                VarKind::Vector2D | VarKind::Vector3D => {
                    let mut v = VectorField::unallocated(dims, nx, ny, planes, d.basis);
                    for c in v.components_mut() {
                        c.set_loc(d.location);
                    }
                    VarStorage::Vector(v)
                }
            };
            vars.insert(d.id, storage);
        }
        let ddts = vars.clone();
        Self {
            vars,
            ddts,
            mesh_id: mesh.instance_id(),
        }
    }

    /// Mesh the storage is shaped for.
    pub fn mesh_id(&self) -> MeshInstanceId {
        self.mesh_id
    }

    /// Scalar variable value.
    pub fn var(&self, id: VarId) -> Result<&Field, CodecError> {
        scalar(&self.vars, id)
    }

    /// Mutable scalar variable value.
    pub fn var_mut(&mut self, id: VarId) -> Result<&mut Field, CodecError> {
        scalar_mut(&mut self.vars, id)
    }

    /// Vector variable value.
    pub fn vector(&self, id: VarId) -> Result<&VectorField, CodecError> {
        vector(&self.vars, id)
    }

    /// Mutable vector variable value.
    pub fn vector_mut(&mut self, id: VarId) -> Result<&mut VectorField, CodecError> {
        vector_mut(&mut self.vars, id)
    }

    /// Scalar time derivative.
    pub fn ddt(&self, id: VarId) -> Result<&Field, CodecError> {
        scalar(&self.ddts, id)
    }

    /// Mutable scalar time derivative.
    pub fn ddt_mut(&mut self, id: VarId) -> Result<&mut Field, CodecError> {
        scalar_mut(&mut self.ddts, id)
    }

    /// Vector time derivative.
    pub fn ddt_vector(&self, id: VarId) -> Result<&VectorField, CodecError> {
        vector(&self.ddts, id)
    }

    /// Mutable vector time derivative.
    pub fn ddt_vector_mut(&mut self, id: VarId) -> Result<&mut VectorField, CodecError> {
        vector_mut(&mut self.ddts, id)
    }

    /// Replace a scalar time derivative. The shape must match the variable.
    pub fn set_ddt(&mut self, id: VarId, value: Field) -> Result<(), CodecError> {
        let slot = scalar_mut(&mut self.ddts, id)?;
        if slot.shape() != value.shape() || slot.dims() != value.dims() {
            return Err(FieldError::ShapeMismatch {
                expected: slot.shape(),
                actual: value.shape(),
            }
            .into());
        }
        *slot = value;
        Ok(())
    }

    /// Replace a vector time derivative. The shape must match the variable.
    pub fn set_ddt_vector(&mut self, id: VarId, value: VectorField) -> Result<(), CodecError> {
        let slot = vector_mut(&mut self.ddts, id)?;
        if slot.x.shape() != value.x.shape() || slot.dims() != value.dims() {
            return Err(FieldError::ShapeMismatch {
                expected: slot.x.shape(),
                actual: value.x.shape(),
            }
            .into());
        }
        *slot = value;
        Ok(())
    }

    /// Release every time-derivative buffer.
    pub fn release_ddts(&mut self) {
        for s in self.ddts.values_mut() {
            s.deallocate();
        }
    }

    /// Release every value and time-derivative buffer.
    pub fn release_all(&mut self) {
        for s in self.vars.values_mut() {
            s.deallocate();
        }
        self.release_ddts();
    }

    /// Value storage of one variable.
    pub fn storage(&self, id: VarId) -> Option<&VarStorage> {
        self.vars.get(&id)
    }

    pub(crate) fn vars_mut(&mut self) -> &mut IndexMap<VarId, VarStorage> {
        &mut self.vars
    }

    pub(crate) fn ddts_mut(&mut self) -> &mut IndexMap<VarId, VarStorage> {
        &mut self.ddts
    }

    pub(crate) fn vars(&self) -> &IndexMap<VarId, VarStorage> {
        &self.vars
    }

    pub(crate) fn ddts(&self) -> &IndexMap<VarId, VarStorage> {
        &self.ddts
    }
}

fn unknown(id: VarId) -> CodecError {
    CodecError::UnknownVariable {
        key: id.to_string(),
    }
}

fn scalar(map: &IndexMap<VarId, VarStorage>, id: VarId) -> Result<&Field, CodecError> {
    match map.get(&id) {
        Some(VarStorage::Scalar(f)) => Ok(f),
        Some(VarStorage::Vector(_)) => Err(CodecError::WrongKind {
            var: id,
            expected: "scalar",
        }),
        None => Err(unknown(id)),
    }
}

fn scalar_mut(map: &mut IndexMap<VarId, VarStorage>, id: VarId) -> Result<&mut Field, CodecError> {
    match map.get_mut(&id) {
        Some(VarStorage::Scalar(f)) => Ok(f),
        Some(VarStorage::Vector(_)) => Err(CodecError::WrongKind {
            var: id,
            expected: "scalar",
        }),
        None => Err(unknown(id)),
    }
}

fn vector(map: &IndexMap<VarId, VarStorage>, id: VarId) -> Result<&VectorField, CodecError> {
    match map.get(&id) {
        Some(VarStorage::Vector(v)) => Ok(v),
        Some(VarStorage::Scalar(_)) => Err(CodecError::WrongKind {
            var: id,
            expected: "vector",
        }),
        None => Err(unknown(id)),
    }
}

fn vector_mut(
    map: &mut IndexMap<VarId, VarStorage>,
    id: VarId,
) -> Result<&mut VectorField, CodecError> {
    match map.get_mut(&id) {
        Some(VarStorage::Vector(v)) => Ok(v),
        Some(VarStorage::Scalar(_)) => Err(CodecError::WrongKind {
            var: id,
            expected: "vector",
        }),
        None => Err(unknown(id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use gyre_core::{Basis, CellLoc};
    use gyre_mesh::StructuredMesh;

    fn setup() -> (VariableRegistry, StateArena) {
        let mesh = StructuredMesh::builder().interior(4, 3).planes(5).build().unwrap();
        let reg = RegistryBuilder::new()
            .scalar_2d("p")
            .scalar_3d("n", CellLoc::YLow)
            .vector_3d("v", CellLoc::Centre, Basis::Contravariant)
            .build()
            .unwrap();
        let arena = StateArena::new(&reg, &mesh);
        (reg, arena)
    }

    #[test]
    fn storage_follows_declarations() {
        let (reg, arena) = setup();
        let p = arena.var(reg.id_of("p").unwrap()).unwrap();
        assert_eq!(p.dims(), Dims::Two);
        assert_eq!(p.shape(), (8, 7, 1));
        let n = arena.var(reg.id_of("n").unwrap()).unwrap();
        assert_eq!(n.shape(), (8, 7, 5));
        assert_eq!(n.loc(), CellLoc::YLow);
        assert!(!n.is_allocated());
        let v = arena.vector(reg.id_of("v").unwrap()).unwrap();
        assert_eq!(v.basis(), Basis::Contravariant);
    }

    #[test]
    fn kind_checked_on_access() {
        let (reg, arena) = setup();
        let v = reg.id_of("v").unwrap();
        assert!(matches!(arena.var(v), Err(CodecError::WrongKind { .. })));
        assert!(matches!(
            arena.ddt(VarId(99)),
            Err(CodecError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn set_ddt_checks_shape() {
        let (reg, mut arena) = setup();
        let n = reg.id_of("n").unwrap();
        let wrong = Field::zeros(Dims::Three, 8, 7, 4, CellLoc::Centre);
        assert!(arena.set_ddt(n, wrong).is_err());
        let right = Field::zeros(Dims::Three, 8, 7, 5, CellLoc::Centre);
        arena.set_ddt(n, right).unwrap();
        assert!(arena.ddt(n).unwrap().is_allocated());
        arena.release_ddts();
        assert!(!arena.ddt(n).unwrap().is_allocated());
    }
}
