//! The frozen registry of evolving variables.
//!
//! Variables are declared through [`RegistryBuilder`] in any order and
//! frozen into a [`VariableRegistry`] grouped as 2D scalars, 3D scalars,
//! 2D vectors, 3D vectors, keeping declaration order inside each group.
//! [`VarId`]s are assigned in that canonical order.

use crate::error::CodecError;
use gyre_core::{Axis, Basis, CellLoc, Dims, VarId};
use indexmap::IndexMap;

/// Shape class of a registered variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VarKind {
    /// Axisymmetric scalar.
    Scalar2D,
    /// Full 3D scalar.
    Scalar3D,
    /// Axisymmetric vector.
    Vector2D,
    /// Full 3D vector.
    Vector3D,
}

impl VarKind {
    /// Canonical group order.
    pub const ALL: [VarKind; 4] = [
        VarKind::Scalar2D,
        VarKind::Scalar3D,
        VarKind::Vector2D,
        VarKind::Vector3D,
    ];

    /// Dimensionality of the variable's fields.
    pub fn dims(self) -> Dims {
        match self {
            VarKind::Scalar2D | VarKind::Vector2D => Dims::Two,
            VarKind::Scalar3D | VarKind::Vector3D => Dims::Three,
        }
    }

    /// Whether this is a vector kind.
    pub fn is_vector(self) -> bool {
        matches!(self, VarKind::Vector2D | VarKind::Vector3D)
    }
}

/// Declared metadata for one evolving variable.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableDescriptor {
    /// Canonical identifier.
    pub id: VarId,
    /// Unique name.
    pub name: String,
    /// Shape class.
    pub kind: VarKind,
    /// Declared cell location. Always `Centre` for 2D kinds.
    pub location: CellLoc,
    /// Declared basis. Ignored for scalars.
    pub basis: Basis,
}

/// One column of per-point state: a scalar or one component of a vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Owning variable.
    pub var: VarId,
    /// Vector component, `None` for scalars.
    pub component: Option<Axis>,
}

#[derive(Clone, Debug)]
struct Declared {
    name: String,
    kind: VarKind,
    location: CellLoc,
    basis: Basis,
}

/// Collects variable declarations before freezing them.
///
/// # Examples
///
/// ```
/// use gyre_codec::RegistryBuilder;
/// use gyre_core::{Basis, CellLoc};
///
/// let reg = RegistryBuilder::new()
///     .scalar_3d("density", CellLoc::Centre)
///     .scalar_2d("profile")
///     .vector_3d("velocity", CellLoc::Centre, Basis::Contravariant)
///     .build()
///     .unwrap();
/// // 2D scalars come first regardless of declaration order.
/// assert_eq!(reg.id_of("profile").unwrap().0, 0);
/// assert_eq!(reg.slots_3d().len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    declared: Vec<Declared>,
}

impl RegistryBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: &str, kind: VarKind, location: CellLoc, basis: Basis) -> Self {
        self.declared.push(Declared {
            name: name.to_string(),
            kind,
            location,
            basis,
        });
        self
    }

    /// Declare an axisymmetric scalar.
    pub fn scalar_2d(self, name: &str) -> Self {
        self.push(name, VarKind::Scalar2D, CellLoc::Centre, Basis::default())
    }

    /// Declare a 3D scalar at `location`.
    pub fn scalar_3d(self, name: &str, location: CellLoc) -> Self {
        self.push(name, VarKind::Scalar3D, location, Basis::default())
    }

    /// Declare an axisymmetric vector in `basis`.
    pub fn vector_2d(self, name: &str, basis: Basis) -> Self {
        self.push(name, VarKind::Vector2D, CellLoc::Centre, basis)
    }

    /// Declare a 3D vector at `location` in `basis`.
    pub fn vector_3d(self, name: &str, location: CellLoc, basis: Basis) -> Self {
        self.push(name, VarKind::Vector3D, location, basis)
    }

    /// Freeze the declarations.
    ///
    /// Fails on an empty builder or a repeated name.
    pub fn build(self) -> Result<VariableRegistry, CodecError> {
        if self.declared.is_empty() {
            return Err(CodecError::EmptyRegistry);
        }
        let mut vars = IndexMap::with_capacity(self.declared.len());
        let mut by_name = IndexMap::with_capacity(self.declared.len());
        for kind in VarKind::ALL {
            for d in self.declared.iter().filter(|d| d.kind == kind) {
                let id = VarId(vars.len() as u32);
                if by_name.insert(d.name.clone(), id).is_some() {
                    return Err(CodecError::DuplicateVariable {
                        name: d.name.clone(),
                    });
                }
                vars.insert(
                    id,
                    VariableDescriptor {
                        id,
                        name: d.name.clone(),
                        kind,
                        location: d.location,
                        basis: d.basis,
                    },
                );
            }
        }
        let slots = |dims: Dims| -> Vec<Slot> {
            let mut out = Vec::new();
            for d in vars.values().filter(|d: &&VariableDescriptor| d.kind.dims() == dims) {
                if d.kind.is_vector() {
                    out.extend(Axis::ALL.into_iter().map(|a| Slot {
                        var: d.id,
                        component: Some(a),
                    }));
                } else {
                    out.push(Slot {
                        var: d.id,
                        component: None,
                    });
                }
            }
            out
        };
        let slots_2d = slots(Dims::Two);
        let slots_3d = slots(Dims::Three);
        Ok(VariableRegistry {
            vars,
            by_name,
            slots_2d,
            slots_3d,
        })
    }
}

/// Frozen, canonically ordered variable set.
#[derive(Clone, Debug)]
pub struct VariableRegistry {
    vars: IndexMap<VarId, VariableDescriptor>,
    by_name: IndexMap<String, VarId>,
    slots_2d: Vec<Slot>,
    slots_3d: Vec<Slot>,
}

impl VariableRegistry {
    /// Descriptors in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.vars.values()
    }

    /// Descriptors of one kind, in declaration order.
    pub fn of_kind(&self, kind: VarKind) -> impl Iterator<Item = &VariableDescriptor> {
        self.vars.values().filter(move |d| d.kind == kind)
    }

    /// Look up a descriptor.
    pub fn get(&self, id: VarId) -> Option<&VariableDescriptor> {
        self.vars.get(&id)
    }

    /// Identifier of the variable called `name`.
    pub fn id_of(&self, name: &str) -> Result<VarId, CodecError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CodecError::UnknownVariable {
                key: name.to_string(),
            })
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Always false for a built registry.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Per-point 2D slots: scalars, then vector components.
    pub fn slots_2d(&self) -> &[Slot] {
        &self.slots_2d
    }

    /// Per-plane 3D slots: scalars, then vector components.
    pub fn slots_3d(&self) -> &[Slot] {
        &self.slots_3d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_kind_keeping_declaration_order() {
        let reg = RegistryBuilder::new()
            .vector_3d("v", CellLoc::Centre, Basis::Covariant)
            .scalar_3d("b", CellLoc::XLow)
            .scalar_2d("p")
            .scalar_3d("a", CellLoc::Centre)
            .vector_2d("w", Basis::Contravariant)
            .build()
            .unwrap();
        let names: Vec<_> = reg.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["p", "b", "a", "w", "v"]);
        for (i, d) in reg.iter().enumerate() {
            assert_eq!(d.id, VarId(i as u32));
        }
    }

    #[test]
    fn slots_list_scalars_before_vector_components() {
        let reg = RegistryBuilder::new()
            .vector_3d("v", CellLoc::Centre, Basis::Covariant)
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap();
        let n = reg.id_of("n").unwrap();
        let v = reg.id_of("v").unwrap();
        assert!(reg.slots_2d().is_empty());
        assert_eq!(
            reg.slots_3d(),
            [
                Slot { var: n, component: None },
                Slot { var: v, component: Some(Axis::X) },
                Slot { var: v, component: Some(Axis::Y) },
                Slot { var: v, component: Some(Axis::Z) },
            ]
        );
    }

    #[test]
    fn duplicate_name_rejected() {
        let err = RegistryBuilder::new()
            .scalar_2d("n")
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap_err();
        assert_eq!(err, CodecError::DuplicateVariable { name: "n".into() });
    }

    #[test]
    fn empty_registry_rejected() {
        assert_eq!(
            RegistryBuilder::new().build().unwrap_err(),
            CodecError::EmptyRegistry
        );
    }

    #[test]
    fn unknown_name_reported() {
        let reg = RegistryBuilder::new().scalar_2d("n").build().unwrap();
        assert!(matches!(
            reg.id_of("T"),
            Err(CodecError::UnknownVariable { .. })
        ));
    }
}
