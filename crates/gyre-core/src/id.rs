//! Strongly-typed identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies an evolving variable within a frozen variable registry.
///
/// Variables are assigned sequential IDs in canonical registry order:
/// `VarId(n)` is the n-th descriptor after grouping (2D scalars, 3D
/// scalars, 2D vectors, 3D vectors).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VarId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`MeshInstanceId`] allocation.
static MESH_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a mesh object.
///
/// Allocated from a monotonic atomic counter via [`MeshInstanceId::next`].
/// Two distinct meshes always have different IDs, even with identical
/// geometry. Codecs and compiled layouts record the ID of the mesh they
/// were built against so a layout is never reused with another mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshInstanceId(u64);

impl MeshInstanceId {
    /// Allocate a fresh, unique instance ID. Thread-safe.
    pub fn next() -> Self {
        Self(MESH_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MeshInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        let a = MeshInstanceId::next();
        let b = MeshInstanceId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn var_id_display() {
        assert_eq!(VarId(7).to_string(), "7");
        assert_eq!(VarId::from(3), VarId(3));
    }
}
