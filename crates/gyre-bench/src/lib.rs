//! Benchmark profiles for the Gyre mesh solver.
//!
//! Provides pre-built meshes and registries for benchmarks:
//!
//! - [`reference_mesh`]: 64x32 interior with 16 planes (~33K points)
//! - [`stress_mesh`]: 128x64 interior with 32 planes (~262K points)
//! - [`reference_registry`]: a fluid-like variable set
//! - [`reference_codec`]: the registry compiled against a mesh

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use gyre_codec::{RegistryBuilder, StateArena, StateCodec, VariableRegistry};
use gyre_core::{Basis, CellLoc};
use gyre_mesh::{Mesh, StructuredMesh};
use std::sync::Arc;

/// 64x32 interior, 16 planes, two guards, unit spacing.
pub fn reference_mesh() -> Arc<dyn Mesh> {
    Arc::new(
        StructuredMesh::builder()
            .interior(64, 32)
            .planes(16)
            .build()
            .unwrap(),
    )
}

/// 128x64 interior, 32 planes. Eight times [`reference_mesh`].
pub fn stress_mesh() -> Arc<dyn Mesh> {
    Arc::new(
        StructuredMesh::builder()
            .interior(128, 64)
            .planes(32)
            .build()
            .unwrap(),
    )
}

/// Density, pressure and velocity in 3D plus a 2D potential.
///
/// Per point: one 2D slot and five 3D slots per plane.
pub fn reference_registry() -> VariableRegistry {
    RegistryBuilder::new()
        .scalar_2d("phi0")
        .scalar_3d("n", CellLoc::Centre)
        .scalar_3d("p", CellLoc::Centre)
        .vector_3d("v", CellLoc::Centre, Basis::Covariant)
        .build()
        .unwrap()
}

/// [`reference_registry`] on `mesh`, with every variable filled from a
/// smooth deterministic profile.
pub fn reference_codec(mesh: Arc<dyn Mesh>) -> (StateCodec, StateArena) {
    let codec = StateCodec::new(reference_registry(), mesh);
    let mut arena = codec.arena();
    let registry = codec.registry().clone();
    for (k, desc) in registry.iter().enumerate() {
        let phase = k as f64 * 0.3;
        if desc.kind.is_vector() {
            let v = arena.vector_mut(desc.id).unwrap();
            for (c, f) in v.components_mut().into_iter().enumerate() {
                fill_profile(f, phase + c as f64);
            }
        } else {
            fill_profile(arena.var_mut(desc.id).unwrap(), phase);
        }
    }
    (codec, arena)
}

fn fill_profile(f: &mut gyre_core::Field, phase: f64) {
    f.allocate();
    let (nx, ny, nz) = f.shape();
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let v = (0.1 * x as f64 + phase).sin() * (0.2 * y as f64).cos() + 0.01 * z as f64;
                f.set(x, y, z, v).unwrap();
            }
        }
    }
}
