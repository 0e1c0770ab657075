//! Gyre: a structured-mesh PDE core.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Gyre sub-crates. Most users only need `gyre` as a dependency.
//!
//! # Quick start
//!
//! ```rust
//! use gyre::prelude::*;
//! use std::sync::Arc;
//!
//! // 8x4 interior, one plane, unit spacing.
//! let mesh: Arc<dyn Mesh> = Arc::new(
//!     StructuredMesh::builder().interior(8, 4).build().unwrap(),
//! );
//! let registry = RegistryBuilder::new()
//!     .scalar_3d("n", CellLoc::Centre)
//!     .build()
//!     .unwrap();
//! let codec = StateCodec::new(registry, Arc::clone(&mesh));
//! let ops = Derivs::new(Arc::clone(&mesh), &DerivConfig::default()).unwrap();
//!
//! // dn/dt = d2n/dx2 - n
//! let model = |_t: f64, ctx: &mut RhsContext<'_>| -> Result<(), RhsFault> {
//!     let n = ctx.id("n")?;
//!     let f = ctx.var(n)?;
//!     let ddt = ctx.ops().d2dx2(f, ())?.sub(f)?;
//!     ctx.set_ddt(n, ddt)
//! };
//! let config = SolverConfig {
//!     nout: 2,
//!     output_interval: 0.1,
//!     initial_step: Some(0.01),
//!     ..SolverConfig::default()
//! };
//! let mut driver = Driver::new(codec, ops, model, Box::new(SspRk3::new()), config).unwrap();
//! let n = driver.codec().registry().id_of("n").unwrap();
//! driver.arena_mut().var_mut(n).unwrap().fill(1.0);
//!
//! driver.init().unwrap();
//! let outcome = driver.run().unwrap();
//! assert_eq!(outcome.iteration, 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gyre-core` | Fields, vectors, cell locations, identifiers |
//! | [`mesh`] | `gyre-mesh` | Mesh trait, structured mesh, metric, communicators |
//! | [`ops`] | `gyre-ops` | Differential operators and the method table |
//! | [`codec`] | `gyre-codec` | Variable registry, arena and state-vector codec |
//! | [`solver`] | `gyre-solver` | Driver, integrators, Jacobian structure, config |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Fields, vector fields and identifiers (`gyre-core`).
pub use gyre_core as types;

/// Mesh interface and the reference structured mesh (`gyre-mesh`).
///
/// [`mesh::StructuredMesh`] splits x across the ranks of any
/// [`mesh::Communicator`]; [`mesh::ChannelComm`] runs ranks as threads.
pub use gyre_mesh as mesh;

/// Differential operators (`gyre-ops`).
///
/// [`ops::Derivs`] is the entry point. Methods are chosen per operator
/// family through [`ops::DerivConfig`].
pub use gyre_ops as ops;

/// Variable registry and flat state-vector codec (`gyre-codec`).
pub use gyre_codec as codec;

/// Time integration driver (`gyre-solver`).
///
/// [`solver::Driver`] runs a [`solver::Model`] with any
/// [`solver::Integrator`]; [`solver::SspRk3`] is the built-in explicit
/// stepper.
pub use gyre_solver as solver;

/// Common imports for typical Gyre usage.
///
/// ```rust
/// use gyre::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use gyre_core::{Basis, CellLoc, Dims, Field, FieldError, VarId, VectorField};

    // Mesh
    pub use gyre_mesh::{DiffMethod, Mesh, StructuredMesh, YTopology};

    // Operators
    pub use gyre_ops::{DerivArgs, DerivConfig, Derivs, OperatorError};

    // Codec
    pub use gyre_codec::{CodecError, RegistryBuilder, StateCodec};

    // Solver
    pub use gyre_solver::{
        Driver, JacobianConfig, Model, MonitorAction, RhsContext, RhsFault, RunOutcome,
        SolverConfig, SolverError, SspRk3,
    };
}
