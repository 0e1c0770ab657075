//! Core types for the Gyre structured-mesh solver.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the grid quantities every other crate passes around: scalar fields
//! with staggered cell locations, covariant/contravariant vector fields,
//! strongly-typed identifiers, and the field error type.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod id;
pub mod location;
pub mod vector;

pub use error::FieldError;
pub use field::Field;
pub use id::{MeshInstanceId, VarId};
pub use location::{Axis, CellLoc, Dims};
pub use vector::{Basis, VectorField};
