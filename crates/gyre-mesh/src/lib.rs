//! Structured mesh interface and reference implementation for Gyre.
//!
//! The [`Mesh`] trait is everything the operator library and the state
//! codec need from the grid: local extents, ordered boundary regions,
//! ownership of the global x boundaries, index-space stencils, metric
//! factors, staggered interpolation, and guard-cell exchange.
//! [`StructuredMesh`] implements it for an x-slab decomposition over any
//! [`Communicator`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod error;
mod interp;
pub mod mesh;
pub mod metric;
pub mod region;
pub mod stencil;
pub mod structured;

pub use comm::{ChannelComm, Communicator, SingleProcess, XHalo};
pub use error::{CommError, MeshError};
pub use mesh::{BoundaryRanges, Mesh};
pub use metric::{Christoffel, Metric, Tensor};
pub use region::{XRange, YTopology};
pub use stencil::DiffMethod;
pub use structured::{StructuredMesh, StructuredMeshBuilder};
