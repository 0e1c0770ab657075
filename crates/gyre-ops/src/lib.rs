//! Differential operators for Gyre.
//!
//! [`Derivs`] binds a [`Mesh`](gyre_mesh::Mesh) to a [`DerivTable`]
//! resolved from a [`DerivConfig`]. Every operator takes the field, and
//! optionally an output location and a differencing method in either
//! order (see [`DerivArgs`]). Results come back in physical units with
//! the metric corrections applied.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod args;
pub mod derivs;
pub mod error;
pub mod table;

pub use args::DerivArgs;
pub use derivs::Derivs;
pub use error::OperatorError;
pub use table::{DerivConfig, DerivTable, LocRule, OpFamily, OpKey, Route};
