//! Variable registry and flat state-vector codec for Gyre.
//!
//! Evolving variables are declared once through a [`RegistryBuilder`]
//! and frozen into a [`VariableRegistry`]. A [`StateCodec`] compiles the
//! registry against a mesh into a [`StateLayout`] and moves values
//! between a [`StateArena`] and a flat `f64` buffer:
//!
//! - [`StateCodec::save`] packs the initial state,
//! - [`StateCodec::load`] unpacks the integrator's state,
//! - [`StateCodec::save_derivs`] packs the time derivatives.
//!
//! All three walk the same traversal, described in [`layout`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod arena;
pub mod codec;
pub mod error;
pub mod hash;
pub mod layout;
pub mod registry;

pub use arena::{StateArena, VarStorage};
pub use codec::{StateCodec, StateEntry};
pub use error::CodecError;
pub use layout::{Region, SlotRef, StateLayout, LAYOUT_VERSION};
pub use registry::{RegistryBuilder, Slot, VarKind, VariableDescriptor, VariableRegistry};
