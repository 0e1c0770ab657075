//! Error types for mesh construction, stencils, and communication.

use crate::stencil::DiffMethod;
use gyre_core::{Axis, CellLoc, FieldError};
use std::error::Error;
use std::fmt;

/// Errors from the inter-rank communicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// A peer rank hung up before the exchange completed.
    Disconnected {
        /// Rank of the peer that went away.
        peer: usize,
    },
    /// The global sum does not fit in a `u64`.
    Overflow,
    /// Halo buffers from a neighbour had an unexpected length.
    HaloLength {
        /// Expected element count.
        expected: usize,
        /// Received element count.
        actual: usize,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { peer } => write!(f, "rank {peer} disconnected"),
            Self::Overflow => write!(f, "global reduction overflowed"),
            Self::HaloLength { expected, actual } => {
                write!(f, "halo length {actual}, expected {expected}")
            }
        }
    }
}

impl Error for CommError {}

/// Errors arising from mesh construction or index-space operations.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshError {
    /// Mesh parameters are inconsistent.
    InvalidConfig {
        /// What went wrong.
        reason: String,
    },
    /// The stencil does not provide this method.
    UnsupportedMethod {
        /// Name of the stencil family.
        op: &'static str,
        /// Requested method.
        method: DiffMethod,
    },
    /// No direct stencil maps between these locations along this axis.
    UnsupportedLocation {
        /// Axis of differentiation or interpolation.
        axis: Axis,
        /// Input location.
        from: CellLoc,
        /// Requested output location.
        to: CellLoc,
    },
    /// The stencil reaches past the guard cells.
    InsufficientGuards {
        /// Axis of differentiation.
        axis: Axis,
        /// Guard width the stencil needs.
        needed: usize,
        /// Guard width the mesh has.
        available: usize,
    },
    /// A field's shape does not match the local mesh block.
    ShapeMismatch {
        /// Mesh `(nx, ny)`.
        expected: (usize, usize),
        /// Field `(nx, ny)`.
        actual: (usize, usize),
    },
    /// Field storage or arithmetic failed.
    Field(FieldError),
    /// Guard-cell exchange or reduction failed.
    Comm(CommError),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid mesh: {reason}"),
            Self::UnsupportedMethod { op, method } => {
                write!(f, "{op} has no {method} stencil")
            }
            Self::UnsupportedLocation { axis, from, to } => {
                write!(f, "no {axis} stencil from {from} to {to}")
            }
            Self::InsufficientGuards {
                axis,
                needed,
                available,
            } => write!(
                f,
                "{axis} stencil needs {needed} guard cells, mesh has {available}"
            ),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "field shape {actual:?} does not match mesh {expected:?}")
            }
            Self::Field(e) => write!(f, "field error: {e}"),
            Self::Comm(e) => write!(f, "communication failed: {e}"),
        }
    }
}

impl Error for MeshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(e) => Some(e),
            Self::Comm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for MeshError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<CommError> for MeshError {
    fn from(e: CommError) -> Self {
        Self::Comm(e)
    }
}
