//! Error types for the operator library.

use crate::table::OpKey;
use gyre_core::{CellLoc, FieldError};
use gyre_mesh::{DiffMethod, MeshError};
use std::error::Error;
use std::fmt;

/// Errors from building the strategy table or applying an operator.
#[derive(Clone, Debug, PartialEq)]
pub enum OperatorError {
    /// The operator family has no stencil for this method.
    UnsupportedMethod {
        /// Operator family and axis.
        key: OpKey,
        /// Requested method.
        method: DiffMethod,
    },
    /// The input location cannot reach the output location under the
    /// configured location policy.
    LocationMismatch {
        /// Operator family and axis.
        key: OpKey,
        /// Input location.
        from: CellLoc,
        /// Requested output location.
        to: CellLoc,
    },
    /// The mesh rejected the call or guard exchange failed.
    Mesh(MeshError),
    /// Field arithmetic failed.
    Field(FieldError),
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMethod { key, method } => {
                write!(f, "{key} does not support method {method}")
            }
            Self::LocationMismatch { key, from, to } => {
                write!(f, "{key} cannot map {from} to {to}")
            }
            Self::Mesh(e) => write!(f, "mesh error: {e}"),
            Self::Field(e) => write!(f, "field error: {e}"),
        }
    }
}

impl Error for OperatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mesh(e) => Some(e),
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MeshError> for OperatorError {
    fn from(e: MeshError) -> Self {
        Self::Mesh(e)
    }
}

impl From<FieldError> for OperatorError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}
