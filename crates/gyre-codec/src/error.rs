//! Codec error types.

use gyre_core::{FieldError, VarId};
use gyre_mesh::MeshError;
use std::error::Error;
use std::fmt;

/// Errors from building a registry or moving state through the codec.
#[derive(Clone, Debug, PartialEq)]
pub enum CodecError {
    /// A variable's storage (or its time derivative's) is unallocated.
    Unallocated {
        /// Registered name of the variable.
        name: String,
    },
    /// A flat buffer has the wrong length for the layout.
    LengthMismatch {
        /// Length required by the layout.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },
    /// Two variables were registered under the same name.
    DuplicateVariable {
        /// The repeated name.
        name: String,
    },
    /// No variable with this identifier or name is registered.
    UnknownVariable {
        /// The identifier or name looked up.
        key: String,
    },
    /// The variable exists but is a scalar where a vector was asked for,
    /// or the other way round.
    WrongKind {
        /// The variable.
        var: VarId,
        /// What the caller asked for.
        expected: &'static str,
    },
    /// The registry has no variables.
    EmptyRegistry,
    /// The layout was compiled against another mesh.
    MeshMismatch,
    /// Field storage or arithmetic failed.
    Field(FieldError),
    /// Interpolation or basis conversion failed.
    Mesh(MeshError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unallocated { name } => write!(f, "variable '{name}' is unallocated"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "state vector length {actual}, layout needs {expected}")
            }
            Self::DuplicateVariable { name } => {
                write!(f, "variable '{name}' registered twice")
            }
            Self::UnknownVariable { key } => write!(f, "unknown variable: {key}"),
            Self::WrongKind { var, expected } => {
                write!(f, "variable {var} is not a {expected}")
            }
            Self::EmptyRegistry => write!(f, "no variables registered"),
            Self::MeshMismatch => write!(f, "layout was built for a different mesh"),
            Self::Field(e) => write!(f, "field error: {e}"),
            Self::Mesh(e) => write!(f, "mesh error: {e}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(e) => Some(e),
            Self::Mesh(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for CodecError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<MeshError> for CodecError {
    fn from(e: MeshError) -> Self {
        Self::Mesh(e)
    }
}
