//! Error types for field storage and arithmetic.

use std::error::Error;
use std::fmt;

/// Errors from field construction, access, and arithmetic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    /// The field's backing storage has not been allocated.
    Unallocated,
    /// Two fields, or a field and a buffer, disagree on shape.
    ShapeMismatch {
        /// Expected `(nx, ny, nz)`.
        expected: (usize, usize, usize),
        /// Actual `(nx, ny, nz)`.
        actual: (usize, usize, usize),
    },
    /// A value buffer has the wrong number of elements.
    LengthMismatch {
        /// Required element count.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },
    /// Vector components disagree in dimensionality.
    MixedDims,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unallocated => write!(f, "field storage is not allocated"),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected:?}, got {actual:?}")
            }
            Self::LengthMismatch { expected, actual } => {
                write!(f, "buffer length {actual} does not match field size {expected}")
            }
            Self::MixedDims => write!(f, "vector components must share dimensionality"),
        }
    }
}

impl Error for FieldError {}
