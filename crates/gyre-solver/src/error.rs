//! Top-level error type for the time integration driver.

use crate::config::ConfigError;
use crate::integrator::IntegratorError;
use crate::model::RhsFault;
use crate::structure::StructureError;
use gyre_codec::CodecError;
use gyre_mesh::CommError;
use gyre_ops::OperatorError;
use std::error::Error;
use std::fmt;

/// Errors from [`Driver`](crate::driver::Driver) lifecycle calls.
#[derive(Debug)]
pub enum SolverError {
    /// The configuration failed validation.
    Config(ConfigError),
    /// The collective size reduction failed; setup is aborted.
    ReductionFailed(CommError),
    /// Packing or unpacking the state failed.
    Codec(CodecError),
    /// Building the operator table failed.
    Operator(OperatorError),
    /// The integrator failed.
    Integrator(IntegratorError),
    /// Reading or writing the Jacobian structure failed.
    Structure(StructureError),
    /// The residual faulted outside the integrator (Jacobian probing at init).
    Rhs(RhsFault),
    /// `run` was called before `init`.
    NotInitialised,
    /// `init` was called twice.
    AlreadyInitialised,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::ReductionFailed(e) => write!(f, "global size reduction failed: {e}"),
            Self::Codec(e) => write!(f, "state codec: {e}"),
            Self::Operator(e) => write!(f, "operators: {e}"),
            Self::Integrator(e) => write!(f, "integrator: {e}"),
            Self::Structure(e) => write!(f, "jacobian structure: {e}"),
            Self::Rhs(e) => write!(f, "residual: {e}"),
            Self::NotInitialised => write!(f, "driver not initialised"),
            Self::AlreadyInitialised => write!(f, "driver already initialised"),
        }
    }
}

impl Error for SolverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::ReductionFailed(e) => Some(e),
            Self::Codec(e) => Some(e),
            Self::Operator(e) => Some(e),
            Self::Integrator(e) => Some(e),
            Self::Structure(e) => Some(e),
            Self::Rhs(e) => Some(e),
            Self::NotInitialised | Self::AlreadyInitialised => None,
        }
    }
}

impl From<ConfigError> for SolverError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CodecError> for SolverError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<OperatorError> for SolverError {
    fn from(e: OperatorError) -> Self {
        Self::Operator(e)
    }
}

impl From<IntegratorError> for SolverError {
    fn from(e: IntegratorError) -> Self {
        Self::Integrator(e)
    }
}

impl From<StructureError> for SolverError {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

impl From<RhsFault> for SolverError {
    fn from(e: RhsFault) -> Self {
        Self::Rhs(e)
    }
}
