//! The integrator seam.
//!
//! The driver owns an [`Integrator`] and drives it through
//! [`Integrator::advance`], handing it an [`OdeSystem`] that borrows the
//! driver's codec, model and clock for the duration of the call.
//!
//! # Commit protocol
//!
//! An integrator may evaluate the residual at trial states as often as it
//! likes, but it writes the caller's `u` only after a whole step has
//! succeeded. A residual fault therefore leaves `u` at the last committed
//! step.

use crate::config::{BandWidths, MethodFamily, PreconConfig};
use crate::jacobian::{JacobianSetup, SparseMatrix};
use crate::model::RhsFault;
use std::error::Error;
use std::fmt;

/// A step proposal after output clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepPlan {
    /// Step size to take.
    pub dt: f64,
    /// Exact time at the end of the step. Integrators must adopt this
    /// value rather than recomputing `t + dt`.
    pub end: f64,
    /// Whether the step ends on an output time.
    pub output: bool,
}

/// The ODE `du/dt = f(t, u)` as seen by an integrator.
pub trait OdeSystem {
    /// Length of the local state vector.
    fn len(&self) -> usize;

    /// Whether the local state vector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate `du = f(t, u)`.
    fn rhs(&mut self, t: f64, u: &[f64], du: &mut [f64]) -> Result<(), RhsFault>;

    /// Clamp a proposed step from `t` of size `dt` onto the output grid.
    fn pre_step(&mut self, t: f64, dt: f64) -> StepPlan;

    /// Fill `jac` with `df/du` at `(t, u)` on the configured structure.
    fn jacobian(&mut self, t: f64, u: &[f64], jac: &mut SparseMatrix) -> Result<(), RhsFault>;

    /// Whether the output monitor asked to stop.
    fn stop_requested(&self) -> bool {
        false
    }
}

/// Everything the integrator is configured with.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegratorSettings {
    /// Absolute tolerance.
    pub atol: f64,
    /// Relative tolerance.
    pub rtol: f64,
    /// First step size to try.
    pub initial_step: f64,
    /// Largest step allowed, if bounded.
    pub max_step: Option<f64>,
    /// Total internal step budget for one `advance`.
    pub max_steps: u64,
    /// Multistep family.
    pub family: MethodFamily,
    /// Preconditioner settings.
    pub precon: PreconConfig,
    /// Band widths for banded preconditioners.
    pub bands: BandWidths,
    /// Length of this rank's state partition.
    pub local_len: usize,
    /// Summed length over all ranks.
    pub global_len: u64,
}

/// What one [`Integrator::advance`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Committed steps.
    pub steps: u64,
    /// Time of the last committed step.
    pub time: f64,
    /// Whether the monitor cut the run short.
    pub stopped: bool,
}

// ── IntegratorError ────────────────────────────────────────────────

/// Failures inside [`Integrator::advance`].
#[derive(Clone, Debug, PartialEq)]
pub enum IntegratorError {
    /// The residual function faulted; the current step was discarded.
    RhsFault(RhsFault),
    /// The step budget ran out before `t_final`.
    StepLimit {
        /// Configured budget.
        limit: u64,
        /// Time reached.
        time: f64,
    },
    /// `advance` was called before `configure`.
    NotConfigured,
    /// A step size was not finite and positive.
    InvalidStep {
        /// The offending step.
        dt: f64,
    },
    /// The state vector length does not match the settings.
    LengthMismatch {
        /// Configured length.
        expected: usize,
        /// Length passed in.
        actual: usize,
    },
}

impl fmt::Display for IntegratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RhsFault(e) => write!(f, "residual fault: {e}"),
            Self::StepLimit { limit, time } => {
                write!(f, "step budget of {limit} exhausted at t = {time}")
            }
            Self::NotConfigured => write!(f, "integrator used before configure"),
            Self::InvalidStep { dt } => write!(f, "invalid step size {dt}"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "state length {actual}, configured for {expected}")
            }
        }
    }
}

impl Error for IntegratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::RhsFault(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RhsFault> for IntegratorError {
    fn from(e: RhsFault) -> Self {
        Self::RhsFault(e)
    }
}

// ── Integrator ─────────────────────────────────────────────────────

/// A time integrator driven by the solver.
pub trait Integrator: Send {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Accept settings. Called once from driver init.
    fn configure(&mut self, settings: &IntegratorSettings) -> Result<(), IntegratorError>;

    /// Accept the Jacobian structure. Called once from driver init.
    fn set_jacobian(&mut self, setup: JacobianSetup);

    /// Integrate `u` from `t` to `t_final`, honouring `system.pre_step`
    /// before every step and stopping early when
    /// `system.stop_requested()`.
    fn advance(
        &mut self,
        system: &mut dyn OdeSystem,
        u: &mut [f64],
        t: f64,
        t_final: f64,
    ) -> Result<StepReport, IntegratorError>;

    /// Drop all internal buffers.
    fn release(&mut self);
}
