//! Solver configuration, validation, and error types.
//!
//! [`SolverConfig`] is the input to
//! [`Driver::new`](crate::driver::Driver::new). [`validate()`](SolverConfig::validate)
//! checks it before any collective work starts; the resolved values are
//! handed to the integrator as
//! [`IntegratorSettings`](crate::integrator::IntegratorSettings).

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

// ── MethodFamily ───────────────────────────────────────────────────

/// Linear multistep family requested from implicit integrators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MethodFamily {
    /// Backward differentiation formulas, for stiff problems.
    #[default]
    Bdf,
    /// Adams-Moulton, for non-stiff problems.
    AdamsMoulton,
}

// ── PreconConfig ───────────────────────────────────────────────────

/// Preconditioner settings for Krylov-based integrators.
#[derive(Clone, Debug, PartialEq)]
pub struct PreconConfig {
    /// Whether to precondition at all. Default: false.
    pub enabled: bool,
    /// Maximum Krylov subspace dimension. Default: 50.
    pub dimension: usize,
    /// Linear solve tolerance. Default: 1e-4.
    pub tolerance: f64,
}

impl Default for PreconConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dimension: 50,
            tolerance: 1e-4,
        }
    }
}

// ── BandWidths ─────────────────────────────────────────────────────

/// Half-bandwidths for banded difference-quotient preconditioners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BandWidths {
    /// Upper half-bandwidth of the difference quotient.
    pub mudq: usize,
    /// Lower half-bandwidth of the difference quotient.
    pub mldq: usize,
    /// Upper half-bandwidth retained in the preconditioner.
    pub mukeep: usize,
    /// Lower half-bandwidth retained in the preconditioner.
    pub mlkeep: usize,
}

impl BandWidths {
    /// One x column of coupled values either side: `n3d * (interior_nx + 2)`
    /// for the difference quotient, nothing retained.
    pub fn for_block(n3d: usize, interior_nx: usize) -> Self {
        let w = n3d * (interior_nx + 2);
        Self {
            mudq: w,
            mldq: w,
            mukeep: 0,
            mlkeep: 0,
        }
    }
}

// ── JacobianConfig ─────────────────────────────────────────────────

/// How the Jacobian structure is established at init.
///
/// Strategies are tried in priority order: `load_path`, then
/// `slow_probe`, then the stencil-derived default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JacobianConfig {
    /// Read a cached structure from this file. Default: none.
    pub load_path: Option<PathBuf>,
    /// Derive the structure from a dense finite-difference probe.
    /// Default: false.
    pub slow_probe: bool,
    /// Write the established structure to this file. Default: none.
    pub write_path: Option<PathBuf>,
}

// ── SolverConfig ───────────────────────────────────────────────────

/// Everything the driver needs beyond the model and the mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    /// Number of output times. Default: 1.
    pub nout: u64,
    /// Time between outputs. Default: 1.0.
    pub output_interval: f64,
    /// Simulation start time. Default: 0.0.
    pub start_time: f64,
    /// Absolute tolerance. Default: 1e-12.
    pub atol: f64,
    /// Relative tolerance. Default: 1e-5.
    pub rtol: f64,
    /// First step to try. `None` = the output interval.
    pub initial_step: Option<f64>,
    /// Largest allowed step. Default: unbounded.
    pub max_step: Option<f64>,
    /// Internal step budget per output. Default: 500.
    pub mxstep: u64,
    /// Multistep family. Default: BDF.
    pub family: MethodFamily,
    /// Preconditioner settings.
    pub precon: PreconConfig,
    /// Band widths. `None` = [`BandWidths::for_block`] of the local block.
    pub bands: Option<BandWidths>,
    /// Jacobian structure strategy.
    pub jacobian: JacobianConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            nout: 1,
            output_interval: 1.0,
            start_time: 0.0,
            atol: 1e-12,
            rtol: 1e-5,
            initial_step: None,
            max_step: None,
            mxstep: 500,
            family: MethodFamily::Bdf,
            precon: PreconConfig::default(),
            bands: None,
            jacobian: JacobianConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nout == 0 {
            return Err(ConfigError::NoOutputs);
        }
        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NotPositive { name, value })
            }
        };
        positive("output_interval", self.output_interval)?;
        positive("atol", self.atol)?;
        positive("rtol", self.rtol)?;
        if let Some(dt) = self.initial_step {
            positive("initial_step", dt)?;
        }
        if let Some(dt) = self.max_step {
            positive("max_step", dt)?;
        }
        if !self.start_time.is_finite() {
            return Err(ConfigError::NotFinite {
                name: "start_time",
                value: self.start_time,
            });
        }
        if self.mxstep == 0 {
            return Err(ConfigError::ZeroStepBudget);
        }
        if self.precon.enabled {
            if self.precon.dimension == 0 {
                return Err(ConfigError::InvalidPrecon {
                    reason: "dimension must be at least 1".into(),
                });
            }
            positive("precon.tolerance", self.precon.tolerance)?;
        }
        Ok(())
    }

    /// Total internal step budget: `mxstep * nout`, saturating.
    pub fn total_steps(&self) -> u64 {
        self.mxstep.saturating_mul(self.nout)
    }

    /// First step to try.
    pub fn resolved_initial_step(&self) -> f64 {
        self.initial_step.unwrap_or(self.output_interval)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SolverConfig::validate()`].
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `nout` is zero.
    NoOutputs,
    /// A quantity that must be finite and positive is not.
    NotPositive {
        /// Configuration field.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// A quantity that must be finite is not.
    NotFinite {
        /// Configuration field.
        name: &'static str,
        /// The invalid value.
        value: f64,
    },
    /// `mxstep` is zero.
    ZeroStepBudget,
    /// Preconditioner settings are inconsistent.
    InvalidPrecon {
        /// Description of which invariant was violated.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOutputs => write!(f, "nout must be at least 1"),
            Self::NotPositive { name, value } => {
                write!(f, "{name} must be finite and positive, got {value}")
            }
            Self::NotFinite { name, value } => write!(f, "{name} must be finite, got {value}"),
            Self::ZeroStepBudget => write!(f, "mxstep must be at least 1"),
            Self::InvalidPrecon { reason } => write!(f, "invalid preconditioner: {reason}"),
        }
    }
}

impl Error for ConfigError {}
