//! Time integration driver for Gyre.
//!
//! The [`Driver`] binds a [`Model`] (the physics right-hand side), a
//! [`StateCodec`](gyre_codec::StateCodec) and an operator library to an
//! [`Integrator`]. It sizes and packs the state vector, establishes the
//! Jacobian structure (cached file, dense probe or stencil coloring),
//! schedules output times so steps land on them exactly, and reports
//! residual faults without committing partial steps.
//!
//! [`SspRk3`] is a reference explicit integrator; implicit integrators
//! plug in through the same trait and receive tolerances, step budget,
//! preconditioner settings and band widths in [`IntegratorSettings`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod integrator;
pub mod jacobian;
pub mod metrics;
pub mod model;
pub mod rk3;
pub mod structure;

pub use clock::OutputClock;
pub use config::{
    BandWidths, ConfigError, JacobianConfig, MethodFamily, PreconConfig, SolverConfig,
};
pub use driver::{Driver, RunOutcome};
pub use error::SolverError;
pub use integrator::{
    Integrator, IntegratorError, IntegratorSettings, OdeSystem, StepPlan, StepReport,
};
pub use jacobian::{Coloring, JacobianSetup, JacobianStrategy, SparseMatrix, SparsityPattern};
pub use metrics::RhsMetrics;
pub use model::{Model, Monitor, MonitorAction, RhsContext, RhsFault};
pub use rk3::SspRk3;
pub use structure::StructureError;
