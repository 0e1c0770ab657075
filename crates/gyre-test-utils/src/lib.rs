//! Test utilities and mock types for Gyre development.
//!
//! Provides mesh and field fixtures, simple models, a communicator whose
//! reductions fail, and [`IrregularStepper`], a synthetic integrator that
//! takes deliberately uneven steps so output scheduling can be checked
//! for exactness.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod comm;
pub mod fixtures;
pub mod stepper;

pub use comm::FailingComm;
pub use fixtures::{mesh, random_field, DecayModel, FailingModel};
pub use stepper::{IrregularStepper, StepRecord};
