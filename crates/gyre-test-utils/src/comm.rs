//! Mock communicators.

use gyre_mesh::{CommError, Communicator, XHalo};

/// A single-rank communicator whose collective operations always fail.
///
/// Useful for checking that setup aborts cleanly when the global size
/// reduction cannot complete.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingComm;

impl Communicator for FailingComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _local: u64) -> Result<u64, CommError> {
        Err(CommError::Disconnected { peer: 0 })
    }

    fn exchange_x(&self, _to_lower: Vec<f64>, _to_upper: Vec<f64>) -> Result<XHalo, CommError> {
        Err(CommError::Disconnected { peer: 0 })
    }
}
