//! Residual-evaluation counters for the time integration driver.
//!
//! [`RhsMetrics`] counts residual calls and their wall time. The
//! per-interval counters are reset each time an output time is reached;
//! the totals run for the lifetime of the driver.

use std::time::Duration;

/// Residual evaluation counters.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RhsMetrics {
    /// Residual calls since the last output time.
    pub interval_calls: u64,
    /// Wall time of those calls, in microseconds.
    pub interval_us: u64,
    /// Residual calls since init.
    pub total_calls: u64,
    /// Wall time of all residual calls, in microseconds.
    pub total_us: u64,
    /// Residual calls made while probing the Jacobian.
    pub jacobian_calls: u64,
    /// Residual calls that returned a fault.
    pub faults: u64,
    /// Output times reached.
    pub outputs: u64,
}

impl RhsMetrics {
    /// Record one residual call.
    pub fn record_call(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.interval_calls += 1;
        self.interval_us = self.interval_us.saturating_add(us);
        self.total_calls += 1;
        self.total_us = self.total_us.saturating_add(us);
    }

    /// Close the current output interval.
    pub fn end_interval(&mut self) {
        self.outputs += 1;
        self.interval_calls = 0;
        self.interval_us = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = RhsMetrics::default();
        assert_eq!(m.interval_calls, 0);
        assert_eq!(m.interval_us, 0);
        assert_eq!(m.total_calls, 0);
        assert_eq!(m.total_us, 0);
        assert_eq!(m.jacobian_calls, 0);
        assert_eq!(m.faults, 0);
        assert_eq!(m.outputs, 0);
    }

    #[test]
    fn interval_counters_reset_totals_persist() {
        let mut m = RhsMetrics::default();
        m.record_call(Duration::from_micros(5));
        m.record_call(Duration::from_micros(7));
        assert_eq!(m.interval_calls, 2);
        assert_eq!(m.interval_us, 12);
        m.end_interval();
        assert_eq!(m.interval_calls, 0);
        assert_eq!(m.interval_us, 0);
        assert_eq!(m.total_calls, 2);
        assert_eq!(m.total_us, 12);
        assert_eq!(m.outputs, 1);
    }
}
