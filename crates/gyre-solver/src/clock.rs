//! Output scheduling.
//!
//! Output times are `T, 2T, ..., NT` for interval `T`. The clock keeps
//! the next one and tells the integrator how to land on it exactly: the
//! pre-step hook clamps a proposed step so its end is `next_time` itself,
//! never a sum that may round past it.

use crate::integrator::StepPlan;

/// Tracks the next output time and the iteration count.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputClock {
    interval: f64,
    next_time: f64,
    iteration: u64,
    outputnext: bool,
    simtime: f64,
}

impl OutputClock {
    /// A clock starting at `t0` with outputs every `interval`.
    pub fn new(t0: f64, interval: f64) -> Self {
        Self {
            interval,
            next_time: t0 + interval,
            iteration: 0,
            outputnext: false,
            simtime: t0,
        }
    }

    /// Restart so the next output is one interval after `t0`.
    pub fn restart(&mut self, t0: f64) {
        self.next_time = t0 + self.interval;
        self.outputnext = false;
        self.simtime = t0;
    }

    /// The next output time.
    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    /// Number of output times reached so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Time of the latest residual evaluation.
    pub fn simtime(&self) -> f64 {
        self.simtime
    }

    /// Whether the current step was clamped onto an output time.
    pub fn output_pending(&self) -> bool {
        self.outputnext
    }

    /// Output time number `n` counted from `t0`, accumulated the same way
    /// the clock advances.
    pub fn nth_output(t0: f64, interval: f64, n: u64) -> f64 {
        let mut t = t0;
        for _ in 0..n {
            t += interval;
        }
        t
    }

    /// Clamp a proposed step from `t` of size `dt`.
    pub fn pre_step(&mut self, t: f64, dt: f64) -> StepPlan {
        if t + dt >= self.next_time {
            self.outputnext = true;
            StepPlan {
                dt: self.next_time - t,
                end: self.next_time,
                output: true,
            }
        } else {
            self.outputnext = false;
            StepPlan {
                dt,
                end: t + dt,
                output: false,
            }
        }
    }

    /// Record a residual evaluation at `t`. Returns `true` when `t` has
    /// reached the pending output time, after advancing to the next one.
    pub fn observe(&mut self, t: f64) -> bool {
        self.simtime = t;
        if t >= self.next_time {
            self.iteration += 1;
            self.next_time += self.interval;
            self.outputnext = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_step_lands_exactly_on_output() {
        let mut c = OutputClock::new(0.0, 0.1);
        let p = c.pre_step(0.05, 0.07);
        assert!(p.output);
        assert_eq!(p.end, 0.1);
        assert!(c.output_pending());
        let q = c.pre_step(0.0, 0.03);
        assert!(!q.output);
        assert_eq!(q.end, 0.03);
        assert!(!c.output_pending());
    }

    #[test]
    fn observe_advances_by_interval() {
        let mut c = OutputClock::new(0.0, 0.1);
        assert!(!c.observe(0.05));
        assert!(c.observe(0.1));
        assert_eq!(c.iteration(), 1);
        assert_eq!(c.next_time(), 0.1 + 0.1);
        assert!(!c.observe(0.15));
        assert_eq!(c.simtime(), 0.15);
    }

    #[test]
    fn nth_output_matches_clock_sequence() {
        let mut c = OutputClock::new(0.0, 0.1);
        for n in 1..=10 {
            assert_eq!(c.next_time(), OutputClock::nth_output(0.0, 0.1, n));
            let t = c.next_time();
            assert!(c.observe(t));
        }
        assert_eq!(c.iteration(), 10);
    }
}
