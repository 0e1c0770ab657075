//! Reference explicit integrator: three-stage strong-stability-preserving
//! Runge-Kutta with a fixed step.

use crate::integrator::{Integrator, IntegratorError, IntegratorSettings, OdeSystem, StepReport};
use crate::jacobian::JacobianSetup;

/// Shu-Osher SSP-RK3.
///
/// The step is `initial_step`, capped by `max_step`. Stages are built in
/// scratch buffers and copied into the caller's state only once the
/// third stage succeeds.
#[derive(Debug, Default)]
pub struct SspRk3 {
    settings: Option<IntegratorSettings>,
    jacobian: Option<JacobianSetup>,
    k: Vec<f64>,
    u1: Vec<f64>,
    u2: Vec<f64>,
}

impl SspRk3 {
    /// An unconfigured integrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// The Jacobian structure passed in at init, if any.
    pub fn jacobian(&self) -> Option<&JacobianSetup> {
        self.jacobian.as_ref()
    }

    fn step(
        &mut self,
        system: &mut dyn OdeSystem,
        u: &[f64],
        t: f64,
        dt: f64,
        end: f64,
    ) -> Result<(), IntegratorError> {
        let Self { k, u1, u2, .. } = self;
        system.rhs(t, u, &mut k[..])?;
        for i in 0..u.len() {
            u1[i] = u[i] + dt * k[i];
        }
        system.rhs(end, &u1[..], &mut k[..])?;
        for i in 0..u.len() {
            u2[i] = 0.75 * u[i] + 0.25 * (u1[i] + dt * k[i]);
        }
        system.rhs(t + 0.5 * dt, &u2[..], &mut k[..])?;
        for i in 0..u.len() {
            // Reuse u1 for the candidate state.
            u1[i] = u[i] / 3.0 + 2.0 / 3.0 * (u2[i] + dt * k[i]);
        }
        Ok(())
    }
}

impl Integrator for SspRk3 {
    fn name(&self) -> &str {
        "ssp-rk3"
    }

    fn configure(&mut self, settings: &IntegratorSettings) -> Result<(), IntegratorError> {
        let dt = step_size(settings);
        if !(dt.is_finite() && dt > 0.0) {
            return Err(IntegratorError::InvalidStep { dt });
        }
        let n = settings.local_len;
        self.k = vec![0.0; n];
        self.u1 = vec![0.0; n];
        self.u2 = vec![0.0; n];
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn set_jacobian(&mut self, setup: JacobianSetup) {
        self.jacobian = Some(setup);
    }

    fn advance(
        &mut self,
        system: &mut dyn OdeSystem,
        u: &mut [f64],
        t: f64,
        t_final: f64,
    ) -> Result<StepReport, IntegratorError> {
        let settings = self.settings.as_ref().ok_or(IntegratorError::NotConfigured)?;
        if u.len() != settings.local_len {
            return Err(IntegratorError::LengthMismatch {
                expected: settings.local_len,
                actual: u.len(),
            });
        }
        let dt = step_size(settings);
        let limit = settings.max_steps;

        let mut report = StepReport {
            steps: 0,
            time: t,
            stopped: false,
        };
        while report.time < t_final {
            if report.steps >= limit {
                return Err(IntegratorError::StepLimit {
                    limit,
                    time: report.time,
                });
            }
            let plan = system.pre_step(report.time, dt);
            if !(plan.dt.is_finite() && plan.dt > 0.0) {
                return Err(IntegratorError::InvalidStep { dt: plan.dt });
            }
            self.step(system, u, report.time, plan.dt, plan.end)?;
            u.copy_from_slice(&self.u1);
            report.time = plan.end;
            report.steps += 1;
            if system.stop_requested() {
                report.stopped = true;
                break;
            }
        }
        Ok(report)
    }

    fn release(&mut self) {
        self.k = Vec::new();
        self.u1 = Vec::new();
        self.u2 = Vec::new();
        self.jacobian = None;
        self.settings = None;
    }
}

fn step_size(settings: &IntegratorSettings) -> f64 {
    settings
        .max_step
        .map_or(settings.initial_step, |m| settings.initial_step.min(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BandWidths, MethodFamily, PreconConfig};
    use crate::integrator::StepPlan;
    use crate::jacobian::SparseMatrix;
    use crate::model::RhsFault;

    fn settings(n: usize, dt: f64) -> IntegratorSettings {
        IntegratorSettings {
            atol: 1e-12,
            rtol: 1e-5,
            initial_step: dt,
            max_step: None,
            max_steps: 10_000,
            family: MethodFamily::Bdf,
            precon: PreconConfig::default(),
            bands: BandWidths::default(),
            local_len: n,
            global_len: n as u64,
        }
    }

    /// du/dt = -u with no output grid.
    struct Decay {
        fail_after: Option<usize>,
        calls: usize,
    }

    impl OdeSystem for Decay {
        fn len(&self) -> usize {
            1
        }
        fn rhs(&mut self, _t: f64, u: &[f64], du: &mut [f64]) -> Result<(), RhsFault> {
            self.calls += 1;
            if self.fail_after.is_some_and(|n| self.calls > n) {
                return Err(RhsFault::failed(7, "boom"));
            }
            du[0] = -u[0];
            Ok(())
        }
        fn pre_step(&mut self, t: f64, dt: f64) -> StepPlan {
            StepPlan {
                dt,
                end: t + dt,
                output: false,
            }
        }
        fn jacobian(&mut self, _t: f64, _u: &[f64], _j: &mut SparseMatrix) -> Result<(), RhsFault> {
            Ok(())
        }
    }

    #[test]
    fn decays_with_third_order_accuracy() {
        let mut rk = SspRk3::new();
        rk.configure(&settings(1, 0.01)).unwrap();
        let mut sys = Decay {
            fail_after: None,
            calls: 0,
        };
        let mut u = [1.0];
        let report = rk.advance(&mut sys, &mut u, 0.0, 1.0 - 1e-9).unwrap();
        assert_eq!(report.steps, 100);
        assert!((u[0] - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn fault_leaves_state_at_last_committed_step() {
        let mut rk = SspRk3::new();
        rk.configure(&settings(1, 0.1)).unwrap();
        // Two whole steps, then a fault in the middle of the third.
        let mut sys = Decay {
            fail_after: Some(7),
            calls: 0,
        };
        let mut u = [1.0];
        let err = rk.advance(&mut sys, &mut u, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, IntegratorError::RhsFault(RhsFault::Failed { code: 7, .. })));

        let mut reference = SspRk3::new();
        reference.configure(&settings(1, 0.1)).unwrap();
        let mut clean = Decay {
            fail_after: None,
            calls: 0,
        };
        let mut v = [1.0];
        reference.advance(&mut clean, &mut v, 0.0, 0.15).unwrap();
        assert_eq!(u, v);
    }

    #[test]
    fn step_budget_is_enforced() {
        let mut rk = SspRk3::new();
        let mut s = settings(1, 0.1);
        s.max_steps = 3;
        rk.configure(&s).unwrap();
        let mut sys = Decay {
            fail_after: None,
            calls: 0,
        };
        let err = rk.advance(&mut sys, &mut [1.0], 0.0, 1.0).unwrap_err();
        assert!(matches!(err, IntegratorError::StepLimit { limit: 3, .. }));
    }

    #[test]
    fn unconfigured_and_bad_step_rejected() {
        let mut rk = SspRk3::new();
        let mut sys = Decay {
            fail_after: None,
            calls: 0,
        };
        assert_eq!(
            rk.advance(&mut sys, &mut [1.0], 0.0, 1.0).unwrap_err(),
            IntegratorError::NotConfigured
        );
        assert!(matches!(
            rk.configure(&settings(1, 0.0)),
            Err(IntegratorError::InvalidStep { .. })
        ));
    }
}
