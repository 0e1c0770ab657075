//! A synthetic integrator with deliberately irregular steps.

use gyre_solver::{
    Integrator, IntegratorError, IntegratorSettings, JacobianSetup, OdeSystem, StepReport,
};
use std::sync::{Arc, Mutex};

/// One committed step, as seen by [`IrregularStepper`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepRecord {
    /// Start of the step.
    pub start: f64,
    /// End of the step, as returned by the pre-step hook.
    pub end: f64,
    /// Whether the hook flagged the step as landing on an output.
    pub output: bool,
}

/// Cycles through a fixed list of step sizes, evaluating the residual at
/// each step's end and committing a forward update.
///
/// Every committed step is appended to a shared log so tests can inspect
/// it after the stepper has been boxed into a driver.
pub struct IrregularStepper {
    steps: Vec<f64>,
    log: Arc<Mutex<Vec<StepRecord>>>,
    max_steps: Option<u64>,
    scratch: Vec<f64>,
    jacobian: Option<JacobianSetup>,
}

impl IrregularStepper {
    /// A stepper that cycles through `steps`.
    pub fn new(steps: Vec<f64>) -> Self {
        Self {
            steps,
            log: Arc::new(Mutex::new(Vec::new())),
            max_steps: None,
            scratch: Vec::new(),
            jacobian: None,
        }
    }

    /// Handle to the step log.
    pub fn log(&self) -> Arc<Mutex<Vec<StepRecord>>> {
        Arc::clone(&self.log)
    }

    /// The structure received at init, if any.
    pub fn jacobian(&self) -> Option<&JacobianSetup> {
        self.jacobian.as_ref()
    }
}

impl Integrator for IrregularStepper {
    fn name(&self) -> &str {
        "irregular"
    }

    fn configure(&mut self, settings: &IntegratorSettings) -> Result<(), IntegratorError> {
        if let Some(&bad) = self.steps.iter().find(|d| !(d.is_finite() && **d > 0.0)) {
            return Err(IntegratorError::InvalidStep { dt: bad });
        }
        if self.steps.is_empty() {
            return Err(IntegratorError::InvalidStep { dt: 0.0 });
        }
        self.max_steps = Some(settings.max_steps);
        self.scratch = vec![0.0; settings.local_len];
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
        let limit = self.max_steps.ok_or(IntegratorError::NotConfigured)?;
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
            let proposal = self.steps[report.steps as usize % self.steps.len()];
            let plan = system.pre_step(report.time, proposal);
            system.rhs(plan.end, u, &mut self.scratch)?;
            for (ui, di) in u.iter_mut().zip(&self.scratch) {
                *ui += plan.dt * di;
            }
            if let Ok(mut log) = self.log.lock() {
                log.push(StepRecord {
                    start: report.time,
                    end: plan.end,
                    output: plan.output,
                });
            }
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
        self.scratch = Vec::new();
        self.jacobian = None;
        self.max_steps = None;
    }
}
