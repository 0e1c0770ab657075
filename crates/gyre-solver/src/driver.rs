//! The time integration driver.
//!
//! [`Driver`] owns the state vector, the codec, the operator library, the
//! model and an [`Integrator`]. Its lifecycle is `new`, then `init`
//! (collective: every rank must call it in lockstep), then `run`, then
//! teardown (explicitly or on drop).
//!
//! During `run` the integrator borrows the driver's core as an
//! [`OdeSystem`]. Every residual call unpacks the trial state, clears the
//! derivative storage, runs the model and packs the derivatives; crossing
//! an output time bumps the iteration count and calls the monitor.

use crate::clock::OutputClock;
use crate::config::{BandWidths, SolverConfig};
use crate::error::SolverError;
use crate::integrator::{Integrator, IntegratorSettings, OdeSystem, StepPlan};
use crate::jacobian::{self, JacobianSetup, JacobianStrategy, SparseMatrix, SparsityPattern};
use crate::metrics::RhsMetrics;
use crate::model::{Model, Monitor, MonitorAction, RhsContext, RhsFault};
use crate::structure;
use gyre_codec::{CodecError, StateArena, StateCodec};
use gyre_ops::Derivs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What one [`Driver::run`] call achieved.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunOutcome {
    /// Committed integrator steps.
    pub steps: u64,
    /// Simulation time reached.
    pub time: f64,
    /// Output times reached since init.
    pub iteration: u64,
    /// Whether the monitor stopped the run early.
    pub stopped: bool,
}

// ── Core ───────────────────────────────────────────────────────────

/// The part of the driver the integrator calls back into.
struct Core<M: Model> {
    codec: StateCodec,
    arena: StateArena,
    ops: Derivs,
    model: M,
    clock: OutputClock,
    monitor: Option<Monitor>,
    metrics: RhsMetrics,
    nout: u64,
    stop: bool,
    groups: Option<Arc<Vec<Vec<usize>>>>,
}

impl<M: Model> Core<M> {
    /// LOAD, clear derivatives, model, SAVE_DERIVS. No clock bookkeeping.
    fn evaluate(&mut self, t: f64, u: &[f64], du: &mut [f64]) -> Result<(), RhsFault> {
        self.codec.load(&mut self.arena, u)?;
        self.arena.release_ddts();
        let mut ctx = RhsContext::new(&mut self.arena, self.codec.registry(), &self.ops);
        self.model.rhs(t, &mut ctx)?;
        self.codec.save_derivs(&mut self.arena, du)?;
        Ok(())
    }

    fn output_reached(&mut self) {
        let simtime = self.clock.simtime();
        let iteration = self.clock.iteration();
        info!(
            simtime,
            iteration,
            rhs_calls = self.metrics.interval_calls,
            rhs_us = self.metrics.interval_us,
            "output time reached"
        );
        if let Some(monitor) = self.monitor.as_mut() {
            if monitor(simtime, iteration, self.nout) == MonitorAction::Stop {
                info!(simtime, iteration, "monitor requested stop");
                self.stop = true;
            }
        }
        self.metrics.end_interval();
    }
}

impl<M: Model> OdeSystem for Core<M> {
    fn len(&self) -> usize {
        self.codec.local_len()
    }

    fn rhs(&mut self, t: f64, u: &[f64], du: &mut [f64]) -> Result<(), RhsFault> {
        let start = Instant::now();
        let result = self.evaluate(t, u, du);
        self.metrics.record_call(start.elapsed());
        if let Err(e) = &result {
            self.metrics.faults += 1;
            debug!(t, error = %e, "residual fault");
            return result;
        }
        if self.clock.observe(t) {
            self.output_reached();
        }
        Ok(())
    }

    fn pre_step(&mut self, t: f64, dt: f64) -> StepPlan {
        self.clock.pre_step(t, dt)
    }

    fn jacobian(&mut self, t: f64, u: &[f64], jac: &mut SparseMatrix) -> Result<(), RhsFault> {
        let groups = match &self.groups {
            Some(g) => Arc::clone(g),
            None => Arc::new(jacobian::Coloring::greedy(jac.pattern()).groups()),
        };
        let mut f0 = vec![0.0; u.len()];
        self.evaluate(t, u, &mut f0)?;
        let mut probe_u = u.to_vec();
        let mut residual = |v: &[f64], f: &mut [f64]| {
            self.metrics.jacobian_calls += 1;
            self.evaluate(t, v, f)
        };
        jac.clear();
        jacobian::probe(&mut residual, &mut probe_u, &f0, &groups, jac)
    }

    fn stop_requested(&self) -> bool {
        self.stop
    }
}

// ── Driver ─────────────────────────────────────────────────────────

/// Owns the state vector and drives an [`Integrator`] over a [`Model`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use gyre_codec::{RegistryBuilder, StateCodec};
/// use gyre_core::CellLoc;
/// use gyre_mesh::{Mesh, StructuredMesh};
/// use gyre_ops::{DerivConfig, Derivs};
/// use gyre_solver::{Driver, RhsContext, RhsFault, SolverConfig, SspRk3};
///
/// let mesh: Arc<dyn Mesh> = Arc::new(
///     StructuredMesh::builder().interior(4, 4).planes(2).build().unwrap(),
/// );
/// let registry = RegistryBuilder::new()
///     .scalar_3d("n", CellLoc::Centre)
///     .build()
///     .unwrap();
/// let codec = StateCodec::new(registry, Arc::clone(&mesh));
/// let ops = Derivs::new(Arc::clone(&mesh), &DerivConfig::default()).unwrap();
///
/// // dn/dt = -n
/// let model = |_t: f64, ctx: &mut RhsContext<'_>| -> Result<(), RhsFault> {
///     let n = ctx.id("n")?;
///     let ddt = ctx.var(n)?.scale(-1.0)?;
///     ctx.set_ddt(n, ddt)
/// };
/// let config = SolverConfig {
///     nout: 4,
///     output_interval: 0.25,
///     initial_step: Some(0.01),
///     ..SolverConfig::default()
/// };
/// let mut driver = Driver::new(codec, ops, model, Box::new(SspRk3::new()), config).unwrap();
///
/// let n = driver.codec().registry().id_of("n").unwrap();
/// driver.arena_mut().var_mut(n).unwrap().fill(1.0);
/// driver.init().unwrap();
/// let outcome = driver.run().unwrap();
/// assert_eq!(outcome.iteration, 4);
/// assert_eq!(outcome.time, 1.0);
/// let n_end = driver.arena().var(n).unwrap().get(2, 2, 0).unwrap();
/// assert!((n_end - (-1.0f64).exp()).abs() < 1e-6);
/// ```
pub struct Driver<M: Model> {
    core: Core<M>,
    integrator: Box<dyn Integrator>,
    config: SolverConfig,
    state: Vec<f64>,
    setup: Option<JacobianSetup>,
    time: f64,
    global_len: u64,
    initialised: bool,
}

impl<M: Model> Driver<M> {
    /// Assemble a driver. `codec` and `ops` must share one mesh.
    pub fn new(
        codec: StateCodec,
        ops: Derivs,
        model: M,
        integrator: Box<dyn Integrator>,
        config: SolverConfig,
    ) -> Result<Self, SolverError> {
        config.validate()?;
        if codec.mesh().instance_id() != ops.mesh().instance_id() {
            return Err(CodecError::MeshMismatch.into());
        }
        let arena = codec.arena();
        let clock = OutputClock::new(config.start_time, config.output_interval);
        Ok(Self {
            core: Core {
                codec,
                arena,
                ops,
                model,
                clock,
                monitor: None,
                metrics: RhsMetrics::default(),
                nout: config.nout,
                stop: false,
                groups: None,
            },
            integrator,
            time: config.start_time,
            config,
            state: Vec::new(),
            setup: None,
            global_len: 0,
            initialised: false,
        })
    }

    /// The state codec.
    pub fn codec(&self) -> &StateCodec {
        &self.core.codec
    }

    /// Variable storage. Holds the latest unpacked state.
    pub fn arena(&self) -> &StateArena {
        &self.core.arena
    }

    /// Mutable variable storage, for setting the initial state.
    pub fn arena_mut(&mut self) -> &mut StateArena {
        &mut self.core.arena
    }

    /// Install the output monitor, called as `(simtime, iteration, nout)`.
    pub fn set_monitor(
        &mut self,
        monitor: impl FnMut(f64, u64, u64) -> MonitorAction + Send + 'static,
    ) {
        self.core.monitor = Some(Box::new(monitor));
    }

    /// Residual counters.
    pub fn metrics(&self) -> &RhsMetrics {
        &self.core.metrics
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Output times reached so far.
    pub fn iteration(&self) -> u64 {
        self.core.clock.iteration()
    }

    /// This rank's partition of the state vector. Empty before init.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Summed state length over all ranks. Zero before init.
    pub fn global_len(&self) -> u64 {
        self.global_len
    }

    /// The Jacobian structure established by init.
    pub fn jacobian_setup(&self) -> Option<&JacobianSetup> {
        self.setup.as_ref()
    }

    /// Whether init has completed and teardown has not run.
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Size the state vector, pack the initial state, establish the
    /// Jacobian structure and configure the integrator. Collective.
    pub fn init(&mut self) -> Result<(), SolverError> {
        if self.initialised {
            return Err(SolverError::AlreadyInitialised);
        }
        let local_len = self.core.codec.local_len();
        let global_len = self
            .core
            .codec
            .mesh()
            .comm()
            .all_reduce_sum(local_len as u64)
            .map_err(SolverError::ReductionFailed)?;
        info!(local_len, global_len, "state vector sized");

        let mut state = vec![0.0; local_len];
        self.core.codec.save(&mut self.core.arena, &mut state)?;

        let setup = self.establish_jacobian(&state)?;
        info!(
            strategy = ?setup.strategy,
            nnz = setup.pattern.nnz(),
            colors = setup.coloring.ncolors(),
            "jacobian structure ready"
        );
        if let Some(path) = &self.config.jacobian.write_path {
            let comm = self.core.codec.mesh().comm();
            let path = structure::rank_path(path, comm.rank(), comm.size());
            structure::save(&path, &setup, self.core.codec.layout())?;
        }

        let settings = self.settings(global_len);
        self.integrator.configure(&settings)?;
        self.integrator.set_jacobian(setup.clone());
        info!(
            integrator = self.integrator.name(),
            initial_step = settings.initial_step,
            max_steps = settings.max_steps,
            "integrator configured"
        );

        self.core.groups = Some(Arc::new(setup.coloring.groups()));
        self.core.clock = OutputClock::new(self.time, self.config.output_interval);
        self.setup = Some(setup);
        self.state = state;
        self.global_len = global_len;
        self.initialised = true;
        Ok(())
    }

    /// Integrate through `nout` output intervals from the current time.
    ///
    /// The final state is left unpacked in [`arena`](Self::arena).
    pub fn run(&mut self) -> Result<RunOutcome, SolverError> {
        if !self.initialised {
            return Err(SolverError::NotInitialised);
        }
        let t0 = self.time;
        let t_final = OutputClock::nth_output(t0, self.config.output_interval, self.config.nout);
        self.core.clock.restart(t0);
        self.core.stop = false;
        info!(t0, t_final, nout = self.config.nout, "run starting");

        let report = match self
            .integrator
            .advance(&mut self.core, &mut self.state, t0, t_final)
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "integrator failed");
                return Err(e.into());
            }
        };
        self.time = report.time;
        self.core.codec.load(&mut self.core.arena, &self.state)?;

        let outcome = RunOutcome {
            steps: report.steps,
            time: report.time,
            iteration: self.core.clock.iteration(),
            stopped: report.stopped,
        };
        info!(
            steps = outcome.steps,
            time = outcome.time,
            iteration = outcome.iteration,
            stopped = outcome.stopped,
            rhs_calls = self.core.metrics.total_calls,
            "run complete"
        );
        Ok(outcome)
    }

    /// Evaluate the Jacobian at the current time and state.
    pub fn evaluate_jacobian(&mut self) -> Result<SparseMatrix, SolverError> {
        let setup = self.setup.as_ref().ok_or(SolverError::NotInitialised)?;
        let mut jac = setup.matrix();
        self.core.jacobian(self.time, &self.state, &mut jac)?;
        Ok(jac)
    }

    /// Release the state vector, the Jacobian structure and the
    /// integrator's buffers. A no-op unless init completed.
    pub fn teardown(&mut self) {
        if !self.initialised {
            return;
        }
        self.state = Vec::new();
        self.setup = None;
        self.core.groups = None;
        self.integrator.release();
        self.initialised = false;
        debug!("driver torn down");
    }

    fn establish_jacobian(&mut self, state: &[f64]) -> Result<JacobianSetup, SolverError> {
        let codec = &self.core.codec;
        if let Some(path) = &self.config.jacobian.load_path {
            let comm = codec.mesh().comm();
            let path = structure::rank_path(path, comm.rank(), comm.size());
            debug!(path = %path.display(), "loading jacobian structure");
            Ok(structure::load(&path, codec.layout())?)
        } else if self.config.jacobian.slow_probe {
            self.probe_structure(state)
        } else {
            let (mxg, myg) = codec.mesh().guards();
            Ok(JacobianSetup::colored(
                SparsityPattern::stencil(codec.layout(), mxg.max(myg)),
                JacobianStrategy::Stencil,
            ))
        }
    }

    /// Dense finite differences at the initial state; every nonzero (and
    /// the diagonal) becomes part of the structure.
    fn probe_structure(&mut self, state: &[f64]) -> Result<JacobianSetup, SolverError> {
        let n = state.len();
        debug!(n, "probing dense jacobian");
        let mut dense = SparseMatrix::zeros(Arc::new(SparsityPattern::dense(n)));
        let mut f0 = vec![0.0; n];
        let t = self.time;
        self.core.evaluate(t, state, &mut f0)?;
        let mut u = state.to_vec();
        let core = &mut self.core;
        let mut residual = |v: &[f64], f: &mut [f64]| {
            core.metrics.jacobian_calls += 1;
            core.evaluate(t, v, f)
        };
        let groups = jacobian::singleton_groups(n);
        jacobian::probe(&mut residual, &mut u, &f0, &groups, &mut dense)?;
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .filter(|&j| i == j || dense.get(i, j) != 0.0)
                    .collect()
            })
            .collect();
        Ok(JacobianSetup::colored(
            SparsityPattern::from_rows(n, rows),
            JacobianStrategy::SlowProbe,
        ))
    }

    fn settings(&self, global_len: u64) -> IntegratorSettings {
        let c = &self.config;
        let mesh = self.core.codec.mesh();
        IntegratorSettings {
            atol: c.atol,
            rtol: c.rtol,
            initial_step: c.resolved_initial_step(),
            max_step: c.max_step,
            max_steps: c.total_steps(),
            family: c.family,
            precon: c.precon.clone(),
            bands: c.bands.unwrap_or_else(|| {
                BandWidths::for_block(self.core.codec.layout().n3d(), mesh.interior_nx())
            }),
            local_len: self.core.codec.local_len(),
            global_len,
        }
    }
}

impl<M: Model> Drop for Driver<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rk3::SspRk3;
    use gyre_codec::RegistryBuilder;
    use gyre_core::CellLoc;
    use gyre_mesh::{Mesh, StructuredMesh};
    use gyre_ops::DerivConfig;

    type Rhs = fn(f64, &mut RhsContext<'_>) -> Result<(), RhsFault>;

    fn decay(_t: f64, ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
        let n = ctx.id("n")?;
        let ddt = ctx.var(n)?.scale(-1.0)?;
        ctx.set_ddt(n, ddt)
    }

    fn driver(model: Rhs, config: SolverConfig) -> Driver<Rhs> {
        let mesh: Arc<dyn Mesh> = Arc::new(
            StructuredMesh::builder()
                .interior(3, 3)
                .planes(2)
                .guards(2, 2)
                .build()
                .unwrap(),
        );
        let reg = RegistryBuilder::new()
            .scalar_3d("n", CellLoc::Centre)
            .build()
            .unwrap();
        let codec = StateCodec::new(reg, Arc::clone(&mesh));
        let ops = Derivs::new(mesh, &DerivConfig::default()).unwrap();
        Driver::new(codec, ops, model, Box::new(SspRk3::new()), config).unwrap()
    }

    fn fill(d: &mut Driver<Rhs>, v: f64) {
        let n = d.codec().registry().id_of("n").unwrap();
        d.arena_mut().var_mut(n).unwrap().fill(v);
    }

    #[test]
    fn run_before_init_is_rejected() {
        let mut d = driver(decay, SolverConfig::default());
        assert!(matches!(d.run(), Err(SolverError::NotInitialised)));
    }

    #[test]
    fn unset_initial_state_is_a_codec_error() {
        let mut d = driver(decay, SolverConfig::default());
        let err = d.init().unwrap_err();
        assert!(matches!(
            err,
            SolverError::Codec(CodecError::Unallocated { ref name }) if name == "n"
        ));
        assert!(!d.is_initialised());
    }

    #[test]
    fn init_twice_is_rejected() {
        let mut d = driver(decay, SolverConfig::default());
        fill(&mut d, 1.0);
        d.init().unwrap();
        assert!(matches!(d.init(), Err(SolverError::AlreadyInitialised)));
    }

    #[test]
    fn default_structure_comes_from_the_stencil() {
        let mut d = driver(decay, SolverConfig::default());
        fill(&mut d, 1.0);
        d.init().unwrap();
        let setup = d.jacobian_setup().unwrap();
        assert_eq!(setup.strategy, JacobianStrategy::Stencil);
        assert_eq!(setup.pattern.n(), d.codec().local_len());
        assert_eq!(d.state().len(), d.codec().local_len());
    }

    #[test]
    fn slow_probe_finds_a_diagonal_jacobian() {
        let config = SolverConfig {
            jacobian: crate::config::JacobianConfig {
                slow_probe: true,
                ..Default::default()
            },
            ..SolverConfig::default()
        };
        let mut d = driver(decay, config);
        fill(&mut d, 1.0);
        d.init().unwrap();
        let setup = d.jacobian_setup().unwrap();
        assert_eq!(setup.strategy, JacobianStrategy::SlowProbe);
        // Pointwise decay couples each value only to itself.
        assert_eq!(setup.pattern.nnz(), d.codec().local_len());
        assert_eq!(setup.coloring.ncolors(), 1);

        let jac = d.evaluate_jacobian().unwrap();
        for i in 0..jac.pattern().n() {
            assert!((jac.get(i, i) + 1.0).abs() < 1e-6);
        }
        assert!(d.metrics().jacobian_calls > 0);
    }

    #[test]
    fn model_fault_surfaces_as_integrator_error() {
        fn failing(_t: f64, _ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
            Err(RhsFault::failed(2, "diverged"))
        }
        let mut d = driver(failing, SolverConfig::default());
        fill(&mut d, 1.0);
        d.init().unwrap();
        let before = d.state().to_vec();
        let err = d.run().unwrap_err();
        assert!(matches!(
            err,
            SolverError::Integrator(crate::IntegratorError::RhsFault(RhsFault::Failed {
                code: 2,
                ..
            }))
        ));
        assert_eq!(d.state(), &before[..]);
        assert_eq!(d.metrics().faults, 1);
    }

    #[test]
    fn missing_derivative_is_reported() {
        fn silent(_t: f64, _ctx: &mut RhsContext<'_>) -> Result<(), RhsFault> {
            Ok(())
        }
        let mut d = driver(silent, SolverConfig::default());
        fill(&mut d, 1.0);
        d.init().unwrap();
        let err = d.run().unwrap_err();
        assert!(matches!(
            err,
            SolverError::Integrator(crate::IntegratorError::RhsFault(RhsFault::Codec(
                CodecError::Unallocated { .. }
            )))
        ));
    }

    #[test]
    fn teardown_releases_and_is_idempotent() {
        let mut d = driver(decay, SolverConfig::default());
        fill(&mut d, 1.0);
        d.init().unwrap();
        d.teardown();
        assert!(!d.is_initialised());
        assert!(d.state().is_empty());
        assert!(d.jacobian_setup().is_none());
        d.teardown();
        assert!(matches!(d.run(), Err(SolverError::NotInitialised)));
    }
}
