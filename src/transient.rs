//! Transient driver.
//!
//! [`Transient`] owns the loader, the nonlinear solver and the integration
//! context and runs the step loop:
//!
//! ```text
//! initialize ──> step ──> step ──> ... ──> final time
//!                 │
//!                 ├─ predict, Newton solve, error estimate
//!                 ├─ reject: shrink step, retry
//!                 └─ accept: rotate history, choose next step/order
//! ```
//!
//! Landing on a breakpoint restarts integration at order 1 before the next
//! step is attempted.

use std::mem;

use log::{debug, error, info};

use crate::control::{BreakpointSchedule, StepControl};
use crate::error::{Result, TiaError};
use crate::integrator::{BlockVectorMut, Gear12, IntegrationContext, IntegrationMethod, NoTimeIntegration};
use crate::loader::{check_loader_sizes, Loader, StateLoad};
use crate::params::TiaParams;
use crate::solver::{DenseMatrix, NewtonRaphson, NonlinearSolver, NonlinearSystem};
use crate::solver::{DEFAULT_ABS_TOLERANCE, DEFAULT_MAX_ITERATIONS, DEFAULT_REL_TOLERANCE};
use crate::store::{HistoryKind, Partition, StoreSnapshot};

/// Configuration of a transient run.
#[derive(Debug, Clone)]
pub struct TransientConfig {
    /// Integration parameters
    pub params: TiaParams,
    /// Maximum Newton-Raphson iterations per attempt
    pub max_iterations: usize,
    /// Absolute Newton update tolerance
    pub abs_tolerance: f64,
    /// Relative Newton update tolerance
    pub rel_tolerance: f64,
    /// Ownership ranges of the unknowns. `None` means a single rank.
    pub partition: Option<Partition>,
}

impl TransientConfig {
    /// Create a configuration with default Newton settings.
    pub fn new(params: TiaParams) -> Self {
        Self {
            params,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            partition: None,
        }
    }

    /// Set the maximum Newton-Raphson iterations.
    ///
    /// Fewer iterations make Newton failures (and step cuts) more likely on
    /// strongly nonlinear problems.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the Newton update tolerances.
    pub fn with_newton_tolerances(mut self, abs_tolerance: f64, rel_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self.rel_tolerance = rel_tolerance;
        self
    }

    /// Distribute the unknowns over `partition`.
    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }
}

/// How the solution at the initial time is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialCondition {
    /// Solve `F(x) = 0` at the initial time.
    OperatingPoint,
    /// Start from the given solution.
    Given(Vec<f64>),
}

/// Summary of one accepted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Time reached
    pub time: f64,
    /// Step taken
    pub step: f64,
    /// Order used
    pub order: usize,
    /// Attempts needed, including the accepted one
    pub attempts: usize,
    /// Newton iterations over all attempts
    pub newton_iterations: usize,
    /// Error estimate of the accepted attempt
    pub est_over_tol: f64,
    /// The step ended on a breakpoint
    pub hit_breakpoint: bool,
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStatistics {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    /// Rejections with a converged Newton solve
    pub error_test_failures: usize,
    pub newton_failures: usize,
    /// Newton iterations over all attempts
    pub newton_iterations: usize,
    /// Restarts after landing on a breakpoint
    pub breakpoint_restarts: usize,
}

/// Saved run state for [`Transient::rollback`].
///
/// Loader-internal state is not part of the checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    store: StoreSnapshot,
    control: StepControl,
    breakpoints: BreakpointSchedule,
    statistics: StepStatistics,
    restart_pending: bool,
}

/// The nonlinear system of one attempt: loader evaluation followed by the
/// method's residual and Jacobian assembly.
struct StepSystem<'a, L: Loader> {
    loader: &'a mut L,
    ctx: &'a mut IntegrationContext,
    method: &'a dyn IntegrationMethod,
    time: f64,
}

impl<L: Loader> NonlinearSystem for StepSystem<'_, L> {
    fn dimension(&self) -> usize {
        self.ctx.store.solution_size()
    }

    fn evaluate(&mut self, x: &[f64], rhs: &mut [f64], jacobian: &mut DenseMatrix) -> Result<()> {
        self.ctx.store.load.clear();
        self.loader.load(self.time, x, &mut self.ctx.store.load)?;
        self.method.obtain_residual(self.ctx);
        self.method.obtain_jacobian(self.ctx)?;
        rhs.copy_from_slice(&self.ctx.store.residual);
        jacobian.a.copy_from_slice(&self.ctx.store.jacobian.a);
        Ok(())
    }

    fn limiting_active(&self) -> bool {
        self.ctx.store.load.limiting
    }
}

/// Variable-step Gear12 transient integration of a [`Loader`].
pub struct Transient<L: Loader, S: NonlinearSolver = NewtonRaphson> {
    loader: L,
    solver: S,
    method: Gear12,
    ctx: IntegrationContext,
    statistics: StepStatistics,
    restart_pending: bool,
    initialized: bool,
}

impl<L: Loader> Transient<L> {
    /// Create a driver with default Newton settings.
    pub fn new(loader: L, params: TiaParams) -> Result<Self> {
        Self::with_config(loader, TransientConfig::new(params))
    }

    /// Create a driver from a full configuration.
    pub fn with_config(loader: L, config: TransientConfig) -> Result<Self> {
        let solver = NewtonRaphson::new()
            .with_max_iterations(config.max_iterations)
            .with_tolerances(config.abs_tolerance, config.rel_tolerance);
        let partition = config
            .partition
            .unwrap_or_else(|| Partition::single(loader.solution_size()));
        Self::with_solver(loader, &config.params, partition, solver)
    }
}

impl<L: Loader, S: NonlinearSolver> Transient<L, S> {
    /// Create a driver with a custom nonlinear solver.
    pub fn with_solver(loader: L, params: &TiaParams, partition: Partition, solver: S) -> Result<Self> {
        let ctx = IntegrationContext::new(
            params,
            loader.solution_size(),
            loader.state_size(),
            loader.store_size(),
            partition,
        )?;
        check_loader_sizes(&loader, &ctx.store.load)?;
        Ok(Self {
            loader,
            solver,
            method: Gear12,
            ctx,
            statistics: StepStatistics::default(),
            restart_pending: false,
            initialized: false,
        })
    }

    /// Compute the initial point and start the first integration interval.
    pub fn initialize(&mut self, initial: InitialCondition) -> Result<()> {
        let t0 = self.ctx.control.initial_time;
        let tf = self.ctx.control.final_time;
        let n = self.ctx.store.solution_size();

        let x0 = match initial {
            InitialCondition::Given(x) => {
                TiaError::check_len("initial solution", n, x.len())?;
                x
            }
            InitialCondition::OperatingPoint => {
                let mut x = vec![0.0; n];
                let outcome = {
                    let mut system = StepSystem {
                        loader: &mut self.loader,
                        ctx: &mut self.ctx,
                        method: &NoTimeIntegration,
                        time: t0,
                    };
                    self.solver.solve(&mut system, &mut x)?
                };
                if !outcome.converged {
                    error!(
                        "operating point failed after {} iterations (|dx| = {:.3e})",
                        outcome.iterations, outcome.update_norm
                    );
                    return Err(TiaError::convergence_failure(
                        outcome.iterations,
                        outcome.update_norm,
                    ));
                }
                info!("operating point converged in {} iterations", outcome.iterations);
                x
            }
        };

        let store = &mut self.ctx.store;
        store.load.clear();
        self.loader.load(t0, &x0, &mut store.load)?;
        self.loader.load_state(
            t0,
            &x0,
            StateLoad {
                state: &mut store.next_state,
                store: &mut store.next_store,
                lead_q: &mut store.next_lead_q,
            },
        )?;
        store.curr_solution.copy_from_slice(&x0);
        store.curr_state.copy_from_slice(&store.next_state);
        store.curr_store.copy_from_slice(&store.next_store);
        store.curr_lead_q.copy_from_slice(&store.next_lead_q);
        store.set_device_mask(self.loader.device_mask())?;

        let points = self
            .loader
            .breakpoints(t0, tf)
            .into_iter()
            .filter(|&t| t > t0 && t < tf);
        self.ctx.breakpoints.extend(points, t0)?;

        self.method.initialize(&mut self.ctx)?;
        self.loader.accept_step(t0, &x0);
        self.statistics = StepStatistics::default();
        self.restart_pending = false;
        self.initialized = true;
        info!(
            "transient [{:.6e}, {:.6e}] with {} unknowns, {} breakpoints",
            t0,
            tf,
            n,
            self.ctx.breakpoints.len()
        );
        Ok(())
    }

    /// Schedule an additional stop time.
    pub fn add_breakpoint(&mut self, time: f64) -> Result<()> {
        self.ctx.breakpoints.add(time, self.ctx.control.current_time)?;
        if self.initialized {
            self.ctx.control.refresh_stop_time(&self.ctx.breakpoints);
        }
        Ok(())
    }

    /// Advance by one accepted step, retrying rejected attempts.
    pub fn step(&mut self) -> Result<StepReport> {
        if !self.initialized {
            return Err(TiaError::invalid_state("step() called before initialize()"));
        }
        if self.ctx.control.is_finished() {
            return Err(TiaError::invalid_state("final time already reached"));
        }
        if self.restart_pending {
            self.restart_at_breakpoint()?;
        }

        let mut attempts = 0;
        let mut newton_iterations = 0;
        loop {
            attempts += 1;
            let passed = self.attempt()?;
            newton_iterations += self.ctx.control.newton_iterations;
            if passed {
                return self.accept(attempts, newton_iterations);
            }

            self.statistics.rejected_steps += 1;
            if self.ctx.control.newton_converged {
                self.statistics.error_test_failures += 1;
            } else {
                self.statistics.newton_failures += 1;
            }
            if let Err(e) = self.method.reject_step(&mut self.ctx) {
                error!("step rejected fatally at t={:.6e}: {}", self.ctx.control.current_time, e);
                return Err(e);
            }
        }
    }

    /// One attempt at the proposed step. Returns true if it passes.
    fn attempt(&mut self) -> Result<bool> {
        let weight_mode = self.ctx.control.params().weight_mode;
        self.ctx.store.set_error_weights(weight_mode);
        self.method.update_coefficients(&mut self.ctx);
        self.method.obtain_predictor(&mut self.ctx);

        let time = self.ctx.control.next_time;
        let mut x = mem::take(&mut self.ctx.store.next_solution);
        let outcome = {
            let mut system = StepSystem {
                loader: &mut self.loader,
                ctx: &mut self.ctx,
                method: &self.method,
                time,
            };
            self.solver.solve(&mut system, &mut x)
        };
        self.ctx.store.next_solution = x;
        let outcome = outcome?;

        self.ctx.control.newton_converged = outcome.converged;
        self.ctx.control.newton_iterations = outcome.iterations;
        self.statistics.newton_iterations += outcome.iterations;

        if outcome.converged {
            let store = &mut self.ctx.store;
            store.load.clear();
            self.loader.load(time, &store.next_solution, &mut store.load)?;
            self.loader.load_state(
                time,
                &store.next_solution,
                StateLoad {
                    state: &mut store.next_state,
                    store: &mut store.next_store,
                    lead_q: &mut store.next_lead_q,
                },
            )?;
            self.method.update_state_deriv(&mut self.ctx);
            self.method.update_lead_current(&mut self.ctx);
            self.method.estimate_error(&mut self.ctx);
        } else {
            debug!(
                "Newton failed at t={:.6e} after {} iterations",
                time, outcome.iterations
            );
        }

        let error_tested = self.ctx.control.error_test_enabled();
        Ok(self.ctx.control.attempt_passes(error_tested))
    }

    fn accept(&mut self, attempts: usize, newton_iterations: usize) -> Result<StepReport> {
        let step = self.ctx.control.current_step;
        let order = self.ctx.control.current_order;
        let est_over_tol = self.ctx.control.est_over_tol;

        self.method.complete_step(&mut self.ctx)?;
        let time = self.ctx.control.current_time;
        self.loader.accept_step(time, &self.ctx.store.curr_solution);
        self.statistics.accepted_steps += 1;

        let hit_breakpoint = self.ctx.control.at_stop_time();
        if hit_breakpoint && !self.ctx.control.is_finished() {
            self.restart_pending = true;
        }
        if self.ctx.control.is_finished() {
            info!(
                "transient finished at t={:.6e}: {} accepted, {} rejected, {} Newton iterations",
                time,
                self.statistics.accepted_steps,
                self.statistics.rejected_steps,
                self.statistics.newton_iterations
            );
        }

        Ok(StepReport {
            time,
            step,
            order,
            attempts,
            newton_iterations,
            est_over_tol,
            hit_breakpoint,
        })
    }

    /// Start a new integration interval from the breakpoint just reached.
    fn restart_at_breakpoint(&mut self) -> Result<()> {
        let t = self.ctx.control.current_time;
        self.ctx.breakpoints.prune(t);
        self.ctx.control.begin_interval();
        self.method.initialize(&mut self.ctx)?;
        self.restart_pending = false;
        self.statistics.breakpoint_restarts += 1;
        info!("restart at breakpoint t={:.6e}", t);
        Ok(())
    }

    /// Integrate to the final time.
    ///
    /// `sink` receives the initial solution and then either the solution at
    /// every time in `output_times` (interpolated inside accepted steps) or,
    /// when no output times are given or interpolation is disabled, the
    /// solution at every accepted step.
    pub fn run<F>(&mut self, output_times: &[f64], mut sink: F) -> Result<StepStatistics>
    where
        F: FnMut(f64, &[f64]) -> Result<()>,
    {
        if !self.initialized {
            return Err(TiaError::invalid_state("run() called before initialize()"));
        }
        let tol = self.ctx.control.time_tolerance();
        let start = self.ctx.control.current_time;
        let end = self.ctx.control.final_time;
        sink(start, &self.ctx.store.curr_solution)?;

        let interpolate = self.ctx.control.params().interpolate_output && !output_times.is_empty();
        let mut times: Vec<f64> = output_times
            .iter()
            .copied()
            .filter(|&t| t > start + tol && t <= end + tol)
            .collect();
        times.sort_by(f64::total_cmp);
        let mut pending = times.into_iter().peekable();
        let mut out = vec![0.0; self.ctx.store.solution_size()];

        while !self.ctx.control.is_finished() {
            let report = self.step()?;
            if !interpolate {
                sink(report.time, &self.ctx.store.curr_solution)?;
                continue;
            }
            while let Some(&t) = pending.peek() {
                if t > report.time + tol {
                    break;
                }
                self.method.interpolate_solution(&self.ctx, t, &mut out)?;
                sink(t, &out)?;
                pending.next();
            }
        }
        Ok(self.statistics)
    }

    /// Solution at `time` inside the last accepted step.
    pub fn interpolate(&self, time: f64, out: &mut [f64]) -> Result<()> {
        self.method.interpolate_solution(&self.ctx, time, out)
    }

    /// Any history vector at `time` inside the last accepted step.
    pub fn interpolate_history(&self, kind: HistoryKind, time: f64, out: &mut [f64]) -> Result<()> {
        self.method.interpolate_history(&self.ctx, kind, time, out)
    }

    /// Interpolate block `i` of `out` at `times[i]`.
    pub fn interpolate_blocks(&self, times: &[f64], out: &mut BlockVectorMut<'_>) -> Result<()> {
        self.method.interpolate_blocks(&self.ctx, times, out)
    }

    /// Save the run state.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            store: self.ctx.store.snapshot(),
            control: self.ctx.control.clone(),
            breakpoints: self.ctx.breakpoints.clone(),
            statistics: self.statistics,
            restart_pending: self.restart_pending,
        }
    }

    /// Return to a saved run state.
    pub fn rollback(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.ctx.store.restore(&checkpoint.store)?;
        self.ctx.control.clone_from(&checkpoint.control);
        self.ctx.breakpoints.clone_from(&checkpoint.breakpoints);
        self.statistics = checkpoint.statistics;
        self.restart_pending = checkpoint.restart_pending;
        debug!("rolled back to t={:.6e}", self.ctx.control.current_time);
        Ok(())
    }

    /// Time of the last accepted step.
    pub fn time(&self) -> f64 {
        self.ctx.control.current_time
    }

    /// True once the final time has been reached.
    pub fn is_finished(&self) -> bool {
        self.ctx.control.is_finished()
    }

    /// Last accepted solution.
    pub fn solution(&self) -> &[f64] {
        &self.ctx.store.curr_solution
    }

    /// Last accepted device state.
    pub fn state(&self) -> &[f64] {
        &self.ctx.store.curr_state
    }

    /// Last accepted store vector, lead currents included.
    pub fn store_values(&self) -> &[f64] {
        &self.ctx.store.curr_store
    }

    pub fn statistics(&self) -> StepStatistics {
        self.statistics
    }

    /// Step and order bookkeeping.
    pub fn control(&self) -> &StepControl {
        &self.ctx.control
    }

    /// Read-only view of the integration context.
    pub fn context(&self) -> &IntegrationContext {
        &self.ctx
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DaeLoad;
    use approx::assert_relative_eq;

    /// `dx/dt = -k x`
    struct Decay {
        k: f64,
    }

    impl Loader for Decay {
        fn solution_size(&self) -> usize {
            1
        }

        fn load(&mut self, _time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()> {
            out.q[0] = x[0];
            out.f[0] = self.k * x[0];
            out.dq_dx.set(0, 0, 1.0);
            out.df_dx.set(0, 0, self.k);
            Ok(())
        }
    }

    /// Independent decays `dx_i/dt = -k_i x_i`.
    struct Decays {
        k: Vec<f64>,
    }

    impl Loader for Decays {
        fn solution_size(&self) -> usize {
            self.k.len()
        }

        fn load(&mut self, _time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()> {
            for (i, &k) in self.k.iter().enumerate() {
                out.q[i] = x[i];
                out.f[i] = k * x[i];
                out.dq_dx.set(i, i, 1.0);
                out.df_dx.set(i, i, k);
            }
            Ok(())
        }
    }

    /// `dx/dt = 1 - x` with `x(0) = 1` solved from the operating point.
    struct Relax;

    impl Loader for Relax {
        fn solution_size(&self) -> usize {
            1
        }

        fn load(&mut self, _time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()> {
            out.q[0] = x[0];
            out.f[0] = x[0] - 1.0;
            out.dq_dx.set(0, 0, 1.0);
            out.df_dx.set(0, 0, 1.0);
            Ok(())
        }

        fn breakpoints(&self, _t0: f64, _tf: f64) -> Vec<f64> {
            vec![0.3, 0.6]
        }
    }

    #[test]
    fn test_step_before_initialize_fails() {
        let mut tr = Transient::new(Decay { k: 1.0 }, TiaParams::new(0.0, 1.0)).unwrap();
        assert!(matches!(tr.step(), Err(TiaError::InvalidState { .. })));
    }

    #[test]
    fn test_given_initial_condition_size() {
        let mut tr = Transient::new(Decay { k: 1.0 }, TiaParams::new(0.0, 1.0)).unwrap();
        assert!(matches!(
            tr.initialize(InitialCondition::Given(vec![1.0, 2.0])),
            Err(TiaError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_operating_point_and_breakpoints() {
        let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
        let mut tr = Transient::new(Relax, params).unwrap();
        tr.initialize(InitialCondition::OperatingPoint).unwrap();
        assert_relative_eq!(tr.solution()[0], 1.0, epsilon = 1e-12);

        let mut hits = Vec::new();
        while !tr.is_finished() {
            let report = tr.step().unwrap();
            assert!(report.time <= 1.0 + tr.control().time_tolerance());
            if report.hit_breakpoint {
                hits.push(report.time);
            }
        }
        assert_eq!(hits, vec![0.3, 0.6, 1.0]);
        assert_eq!(tr.statistics().breakpoint_restarts, 2);
        // Steady state stays put.
        assert_relative_eq!(tr.solution()[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_added_breakpoint_is_hit() {
        let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
        let mut tr = Transient::new(Decay { k: 1.0 }, params).unwrap();
        tr.initialize(InitialCondition::Given(vec![1.0])).unwrap();
        tr.step().unwrap();
        tr.add_breakpoint(0.123).unwrap();
        assert!(matches!(
            tr.add_breakpoint(0.0),
            Err(TiaError::BreakpointInPast { .. })
        ));
        let mut hit = false;
        while !tr.is_finished() {
            let report = tr.step().unwrap();
            hit |= report.hit_breakpoint && (report.time - 0.123).abs() < 1e-15;
        }
        assert!(hit);
        assert_relative_eq!(tr.solution()[0], (-1.0f64).exp(), max_relative = 5e-2);
    }

    #[test]
    fn test_run_emits_requested_times() {
        let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
        let mut tr = Transient::new(Decay { k: 2.0 }, params).unwrap();
        tr.initialize(InitialCondition::Given(vec![1.0])).unwrap();
        let mut seen = Vec::new();
        let wanted = [0.75, 0.25, 0.5, 1.0];
        tr.run(&wanted, |t, x| {
            seen.push((t, x[0]));
            Ok(())
        })
        .unwrap();
        let times: Vec<f64> = seen.iter().map(|&(t, _)| t).collect();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        for &(t, x) in &seen {
            assert_relative_eq!(x, (-2.0 * t).exp(), max_relative = 5e-2);
        }
    }

    #[test]
    fn test_checkpoint_rollback_replays_identically() {
        let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
        let mut tr = Transient::new(Decay { k: 3.0 }, params).unwrap();
        tr.initialize(InitialCondition::Given(vec![1.0])).unwrap();
        for _ in 0..5 {
            tr.step().unwrap();
        }
        let cp = tr.checkpoint();
        let first: Vec<StepReport> = (0..4).map(|_| tr.step().unwrap()).collect();
        let after = tr.solution().to_vec();
        tr.rollback(&cp).unwrap();
        assert_eq!(tr.checkpoint(), cp);
        let second: Vec<StepReport> = (0..4).map(|_| tr.step().unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(tr.solution(), after.as_slice());
    }

    #[test]
    fn test_partitioned_run_matches_single_rank() {
        let run = |partition: Option<Partition>| {
            let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
            let mut config = TransientConfig::new(params);
            if let Some(p) = partition {
                config = config.with_partition(p);
            }
            let loader = Decays { k: vec![1.0, 2.0, 3.0] };
            let mut tr = Transient::with_config(loader, config).unwrap();
            tr.initialize(InitialCondition::Given(vec![1.0, 1.0, 1.0])).unwrap();
            let mut reports = Vec::new();
            while !tr.is_finished() {
                reports.push(tr.step().unwrap());
            }
            (reports, tr.solution().to_vec())
        };

        let (single, x_single) = run(None);
        let (split, x_split) = run(Some(Partition::contiguous(3, 2).unwrap()));
        assert_eq!(single.len(), split.len());
        for (a, b) in single.iter().zip(&split) {
            assert_relative_eq!(a.time, b.time, max_relative = 1e-12);
            assert_eq!(a.order, b.order);
            assert_eq!(a.attempts, b.attempts);
        }
        for (a, b) in x_single.iter().zip(&x_split) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        assert_relative_eq!(x_single[2], (-3.0f64).exp(), max_relative = 5e-2);
    }

    #[test]
    fn test_partition_size_must_match() {
        let config = TransientConfig::new(TiaParams::new(0.0, 1.0))
            .with_partition(Partition::single(2));
        assert!(matches!(
            Transient::with_config(Decays { k: vec![1.0, 2.0, 3.0] }, config),
            Err(TiaError::SizeMismatch { .. })
        ));
    }
}
