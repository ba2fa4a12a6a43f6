//! Forced local-error rejections.

use approx::assert_relative_eq;
use tia_core::solver::{NewtonOutcome, NewtonRaphson, NonlinearSolver, NonlinearSystem};
use tia_core::store::Partition;
use tia_core::{
    DaeLoad, InitialCondition, Loader, Result, StepHeuristics, TiaError, TiaParams, Transient,
};

/// `dx/dt = -x`
struct Decay;

impl Loader for Decay {
    fn solution_size(&self) -> usize {
        1
    }

    fn load(&mut self, _time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()> {
        out.q[0] = x[0];
        out.f[0] = x[0];
        out.dq_dx.set(0, 0, 1.0);
        out.df_dx.set(0, 0, 1.0);
        Ok(())
    }
}

/// Newton solver that corrupts the converged solution on selected calls,
/// producing a correction far outside the tolerance.
struct Perturbing {
    inner: NewtonRaphson,
    calls: usize,
    corrupt: std::ops::RangeInclusive<usize>,
}

impl NonlinearSolver for Perturbing {
    fn solve(&mut self, system: &mut dyn NonlinearSystem, x: &mut [f64]) -> Result<NewtonOutcome> {
        let outcome = self.inner.solve(system, x)?;
        self.calls += 1;
        if self.corrupt.contains(&self.calls) {
            x[0] += 1.0;
        }
        Ok(outcome)
    }
}

fn transient(corrupt: std::ops::RangeInclusive<usize>, params: TiaParams) -> Transient<Decay, Perturbing> {
    let solver = Perturbing {
        inner: NewtonRaphson::new(),
        calls: 0,
        corrupt,
    };
    let mut tr = Transient::with_solver(Decay, &params, Partition::single(1), solver).unwrap();
    tr.initialize(InitialCondition::Given(vec![1.0])).unwrap();
    tr
}

#[test]
fn test_two_rejections_then_acceptance() {
    let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
    let heur = StepHeuristics::default();
    // Steps 1-5 take one solve each; the 6th step's first two attempts are corrupted.
    let mut tr = transient(6..=7, params);
    for _ in 0..5 {
        assert_eq!(tr.step().unwrap().attempts, 1);
    }
    let proposed = tr.control().current_step;
    let report = tr.step().unwrap();

    assert_eq!(report.attempts, 3);
    let stats = tr.statistics();
    assert_eq!(stats.rejected_steps, 2);
    assert_eq!(stats.error_test_failures, 2);
    assert_eq!(stats.newton_failures, 0);

    let ratio = report.step / proposed;
    assert!(ratio < 1.0);
    assert!(ratio >= heur.r_min * heur.r_min && ratio <= heur.r_max * heur.r_max);
    // A huge error clamps both cuts to r_min.
    assert_relative_eq!(ratio, heur.r_min * heur.r_min, max_relative = 1e-12);
    assert_eq!(report.order, 1);
    assert!(report.est_over_tol <= 1.0);
    assert_eq!(tr.control().nef, 0);
}

#[test]
fn test_exhausted_failures_are_fatal() {
    let mut params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
    params.max_let_fail = 4;
    let mut tr = transient(3..=usize::MAX, params);
    tr.step().unwrap();
    tr.step().unwrap();
    let err = tr.step().unwrap_err();
    assert!(matches!(err, TiaError::StepFailuresExhausted { failures: 4, .. }));
}

#[test]
fn test_first_step_is_not_error_tested() {
    let params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
    let mut tr = transient(1..=1, params);
    let report = tr.step().unwrap();
    assert_eq!(report.attempts, 1);
    assert!(report.est_over_tol > 1.0);

    let mut params = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
    params.test_first_step = true;
    let mut tr = transient(1..=1, params);
    assert_eq!(tr.step().unwrap().attempts, 2);
}
