//! Step-size and order control.
//!
//! [`StepControl`] is the bookkeeping half of the integrator: times, step
//! sizes, order, the BDF coefficient set and the accept/reject heuristics.
//! It never touches a vector; the integrator feeds it the scalar outcome of
//! each attempt (error estimate, Newton status) and reads back the next
//! step and order.
//!
//! ## Phases
//!
//! ```text
//! Initializing --choose_initial_step--> Normal
//! Normal --reject (order forced down)--> OrderReducedOnFailure
//! OrderReducedOnFailure --complete_step--> Normal
//! any --final time reached or fatal failure--> Terminal
//! ```

mod breakpoints;
mod coefficients;

pub use breakpoints::BreakpointSchedule;
pub use coefficients::Gear12Coefficients;

use log::{debug, info, warn};

use crate::error::{Result, TiaError};
use crate::params::{ErrorAnalysis, TiaParams};
use crate::MACHINE_PRECISION;

/// Where the controller is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// No initial step chosen yet.
    Initializing,
    /// Regular stepping.
    Normal,
    /// A failure forced the minimum order; cleared by the next acceptance.
    OrderReducedOnFailure,
    /// Final time reached or the run failed.
    Terminal,
}

/// Step-size/order state of a transient run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepControl {
    params: TiaParams,
    /// Life-cycle phase
    pub phase: StepPhase,
    /// BDF coefficients of the current attempt
    pub coeffs: Gear12Coefficients,

    // ====== Times ======
    pub initial_time: f64,
    pub final_time: f64,
    /// Time of the last accepted step
    pub current_time: f64,
    /// Target time of the current attempt
    pub next_time: f64,
    /// Time of the accepted step before `current_time`
    pub last_time: f64,
    /// Next breakpoint or the final time
    pub stop_time: f64,

    // ====== Steps ======
    /// Step of the current attempt
    pub current_step: f64,
    /// Last accepted step
    pub last_step: f64,
    /// Step proposed before the last breakpoint clamp
    pub saved_step: f64,
    /// Step of the last accepted attempt
    pub used_step: f64,
    /// Step of the last attempt, accepted or not
    pub last_attempted_step: f64,
    pub min_step: f64,
    /// Maximum step of the current integration interval
    pub max_step: f64,

    // ====== Order ======
    pub current_order: usize,
    pub used_order: usize,

    // ====== Attempt outcome ======
    /// Accepted steps since the last (re)start
    pub number_of_steps: usize,
    /// Consecutive failures
    pub nef: usize,
    /// `ck * ||correction||` of the last attempt
    pub est_over_tol: f64,
    /// Newton iterations of the last attempt
    pub newton_iterations: usize,
    /// Whether Newton converged on the last attempt
    pub newton_converged: bool,
    /// Set when the proposed step was shortened to land on `stop_time`
    pub limited_by_breakpoint: bool,
    /// First step of an integration interval
    pub beginning_integration: bool,

    fixed_step: f64,
    time_tolerance: f64,
}

impl StepControl {
    /// Create a controller for validated `params`.
    pub fn new(params: &TiaParams) -> Result<Self> {
        params.validate()?;
        let t0 = params.initial_time;
        let tf = params.final_time;
        let time_tolerance =
            100.0 * MACHINE_PRECISION * t0.abs().max(tf.abs()).max(tf - t0);
        Ok(Self {
            params: params.clone(),
            phase: StepPhase::Initializing,
            coeffs: Gear12Coefficients::default(),
            initial_time: t0,
            final_time: tf,
            current_time: t0,
            next_time: t0,
            last_time: t0,
            stop_time: tf,
            current_step: params.starting_step,
            last_step: params.starting_step,
            saved_step: params.starting_step,
            used_step: 0.0,
            last_attempted_step: 0.0,
            min_step: params.min_step,
            max_step: params.effective_max_step(),
            current_order: 1,
            used_order: 1,
            number_of_steps: 0,
            nef: 0,
            est_over_tol: 0.0,
            newton_iterations: 0,
            newton_converged: true,
            limited_by_breakpoint: false,
            beginning_integration: true,
            fixed_step: params.starting_step,
            time_tolerance,
        })
    }

    /// Parameters this controller was built from.
    pub fn params(&self) -> &TiaParams {
        &self.params
    }

    /// Two times closer than this are the same time.
    pub fn time_tolerance(&self) -> f64 {
        self.time_tolerance
    }

    /// True once the final time has been reached.
    pub fn is_finished(&self) -> bool {
        self.current_time >= self.final_time - self.time_tolerance
    }

    /// True when the last accepted step landed on `stop_time`.
    pub fn at_stop_time(&self) -> bool {
        (self.stop_time - self.current_time).abs() <= self.time_tolerance
    }

    /// Recompute the stop time from the schedule.
    ///
    /// At the beginning of an integration interval the maximum step is also
    /// limited so that at least `min_steps_per_breakpoint` steps are taken
    /// before the stop time.
    pub fn update_stop_time(&mut self, breakpoints: &BreakpointSchedule) {
        self.stop_time = breakpoints.stop_time(self.current_time, self.final_time);
        if self.beginning_integration {
            let user_max = self.params.effective_max_step();
            self.max_step = match self.params.min_steps_per_breakpoint {
                Some(n) if n > 0 => user_max.min((self.stop_time - self.current_time) / n as f64),
                _ => user_max,
            };
        }
    }

    /// Pick up a changed breakpoint schedule mid-interval.
    ///
    /// A pending attempt that would overshoot the new stop time is shortened.
    pub fn refresh_stop_time(&mut self, breakpoints: &BreakpointSchedule) {
        self.stop_time = breakpoints.stop_time(self.current_time, self.final_time);
        if self.phase != StepPhase::Initializing && self.next_time > self.stop_time {
            let step = self.current_step;
            if self.set_next_step(step) {
                self.saved_step = step;
            }
        }
    }

    /// Choose the first step of an integration interval.
    ///
    /// `dnorm_q` is the weighted norm of the initial charge derivative; zero
    /// means the problem has no dynamics at the start point.
    pub fn choose_initial_step(&mut self, dnorm_q: f64) {
        let time_to_stop = self.stop_time - self.current_time;
        let at_start = self.current_time == self.initial_time;
        self.limited_by_breakpoint = false;

        let h = if self.params.constant_step_size {
            self.params
                .starting_step
                .min(0.1 * time_to_stop)
                .max(self.min_step)
                .min(self.max_step)
        } else {
            let h0_max_factor = self.params.restart_step_scale;
            let mut h = if !at_start {
                0.1 * self.saved_step.min(time_to_stop.abs())
            } else if dnorm_q > 0.0 {
                (h0_max_factor * time_to_stop.abs())
                    .min(2.0f64.sqrt() / (self.params.heuristics.h0_safety * dnorm_q))
            } else {
                h0_max_factor * time_to_stop.abs()
            };
            if at_start {
                h = h.min(self.params.starting_step);
            }
            h.min(self.max_step)
        };

        self.fixed_step = h;
        self.current_step = h;
        self.last_step = h;
        self.next_time = self.current_time + h;
        self.nef = 0;
        self.number_of_steps = 0;
        self.current_order = 1;
        self.used_order = 1;
        self.coeffs.reset(h);
        self.phase = StepPhase::Normal;
        info!(
            "integration interval [{:.6e}, {:.6e}] starts with step {:.3e}",
            self.current_time,
            self.stop_time,
            h
        );
    }

    /// Recompute the coefficients for the current attempt.
    pub fn update_coefficients(&mut self) {
        self.coeffs.update(self.current_step, self.current_order);
    }

    /// Step ratio that would bring the error estimate to the aimed fraction
    /// of the tolerance at `order`.
    pub fn step_ratio(&self, order: usize) -> f64 {
        let h = &self.params.heuristics;
        (h.tol_aim_fac / (self.est_over_tol + h.r_fudge)).powf(1.0 / (order as f64 + 1.0))
    }

    /// True if the last attempt passes the error test.
    ///
    /// With a constant step size only a Newton failure rejects; an error
    /// estimate above the acceptance level is logged and the step kept.
    pub fn attempt_passes(&self, error_tested: bool) -> bool {
        if !self.newton_converged {
            return false;
        }
        if !error_tested || self.params.error_analysis == ErrorAnalysis::NewtonIterations {
            return true;
        }
        let passes = self.est_over_tol <= self.params.err_tol_acceptance;
        if !passes && self.params.constant_step_size {
            warn!(
                "local error test failed with constant step {:.3e} at t={:.6e} (est {:.3e})",
                self.current_step, self.current_time, self.est_over_tol
            );
            return true;
        }
        passes
    }

    /// Whether the local error test applies to the current attempt.
    pub fn error_test_enabled(&self) -> bool {
        self.params.test_first_step || !self.beginning_integration
    }

    fn lowest_usable_order(&self) -> usize {
        // Order 2 needs one accepted step since the last restart.
        if self.number_of_steps == 0 {
            1
        } else {
            self.params.min_order
        }
    }

    /// Rejection branch of the step/order decision.
    ///
    /// The coefficient step history must already have been restored by the
    /// integration method. Fails when the failure budget is exhausted or the step cannot shrink
    /// any further.
    pub fn reject_step(&mut self) -> Result<()> {
        self.limited_by_breakpoint = false;
        self.last_attempted_step = self.current_step;
        self.nef += 1;

        if self.nef >= self.params.max_let_fail {
            self.phase = StepPhase::Terminal;
            return Err(TiaError::StepFailuresExhausted {
                failures: self.nef,
                time: self.current_time,
                step: self.current_step,
                order: self.current_order,
                iterations: self.newton_iterations,
            });
        }

        let heur = &self.params.heuristics;
        let h = self.current_step;
        let mut new_step = if !self.newton_converged {
            self.current_order = self.lowest_usable_order();
            self.phase = StepPhase::OrderReducedOnFailure;
            if self.params.constant_step_size {
                h
            } else {
                h * heur.newton_failure_cut
            }
        } else if self.nef == 1 {
            let rr = self.step_ratio(self.current_order).clamp(heur.r_min, heur.r_max);
            rr * h
        } else {
            self.current_order = self.lowest_usable_order();
            self.phase = StepPhase::OrderReducedOnFailure;
            heur.r_min * h
        };

        if new_step < self.min_step {
            if h <= self.min_step {
                self.phase = StepPhase::Terminal;
                return Err(TiaError::StepTooSmall {
                    time: self.current_time,
                    step: new_step,
                    min_step: self.min_step,
                });
            }
            warn!("step {:.3e} raised to minimum step {:.3e}", new_step, self.min_step);
            new_step = self.min_step;
        }
        if new_step < self.time_tolerance {
            self.phase = StepPhase::Terminal;
            return Err(TiaError::StepTooSmall {
                time: self.current_time,
                step: new_step,
                min_step: self.time_tolerance,
            });
        }
        new_step = new_step.min(self.max_step);
        self.set_next_step(new_step);

        debug!(
            "reject t={:.6e} h={:.3e} -> {:.3e} order={} nef={} est={:.3e} newton={}",
            self.current_time,
            h,
            self.current_step,
            self.current_order,
            self.nef,
            self.est_over_tol,
            self.newton_converged
        );
        Ok(())
    }

    /// Acceptance branch of the step/order decision.
    ///
    /// Advances the time and proposes the next step and order.
    pub fn complete_step(&mut self) {
        self.limited_by_breakpoint = false;
        self.number_of_steps += 1;
        self.nef = 0;
        self.last_time = self.current_time;
        self.current_time = self.next_time;
        self.beginning_integration = false;

        let h = self.current_step;
        self.last_attempted_step = h;
        self.last_step = h;
        self.used_order = self.current_order;
        self.used_step = h;

        let heur = self.params.heuristics.clone();
        let may_raise = self.number_of_steps >= heur.steps_before_order_raise
            && self.params.max_order == 2;
        let mut new_step = h;

        match self.params.error_analysis {
            ErrorAnalysis::NewtonIterations => {
                if may_raise {
                    self.current_order = 2;
                }
                let mut rr = 1.0;
                if self.newton_iterations <= self.params.nl_min {
                    rr = heur.r_hincr;
                }
                if self.newton_iterations > self.params.nl_max {
                    rr = heur.newton_failure_cut;
                }
                new_step = rr * h;
            }
            ErrorAnalysis::LocalTruncation => {
                let mut rr = self.step_ratio(self.current_order);
                if may_raise && self.current_order == 1 {
                    self.current_order = 2;
                    rr = self.step_ratio(2);
                    if rr <= heur.order_raise_threshold {
                        self.current_order = self.params.min_order;
                    }
                }
                if self.newton_iterations <= self.params.nl_min && rr > 1.0 {
                    rr *= heur.few_iterations_bias;
                } else if self.newton_iterations > self.params.nl_max {
                    rr = heur.r_min;
                }
                if rr >= heur.r_hincr_test {
                    new_step = heur.r_hincr * h;
                } else if rr <= 1.0 {
                    new_step = rr.clamp(heur.r_min, heur.r_max) * h;
                }
            }
        }

        if self.params.constant_step_size {
            new_step = self.fixed_step;
        }
        new_step = new_step.max(self.min_step).min(self.max_step);

        if self.stop_time - self.current_time > self.time_tolerance {
            if self.set_next_step(new_step) {
                self.saved_step = new_step;
            }
        } else {
            self.saved_step = new_step;
            self.current_step = new_step;
            self.next_time = self.current_time + new_step;
        }

        self.phase = if self.is_finished() {
            StepPhase::Terminal
        } else {
            StepPhase::Normal
        };

        debug!(
            "accept t={:.6e} h={:.3e} order={} est={:.3e} iters={} -> h={:.3e} order={}",
            self.current_time,
            h,
            self.used_order,
            self.est_over_tol,
            self.newton_iterations,
            self.current_step,
            self.current_order
        );
    }

    /// Restart after landing on a breakpoint.
    ///
    /// The next step is chosen by [`choose_initial_step`](Self::choose_initial_step).
    pub fn begin_interval(&mut self) {
        self.beginning_integration = true;
    }

    /// Propose `step` from the current time, clamped to the stop time.
    /// Returns true if the stop time shortened the step.
    fn set_next_step(&mut self, step: f64) -> bool {
        let mut h = step;
        let mut next = self.current_time + h;
        let mut clamped = false;
        if next >= self.stop_time - self.time_tolerance {
            clamped = next > self.stop_time;
            next = self.stop_time;
            h = self.stop_time - self.current_time;
        }
        self.limited_by_breakpoint = clamped;
        self.current_step = h;
        self.next_time = next;
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StepHeuristics;
    use approx::assert_relative_eq;

    fn started(params: TiaParams) -> StepControl {
        let mut sc = StepControl::new(&params).unwrap();
        sc.update_stop_time(&BreakpointSchedule::new(sc.time_tolerance()));
        sc.choose_initial_step(0.0);
        sc
    }

    #[test]
    fn test_initial_step_bounds() {
        let p = TiaParams::new(0.0, 1.0).with_starting_step(1.0);
        let mut sc = StepControl::new(&p).unwrap();
        sc.min_step = 0.0;
        sc.update_stop_time(&BreakpointSchedule::new(1e-15));
        // No dynamics: restart scale times the interval.
        sc.choose_initial_step(0.0);
        assert_relative_eq!(sc.current_step, 0.005);
        // Fast dynamics: sqrt(2) / (h0_safety * dnorm).
        sc.current_time = 0.0;
        sc.choose_initial_step(1.0e4);
        assert_relative_eq!(sc.current_step, 2.0f64.sqrt() / 2.0e4);
        assert_eq!(sc.current_order, 1);
        assert_eq!(sc.phase, StepPhase::Normal);
    }

    #[test]
    fn test_restart_step_uses_saved_step() {
        let mut sc = started(TiaParams::new(0.0, 1.0));
        sc.current_time = 0.5;
        sc.saved_step = 0.02;
        sc.stop_time = 1.0;
        sc.choose_initial_step(1.0);
        assert_relative_eq!(sc.current_step, 0.002);
    }

    #[test]
    fn test_constant_step_initial() {
        let sc = started(TiaParams::new(0.0, 1.0).with_fixed_step(0.01).with_max_step(0.1));
        assert_eq!(sc.current_step, 0.01);
        assert_eq!(sc.next_time, 0.01);
    }

    #[test]
    fn test_constant_step_initial_clamped_to_max_step() {
        let sc = started(TiaParams::new(0.0, 1.0).with_fixed_step(0.05).with_max_step(0.01));
        assert_eq!(sc.current_step, 0.01);
        assert_eq!(sc.fixed_step, 0.01);
    }

    #[test]
    fn test_constant_step_newton_failure_keeps_step() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_fixed_step(0.01).with_max_step(0.1));
        sc.update_coefficients();
        sc.newton_converged = false;
        sc.reject_step().unwrap();
        assert_eq!(sc.current_step, 0.01);
        assert_eq!(sc.current_order, 1);
        assert_eq!(sc.phase, StepPhase::OrderReducedOnFailure);
    }

    #[test]
    fn test_first_rejection_ratio_is_clamped() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_starting_step(1e-3));
        let h = sc.current_step;
        sc.update_coefficients();
        sc.est_over_tol = 4.0;
        sc.reject_step().unwrap();
        let ratio = sc.current_step / h;
        let heur = StepHeuristics::default();
        assert!(ratio >= heur.r_min && ratio <= heur.r_max);
        assert_relative_eq!(ratio, (0.5f64 / (4.0 + 1e-4)).sqrt().max(0.25));
        assert_eq!(sc.nef, 1);
    }

    #[test]
    fn test_second_rejection_forces_min_order() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_starting_step(1e-3));
        sc.number_of_steps = 3;
        sc.current_order = 2;
        sc.coeffs.psi = [1e-3, 1e-3, 1e-3];
        sc.est_over_tol = 3.0;
        sc.update_coefficients();
        sc.reject_step().unwrap();
        assert_eq!(sc.current_order, 2);
        let h = sc.current_step;
        sc.update_coefficients();
        sc.reject_step().unwrap();
        assert_eq!(sc.current_order, 1);
        assert_relative_eq!(sc.current_step, 0.25 * h);
        assert_eq!(sc.phase, StepPhase::OrderReducedOnFailure);
    }

    #[test]
    fn test_newton_failure_cuts_by_eight() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_starting_step(1e-3));
        let h = sc.current_step;
        sc.update_coefficients();
        sc.newton_converged = false;
        sc.est_over_tol = 1e-9;
        assert!(!sc.attempt_passes(true));
        sc.reject_step().unwrap();
        assert_relative_eq!(sc.current_step, h / 8.0);
    }

    #[test]
    fn test_failures_exhausted() {
        let mut p = TiaParams::new(0.0, 1.0).with_starting_step(1e-3);
        p.max_let_fail = 3;
        let mut sc = started(p);
        sc.newton_converged = false;
        sc.newton_iterations = 12;
        sc.update_coefficients();
        sc.reject_step().unwrap();
        sc.update_coefficients();
        sc.reject_step().unwrap();
        sc.update_coefficients();
        let err = sc.reject_step().unwrap_err();
        assert!(matches!(
            err,
            TiaError::StepFailuresExhausted { failures: 3, iterations: 12, .. }
        ));
        assert_eq!(sc.phase, StepPhase::Terminal);
    }

    #[test]
    fn test_rejection_at_min_step_is_fatal() {
        let p = TiaParams::new(0.0, 1.0)
            .with_starting_step(1e-6)
            .with_min_step(1e-6);
        let mut sc = started(p);
        sc.update_coefficients();
        sc.est_over_tol = 10.0;
        assert!(matches!(sc.reject_step(), Err(TiaError::StepTooSmall { .. })));
    }

    #[test]
    fn test_accept_grows_step_and_raises_order() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_starting_step(1e-4));
        sc.newton_iterations = 5;
        for k in 1..=2 {
            sc.update_coefficients();
            sc.est_over_tol = 1e-6;
            let h = sc.current_step;
            sc.complete_step();
            assert_eq!(sc.number_of_steps, k);
            assert_relative_eq!(sc.current_step, 2.0 * h);
        }
        assert_eq!(sc.current_order, 2);
        assert_eq!(sc.used_order, 1);
    }

    #[test]
    fn test_accept_clamps_to_breakpoint() {
        let mut p = TiaParams::new(0.0, 1.0).with_starting_step(1e-4);
        p.min_steps_per_breakpoint = None;
        let mut sc = started(p);
        let mut bp = BreakpointSchedule::new(sc.time_tolerance());
        bp.add(2.5e-4, 0.0).unwrap();
        sc.update_stop_time(&bp);
        sc.update_coefficients();
        sc.est_over_tol = 1e-8;
        sc.newton_iterations = 5;
        sc.complete_step();
        assert!(sc.limited_by_breakpoint);
        assert_eq!(sc.next_time, 2.5e-4);
        assert_relative_eq!(sc.current_step, 1.5e-4, max_relative = 1e-12);
        assert_relative_eq!(sc.saved_step, 2e-4);
    }

    #[test]
    fn test_newton_iteration_analysis() {
        let p = TiaParams::new(0.0, 1.0)
            .with_starting_step(1e-4)
            .with_error_analysis(ErrorAnalysis::NewtonIterations);
        let mut sc = started(p);
        sc.update_coefficients();
        sc.newton_iterations = 2;
        sc.complete_step();
        assert_relative_eq!(sc.current_step, 2e-4);
        sc.update_coefficients();
        sc.newton_iterations = 20;
        sc.complete_step();
        assert_relative_eq!(sc.current_step, 2e-4 / 8.0);
    }

    #[test]
    fn test_breakpoint_limits_max_step_at_interval_start() {
        let mut sc = StepControl::new(&TiaParams::new(0.0, 1.0)).unwrap();
        let mut bp = BreakpointSchedule::new(sc.time_tolerance());
        bp.add(0.05, 0.0).unwrap();
        sc.update_stop_time(&bp);
        assert_eq!(sc.stop_time, 0.05);
        assert_relative_eq!(sc.max_step, 0.005);
    }

    #[test]
    fn test_constant_step_keeps_failed_error_test() {
        let mut sc = started(TiaParams::new(0.0, 1.0).with_fixed_step(0.01).with_max_step(0.1));
        sc.est_over_tol = 50.0;
        assert!(sc.attempt_passes(true));
        sc.newton_converged = false;
        assert!(!sc.attempt_passes(true));
    }

    #[test]
    fn test_refresh_stop_time_shortens_pending_step() {
        let mut p = TiaParams::new(0.0, 1.0).with_starting_step(1e-2);
        p.min_steps_per_breakpoint = None;
        let mut sc = started(p);
        let h = sc.current_step;
        let mut bp = BreakpointSchedule::new(sc.time_tolerance());
        bp.add(0.25 * h, 0.0).unwrap();
        sc.refresh_stop_time(&bp);
        assert_eq!(sc.stop_time, 0.25 * h);
        assert_eq!(sc.next_time, 0.25 * h);
        assert!(sc.limited_by_breakpoint);
        assert_eq!(sc.saved_step, h);
    }
}
