//! Integration parameters.
//!
//! [`TiaParams`] collects every user-facing knob of a transient run. The
//! empirically tuned step-selection constants live in a separate
//! [`StepHeuristics`] so they can be adjusted without touching tolerances.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TiaError};

/// Default relative error tolerance.
pub const DEFAULT_REL_TOL: f64 = 1.0e-3;

/// Default absolute error tolerance.
pub const DEFAULT_ABS_TOL: f64 = 1.0e-6;

/// Default starting step when none is given.
pub const DEFAULT_STARTING_STEP: f64 = 1.0e-10;

/// Highest order supported by the Gear12 method.
pub const GEAR12_MAX_ORDER: usize = 2;

/// How the error weight vector scales with the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WeightMode {
    /// `w_i = rel_tol_i * |x_i| + abs_tol_i`
    Absolute,
    /// `w_i = rel_tol_i * ||x||_inf + abs_tol_i`
    #[default]
    MaxNorm,
}

/// Which quantity drives the step-size selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorAnalysis {
    /// Local truncation error estimate.
    #[default]
    LocalTruncation,
    /// Newton iteration count only.
    NewtonIterations,
}

/// Tuned constants of the step/order selection heuristics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepHeuristics {
    /// Smallest step ratio after a local error failure.
    pub r_min: f64,
    /// Largest step ratio when shrinking.
    pub r_max: f64,
    /// Ratio above which the step is increased.
    pub r_hincr_test: f64,
    /// Ratio applied when the step is increased.
    pub r_hincr: f64,
    /// Fraction of the tolerance the controller aims for.
    pub tol_aim_fac: f64,
    /// Guard added to the error estimate before dividing.
    pub r_fudge: f64,
    /// The order-2 step ratio must exceed this to keep order 2.
    pub order_raise_threshold: f64,
    /// Accepted steps required before order 2 is tried.
    pub steps_before_order_raise: usize,
    /// Step ratio applied after a Newton failure.
    pub newton_failure_cut: f64,
    /// Multiplier on a growing step ratio when Newton converged quickly.
    pub few_iterations_bias: f64,
    /// Safety factor of the initial step estimate.
    pub h0_safety: f64,
}

impl Default for StepHeuristics {
    fn default() -> Self {
        Self {
            r_min: 0.25,
            r_max: 0.9,
            r_hincr_test: 2.0,
            r_hincr: 2.0,
            tol_aim_fac: 0.5,
            r_fudge: 1.0e-4,
            order_raise_threshold: 1.05,
            steps_before_order_raise: 2,
            newton_failure_cut: 0.125,
            few_iterations_bias: 1.25,
            h0_safety: 2.0,
        }
    }
}

/// Parameters of a transient run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TiaParams {
    /// Start of the integration interval.
    pub initial_time: f64,
    /// End of the integration interval.
    pub final_time: f64,
    /// User starting step (upper bound on the first step).
    pub starting_step: f64,
    /// Maximum step. `None` means `0.1 * (final_time - initial_time)`.
    pub max_step: Option<f64>,
    /// Minimum step.
    pub min_step: f64,
    /// Relative error tolerance.
    pub rel_tol: f64,
    /// Absolute error tolerance.
    pub abs_tol: f64,
    /// Steps are accepted while `estOverTol <= err_tol_acceptance`.
    pub err_tol_acceptance: f64,
    /// Highest BDF order (at most 2).
    pub max_order: usize,
    /// Lowest BDF order (at least 1).
    pub min_order: usize,
    /// Keep the step size fixed.
    pub constant_step_size: bool,
    /// Step selection strategy.
    pub error_analysis: ErrorAnalysis,
    /// Newton iteration count regarded as "fast".
    pub nl_min: usize,
    /// Newton iteration count regarded as "slow".
    pub nl_max: usize,
    /// Error weight scaling.
    pub weight_mode: WeightMode,
    /// Blend the charge correction norm into the error estimate.
    pub use_q_norm: bool,
    /// Consecutive failures before the run is aborted.
    pub max_let_fail: usize,
    /// Fraction of the interval used to cap the initial step.
    pub restart_step_scale: f64,
    /// Error-test the first step of an integration interval.
    pub test_first_step: bool,
    /// Minimum number of steps between two breakpoints.
    pub min_steps_per_breakpoint: Option<usize>,
    /// Interpolate output times instead of reporting accepted steps only.
    pub interpolate_output: bool,
    /// Step selection constants.
    pub heuristics: StepHeuristics,
}

impl Default for TiaParams {
    fn default() -> Self {
        Self {
            initial_time: 0.0,
            final_time: 1.0,
            starting_step: DEFAULT_STARTING_STEP,
            max_step: None,
            min_step: 0.0,
            rel_tol: DEFAULT_REL_TOL,
            abs_tol: DEFAULT_ABS_TOL,
            err_tol_acceptance: 1.0,
            max_order: GEAR12_MAX_ORDER,
            min_order: 1,
            constant_step_size: false,
            error_analysis: ErrorAnalysis::default(),
            nl_min: 3,
            nl_max: 8,
            weight_mode: WeightMode::default(),
            use_q_norm: false,
            max_let_fail: 15,
            restart_step_scale: 0.005,
            test_first_step: false,
            min_steps_per_breakpoint: Some(10),
            interpolate_output: true,
            heuristics: StepHeuristics::default(),
        }
    }
}

impl TiaParams {
    /// Create parameters for the interval `[initial_time, final_time]`.
    pub fn new(initial_time: f64, final_time: f64) -> Self {
        Self {
            initial_time,
            final_time,
            ..Self::default()
        }
    }

    /// Set the relative tolerance.
    pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = rel_tol;
        self
    }

    /// Set the absolute tolerance.
    pub fn with_abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    /// Set the starting step.
    pub fn with_starting_step(mut self, step: f64) -> Self {
        self.starting_step = step;
        self
    }

    /// Set the maximum step.
    pub fn with_max_step(mut self, step: f64) -> Self {
        self.max_step = Some(step);
        self
    }

    /// Set the minimum step.
    pub fn with_min_step(mut self, step: f64) -> Self {
        self.min_step = step;
        self
    }

    /// Set the maximum BDF order (clamped to 2 by validation).
    pub fn with_max_order(mut self, order: usize) -> Self {
        self.max_order = order;
        self
    }

    /// Run with a fixed step `step`.
    ///
    /// The step is still shortened to land on breakpoints.
    pub fn with_fixed_step(mut self, step: f64) -> Self {
        self.constant_step_size = true;
        self.starting_step = step;
        self
    }

    /// Select the error weight mode.
    pub fn with_weight_mode(mut self, mode: WeightMode) -> Self {
        self.weight_mode = mode;
        self
    }

    /// Select the step selection strategy.
    pub fn with_error_analysis(mut self, analysis: ErrorAnalysis) -> Self {
        self.error_analysis = analysis;
        self
    }

    /// Replace the heuristic constants.
    pub fn with_heuristics(mut self, heuristics: StepHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Effective maximum step.
    pub fn effective_max_step(&self) -> f64 {
        self.max_step
            .unwrap_or(0.1 * (self.final_time - self.initial_time))
    }

    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.final_time > self.initial_time) {
            return Err(TiaError::invalid_parameter(
                "final_time",
                format!(
                    "must be greater than initial_time ({} <= {})",
                    self.final_time, self.initial_time
                ),
            ));
        }
        if !(self.rel_tol >= 0.0) || !(self.abs_tol >= 0.0) {
            return Err(TiaError::invalid_parameter(
                "tolerance",
                "tolerances must be non-negative",
            ));
        }
        if self.rel_tol == 0.0 && self.abs_tol == 0.0 {
            return Err(TiaError::invalid_parameter(
                "tolerance",
                "rel_tol and abs_tol cannot both be zero",
            ));
        }
        if self.min_order < 1 || self.max_order > GEAR12_MAX_ORDER || self.min_order > self.max_order {
            return Err(TiaError::invalid_parameter(
                "order",
                format!(
                    "need 1 <= min_order <= max_order <= {}, got {}..{}",
                    GEAR12_MAX_ORDER, self.min_order, self.max_order
                ),
            ));
        }
        if !(self.starting_step > 0.0) {
            return Err(TiaError::invalid_parameter("starting_step", "must be positive"));
        }
        if self.min_step < 0.0 || self.min_step > self.effective_max_step() {
            return Err(TiaError::invalid_parameter(
                "min_step",
                "must be non-negative and not larger than max_step",
            ));
        }
        if self.max_let_fail == 0 {
            return Err(TiaError::invalid_parameter("max_let_fail", "must be at least 1"));
        }
        let h = &self.heuristics;
        if !(h.r_min > 0.0 && h.r_min <= h.r_max && h.r_max < 1.0) {
            return Err(TiaError::invalid_parameter(
                "heuristics.r_min/r_max",
                "need 0 < r_min <= r_max < 1",
            ));
        }
        if !(h.newton_failure_cut > 0.0 && h.newton_failure_cut < 1.0) {
            return Err(TiaError::invalid_parameter(
                "heuristics.newton_failure_cut",
                "must lie in (0, 1)",
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
impl TiaParams {
    /// Parse parameters from YAML. Missing fields take their defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(text).map_err(|e| TiaError::Config {
            message: e.to_string(),
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Read parameters from a YAML file.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TiaError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_yaml(&text)
    }
}
