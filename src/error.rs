//! Error types for the time integrator.
//!
//! This module provides a unified error type [`TiaError`] for every fatal
//! condition the integrator can hit: caller precondition violations,
//! exhausted step retries and failures reported by the loader or the
//! linear algebra.
//!
//! Recoverable failures (a rejected local error test, a Newton solve that
//! did not converge) are handled inside the step loop and never surface here.

use thiserror::Error;

/// Result type alias using [`TiaError`].
pub type Result<T> = std::result::Result<T, TiaError>;

/// Unified error type for all integrator operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TiaError {
    // ============ Configuration / Precondition Errors ============
    /// A vector or matrix does not have the declared problem size
    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A breakpoint was scheduled before the current simulation time
    #[error("Breakpoint at t={breakpoint:.6e} is earlier than current time t={current_time:.6e}")]
    BreakpointInPast { breakpoint: f64, current_time: f64 },

    /// Invalid integration parameter
    #[error("Invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// Operation called in the wrong phase of a run
    #[error("Invalid integrator state: {message}")]
    InvalidState { message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ============ Numerical Errors ============
    /// Matrix is singular and cannot be factored
    #[error("Singular matrix - Jacobian cannot be factored")]
    SingularMatrix,

    /// Newton-Raphson iteration did not converge (fatal only outside the step loop)
    #[error("Newton-Raphson did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    /// Too many consecutive step failures
    #[error(
        "Time step failed {failures} consecutive times at t={time:.6e} \
         (step {step:.3e}, order {order}, last Newton iterations {iterations})"
    )]
    StepFailuresExhausted {
        failures: usize,
        time: f64,
        step: f64,
        order: usize,
        iterations: usize,
    },

    /// Step size fell below the minimum allowed step
    #[error("Time step too small at t={time:.6e}: {step:.3e} < minimum {min_step:.3e}")]
    StepTooSmall { time: f64, step: f64, min_step: f64 },

    /// Interpolation requested outside the last accepted step
    #[error("Cannot interpolate at t={time:.6e}: outside [{lower:.6e}, {upper:.6e}]")]
    InterpolationOutOfRange { time: f64, lower: f64, upper: f64 },

    /// More block time points than blocks in the target vector
    #[error("Requested {requested} block time points but the vector has only {available} blocks")]
    TooManyBlocks { requested: usize, available: usize },

    // ============ Collaborator Errors ============
    /// Error reported by the equation loader
    #[error("Loader error: {message}")]
    Loader { message: String },

    /// Error writing output
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl TiaError {
    /// Create a size mismatch error
    pub fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a loader error
    pub fn loader(message: impl Into<String>) -> Self {
        Self::Loader {
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }

    /// Check a length against the declared size.
    pub fn check_len(what: &str, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Self::size_mismatch(what, expected, actual));
        }
        Ok(())
    }
}

impl From<std::io::Error> for TiaError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}
