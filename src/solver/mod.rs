//! Nonlinear and linear solvers used inside each time step.
//!
//! The integrator only needs two things from a nonlinear solver: whether it
//! converged and how many iterations it took. The solve itself works on a
//! [`NonlinearSystem`] that evaluates the negated residual and the Jacobian
//! at an iterate:
//!
//! ```text
//! J(x_k) dx = -R(x_k)
//! x_{k+1}   = x_k + dx
//! ```

mod dense;
mod newton;

pub use dense::DenseMatrix;
pub use newton::NewtonRaphson;

use crate::error::Result;

/// Maximum Newton-Raphson iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Absolute tolerance on the Newton update.
pub const DEFAULT_ABS_TOLERANCE: f64 = 1e-9;

/// Relative tolerance on the Newton update.
pub const DEFAULT_REL_TOLERANCE: f64 = 1e-6;

/// Result of a nonlinear solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonOutcome {
    /// Whether the iteration converged
    pub converged: bool,
    /// Iterations performed
    pub iterations: usize,
    /// Infinity norm of the last update
    pub update_norm: f64,
}

impl NewtonOutcome {
    /// A non-converged outcome.
    pub fn failed(iterations: usize, update_norm: f64) -> Self {
        Self {
            converged: false,
            iterations,
            update_norm,
        }
    }
}

/// System of equations `R(x) = 0`.
pub trait NonlinearSystem {
    /// Number of unknowns.
    fn dimension(&self) -> usize;

    /// Fill `rhs` with `-R(x)` and `jacobian` with `dR/dx`.
    fn evaluate(&mut self, x: &[f64], rhs: &mut [f64], jacobian: &mut DenseMatrix) -> Result<()>;

    /// True while device limiting altered the last evaluation.
    fn limiting_active(&self) -> bool {
        false
    }
}

/// Solver for a [`NonlinearSystem`].
///
/// Non-convergence is reported through [`NewtonOutcome`]; `Err` is reserved
/// for failures of the system evaluation itself.
pub trait NonlinearSolver {
    /// Solve starting from `x`, leaving the final iterate in `x`.
    fn solve(&mut self, system: &mut dyn NonlinearSystem, x: &mut [f64]) -> Result<NewtonOutcome>;
}
