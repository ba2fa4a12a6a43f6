//! Newton-Raphson iteration.

use log::trace;

use super::{DenseMatrix, NewtonOutcome, NonlinearSolver, NonlinearSystem};
use super::{DEFAULT_ABS_TOLERANCE, DEFAULT_MAX_ITERATIONS, DEFAULT_REL_TOLERANCE};
use crate::error::{Result, TiaError};

/// Undamped Newton-Raphson solver on a dense Jacobian.
///
/// Converged when the update satisfies
/// `max|dx| <= abs_tolerance + rel_tolerance * max|x|` and the system
/// reports no active limiting.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute update tolerance
    pub abs_tolerance: f64,
    /// Relative update tolerance
    pub rel_tolerance: f64,
    jacobian: DenseMatrix,
    rhs: Vec<f64>,
    dx: Vec<f64>,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    /// Create a solver with default settings.
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            jacobian: DenseMatrix::new(0),
            rhs: Vec::new(),
            dx: Vec::new(),
        }
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the update tolerances.
    pub fn with_tolerances(mut self, abs_tolerance: f64, rel_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self.rel_tolerance = rel_tolerance;
        self
    }

    fn resize(&mut self, n: usize) {
        if self.jacobian.size != n {
            self.jacobian = DenseMatrix::new(n);
            self.rhs = vec![0.0; n];
            self.dx = vec![0.0; n];
        }
    }
}

impl NonlinearSolver for NewtonRaphson {
    fn solve(&mut self, system: &mut dyn NonlinearSystem, x: &mut [f64]) -> Result<NewtonOutcome> {
        let n = system.dimension();
        TiaError::check_len("Newton initial guess", n, x.len())?;
        self.resize(n);

        let mut update_norm = f64::INFINITY;
        for iter in 0..self.max_iterations {
            system.evaluate(x, &mut self.rhs, &mut self.jacobian)?;

            match self.jacobian.factor() {
                Ok(()) => {}
                Err(TiaError::SingularMatrix) => {
                    trace!("singular Jacobian at Newton iteration {}", iter + 1);
                    return Ok(NewtonOutcome::failed(iter + 1, update_norm));
                }
                Err(e) => return Err(e),
            }
            self.jacobian.solve(&self.rhs, &mut self.dx)?;

            let mut x_max = 0.0f64;
            update_norm = 0.0;
            for (xi, &di) in x.iter_mut().zip(&self.dx) {
                *xi += di;
                x_max = x_max.max(xi.abs());
                update_norm = update_norm.max(di.abs());
            }
            if !update_norm.is_finite() {
                return Ok(NewtonOutcome::failed(iter + 1, update_norm));
            }
            trace!("Newton iteration {}: max|dx| = {:.3e}", iter + 1, update_norm);

            if update_norm <= self.abs_tolerance + self.rel_tolerance * x_max
                && !system.limiting_active()
            {
                return Ok(NewtonOutcome {
                    converged: true,
                    iterations: iter + 1,
                    update_norm,
                });
            }
        }

        Ok(NewtonOutcome::failed(self.max_iterations, update_norm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// x^2 - a = 0
    struct Sqrt {
        a: f64,
    }

    impl NonlinearSystem for Sqrt {
        fn dimension(&self) -> usize {
            1
        }

        fn evaluate(&mut self, x: &[f64], rhs: &mut [f64], jac: &mut DenseMatrix) -> Result<()> {
            rhs[0] = -(x[0] * x[0] - self.a);
            jac.set(0, 0, 2.0 * x[0]);
            Ok(())
        }
    }

    /// Linear 2x2 system A x = b.
    struct Linear;

    impl NonlinearSystem for Linear {
        fn dimension(&self) -> usize {
            2
        }

        fn evaluate(&mut self, x: &[f64], rhs: &mut [f64], jac: &mut DenseMatrix) -> Result<()> {
            jac.clear();
            jac.set(0, 0, 4.0);
            jac.set(0, 1, 1.0);
            jac.set(1, 0, 1.0);
            jac.set(1, 1, 3.0);
            rhs[0] = -(4.0 * x[0] + x[1] - 1.0);
            rhs[1] = -(x[0] + 3.0 * x[1] - 2.0);
            Ok(())
        }
    }

    #[test]
    fn test_converges_quadratically() {
        let mut newton = NewtonRaphson::new();
        let mut x = [1.0];
        let out = newton.solve(&mut Sqrt { a: 2.0 }, &mut x).unwrap();
        assert!(out.converged);
        assert!(out.iterations <= 6);
        assert_relative_eq!(x[0], 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_linear_system_two_iterations() {
        let mut newton = NewtonRaphson::new();
        let mut x = [0.0, 0.0];
        let out = newton.solve(&mut Linear, &mut x).unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 2);
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-14);
    }

    #[test]
    fn test_singular_is_not_converged() {
        let mut newton = NewtonRaphson::new();
        let mut x = [0.0];
        let out = newton.solve(&mut Sqrt { a: 2.0 }, &mut x).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_iteration_limit() {
        let mut newton = NewtonRaphson::new().with_max_iterations(2);
        let mut x = [100.0];
        let out = newton.solve(&mut Sqrt { a: 2.0 }, &mut x).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 2);
    }

    #[test]
    fn test_size_mismatch() {
        let mut newton = NewtonRaphson::new();
        let mut x = [0.0; 3];
        assert!(newton.solve(&mut Linear, &mut x).is_err());
    }
}
