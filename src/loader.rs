//! Contract between the integrator and the equation assembler.
//!
//! A [`Loader`] evaluates the DAE `F(x) + dQ(x)/dt = 0` at a given solution
//! and time. Independent sources are folded into `F` (that is, `F` already
//! contains `-B(t)`). The loader never sees the integrator's history.

use crate::error::{Result, TiaError};
use crate::solver::DenseMatrix;

/// Quantities produced by one DAE evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct DaeLoad {
    /// Charge/flux vector `Q(x)`
    pub q: Vec<f64>,
    /// Static vector `F(x)` including sources
    pub f: Vec<f64>,
    /// `dQ/dx`
    pub dq_dx: DenseMatrix,
    /// `dF/dx`
    pub df_dx: DenseMatrix,
    /// `dQ/dx * (x_limited - x)` when limiting is active
    pub dq_dx_dvp: Vec<f64>,
    /// `dF/dx * (x_limited - x)` when limiting is active
    pub df_dx_dvp: Vec<f64>,
    /// Set by the loader when any device limited its junction voltages.
    pub limiting: bool,
}

impl DaeLoad {
    /// Zeroed storage for a system of dimension `n`.
    pub fn new(n: usize) -> Self {
        Self {
            q: vec![0.0; n],
            f: vec![0.0; n],
            dq_dx: DenseMatrix::new(n),
            df_dx: DenseMatrix::new(n),
            dq_dx_dvp: vec![0.0; n],
            df_dx_dvp: vec![0.0; n],
            limiting: false,
        }
    }

    /// System dimension.
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// True for an empty system.
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Reset every quantity before a new evaluation.
    pub fn clear(&mut self) {
        self.q.fill(0.0);
        self.f.fill(0.0);
        self.dq_dx.clear();
        self.df_dx.clear();
        self.dq_dx_dvp.fill(0.0);
        self.df_dx_dvp.fill(0.0);
        self.limiting = false;
    }
}

/// Device state written alongside the solution.
///
/// These vectors feed the history but never the nonlinear residual.
pub struct StateLoad<'a> {
    /// Per-device state (e.g. junction voltages)
    pub state: &'a mut [f64],
    /// Store vector (lead currents and other reported quantities)
    pub store: &'a mut [f64],
    /// Charge component of the lead currents
    pub lead_q: &'a mut [f64],
}

/// Assembles the DAE for the integrator.
pub trait Loader {
    /// Number of unknowns.
    fn solution_size(&self) -> usize;

    /// Length of the state vector.
    fn state_size(&self) -> usize {
        0
    }

    /// Length of the store and lead-current vectors.
    fn store_size(&self) -> usize {
        0
    }

    /// Evaluate `Q`, `F` and their Jacobians at `x`.
    ///
    /// The loader must clear `out` or overwrite every entry.
    fn load(&mut self, time: f64, x: &[f64], out: &mut DaeLoad) -> Result<()>;

    /// Evaluate state and store quantities at a converged `x`.
    fn load_state(&mut self, _time: f64, _x: &[f64], _out: StateLoad<'_>) -> Result<()> {
        Ok(())
    }

    /// Mandatory stop times inside `[t0, tf]`.
    fn breakpoints(&self, _t0: f64, _tf: f64) -> Vec<f64> {
        Vec::new()
    }

    /// Unknowns excluded from the local error test (`false` = excluded).
    fn device_mask(&self) -> Option<Vec<bool>> {
        None
    }

    /// Called once a step is accepted so stateful devices can commit.
    fn accept_step(&mut self, _time: f64, _x: &[f64]) {}
}

/// Check the sizes a loader reports against the store it will fill.
pub(crate) fn check_loader_sizes<L: Loader + ?Sized>(loader: &L, load: &DaeLoad) -> Result<()> {
    TiaError::check_len("loader solution", load.len(), loader.solution_size())
}
