//! Vector storage of a transient run.
//!
//! [`VectorStore`] owns every per-unknown array the integrator touches:
//! the solution generations, the history rings, predictors, corrections,
//! error weights and the scratch space the loader writes into. It knows how
//! to rotate, norm and reset those arrays but makes no integration decision.
//!
//! ## History layout
//!
//! ```text
//! x_history[0]   last accepted solution      (t_n)
//! x_history[1]   one step older              (t_{n-1})
//! x_history[2]   two steps older             (t_{n-2})
//! ```
//!
//! The charge, state, store and lead-current rings follow the same layout.

mod history;
pub mod ops;
mod partition;

pub use history::HistoryRing;
pub use partition::Partition;

use crate::error::{Result, TiaError};
use crate::loader::{DaeLoad, StateLoad};
use crate::params::{WeightMode, GEAR12_MAX_ORDER};
use crate::solver::DenseMatrix;
use crate::MACHINE_BIG;

/// Number of generations kept in each history ring.
pub const HISTORY_DEPTH: usize = GEAR12_MAX_ORDER + 1;

/// Selects one of the history rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Solution,
    Charge,
    State,
    Store,
    LeadCharge,
}

/// All numerical vectors of a transient run.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    partition: Partition,
    state_size: usize,
    store_size: usize,

    // ====== Solution generations ======
    /// Solution being solved for
    pub next_solution: Vec<f64>,
    /// Last accepted solution
    pub curr_solution: Vec<f64>,
    /// Second-to-last accepted solution
    pub last_solution: Vec<f64>,
    /// Device state being computed
    pub next_state: Vec<f64>,
    pub curr_state: Vec<f64>,
    pub last_state: Vec<f64>,
    /// Store vector being computed
    pub next_store: Vec<f64>,
    pub curr_store: Vec<f64>,
    pub last_store: Vec<f64>,
    /// Lead-current charge component being computed
    pub next_lead_q: Vec<f64>,
    pub curr_lead_q: Vec<f64>,
    pub last_lead_q: Vec<f64>,
    /// Time derivative of the state vector
    pub state_deriv: Vec<f64>,
    /// Time derivative of the lead-current charges
    pub lead_q_deriv: Vec<f64>,

    // ====== Loader output and assembled system ======
    /// Last DAE evaluation
    pub load: DaeLoad,
    /// Negated residual handed to the nonlinear solver
    pub residual: Vec<f64>,
    /// Jacobian handed to the nonlinear solver
    pub jacobian: DenseMatrix,

    // ====== History ======
    pub(crate) x_history: HistoryRing,
    pub(crate) q_history: HistoryRing,
    pub(crate) state_history: HistoryRing,
    pub(crate) store_history: HistoryRing,
    pub(crate) lead_q_history: HistoryRing,

    // ====== Predictors ======
    /// Predicted solution
    pub xn0: Vec<f64>,
    /// Predicted charge
    pub qn0: Vec<f64>,
    /// Predicted state
    pub sn0: Vec<f64>,
    /// Predicted store
    pub store_n0: Vec<f64>,
    /// Predicted lead-current charge
    pub lead_qn0: Vec<f64>,

    // ====== Corrections ======
    /// `next_solution - xn0`
    pub newton_correction: Vec<f64>,
    /// `Q - qn0`
    pub q_newton_correction: Vec<f64>,
    /// `next_state - sn0`
    pub state_correction: Vec<f64>,
    /// `next_store - store_n0`
    pub store_correction: Vec<f64>,
    /// `next_lead_q - lead_qn0`
    pub lead_q_correction: Vec<f64>,

    // ====== Error weights ======
    /// Solution error weights
    pub err_wt: Vec<f64>,
    /// Charge error weights
    pub q_err_wt: Vec<f64>,
    rel_tol: Vec<f64>,
    abs_tol: Vec<f64>,
    device_mask: Option<Vec<bool>>,
}

/// Saved copy of a [`VectorStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    inner: Box<VectorStore>,
}

impl VectorStore {
    /// Allocate every vector of a run.
    ///
    /// `partition` must cover exactly `solution_size` entries.
    pub fn new(
        solution_size: usize,
        state_size: usize,
        store_size: usize,
        partition: Partition,
    ) -> Result<Self> {
        TiaError::check_len("partition", solution_size, partition.len())?;
        let n = solution_size;
        let zeros = |len: usize| vec![0.0; len];
        Ok(Self {
            partition,
            state_size,
            store_size,
            next_solution: zeros(n),
            curr_solution: zeros(n),
            last_solution: zeros(n),
            next_state: zeros(state_size),
            curr_state: zeros(state_size),
            last_state: zeros(state_size),
            next_store: zeros(store_size),
            curr_store: zeros(store_size),
            last_store: zeros(store_size),
            next_lead_q: zeros(store_size),
            curr_lead_q: zeros(store_size),
            last_lead_q: zeros(store_size),
            state_deriv: zeros(state_size),
            lead_q_deriv: zeros(store_size),
            load: DaeLoad::new(n),
            residual: zeros(n),
            jacobian: DenseMatrix::new(n),
            x_history: HistoryRing::new(HISTORY_DEPTH, n)?,
            q_history: HistoryRing::new(HISTORY_DEPTH, n)?,
            state_history: HistoryRing::new(HISTORY_DEPTH, state_size)?,
            store_history: HistoryRing::new(HISTORY_DEPTH, store_size)?,
            lead_q_history: HistoryRing::new(HISTORY_DEPTH, store_size)?,
            xn0: zeros(n),
            qn0: zeros(n),
            sn0: zeros(state_size),
            store_n0: zeros(store_size),
            lead_qn0: zeros(store_size),
            newton_correction: zeros(n),
            q_newton_correction: zeros(n),
            state_correction: zeros(state_size),
            store_correction: zeros(store_size),
            lead_q_correction: zeros(store_size),
            err_wt: zeros(n),
            q_err_wt: zeros(n),
            rel_tol: zeros(n),
            abs_tol: zeros(n),
            device_mask: None,
        })
    }

    /// Number of unknowns.
    pub fn solution_size(&self) -> usize {
        self.curr_solution.len()
    }

    /// Length of the state vectors.
    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Length of the store and lead-current vectors.
    pub fn store_size(&self) -> usize {
        self.store_size
    }

    /// Ownership layout of the solution vector.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Solution history, newest first.
    pub fn x_history(&self) -> &HistoryRing {
        &self.x_history
    }

    /// Charge history, newest first.
    pub fn q_history(&self) -> &HistoryRing {
        &self.q_history
    }

    /// State history, newest first.
    pub fn state_history(&self) -> &HistoryRing {
        &self.state_history
    }

    /// Store history, newest first.
    pub fn store_history(&self) -> &HistoryRing {
        &self.store_history
    }

    /// Lead-current charge history, newest first.
    pub fn lead_q_history(&self) -> &HistoryRing {
        &self.lead_q_history
    }

    /// History ring selected by `kind`.
    pub fn history(&self, kind: HistoryKind) -> &HistoryRing {
        match kind {
            HistoryKind::Solution => &self.x_history,
            HistoryKind::Charge => &self.q_history,
            HistoryKind::State => &self.state_history,
            HistoryKind::Store => &self.store_history,
            HistoryKind::LeadCharge => &self.lead_q_history,
        }
    }

    /// Device mask in effect, if any.
    pub fn device_mask(&self) -> Option<&[bool]> {
        self.device_mask.as_deref()
    }

    /// Split borrow handed to [`Loader::load_state`](crate::loader::Loader::load_state).
    pub fn state_load(&mut self) -> StateLoad<'_> {
        StateLoad {
            state: &mut self.next_state,
            store: &mut self.next_store,
            lead_q: &mut self.next_lead_q,
        }
    }

    // ====== Tolerances ======

    /// Use the same tolerances for every unknown.
    pub fn set_tolerances(&mut self, rel_tol: f64, abs_tol: f64) {
        self.rel_tol.fill(rel_tol);
        self.abs_tol.fill(abs_tol);
    }

    /// Per-unknown tolerances.
    pub fn set_tolerance_vectors(&mut self, rel_tol: &[f64], abs_tol: &[f64]) -> Result<()> {
        TiaError::check_len("relative tolerance", self.solution_size(), rel_tol.len())?;
        TiaError::check_len("absolute tolerance", self.solution_size(), abs_tol.len())?;
        self.rel_tol.copy_from_slice(rel_tol);
        self.abs_tol.copy_from_slice(abs_tol);
        Ok(())
    }

    /// Exclude unknowns from the error test (`false` = excluded).
    pub fn set_device_mask(&mut self, mask: Option<Vec<bool>>) -> Result<()> {
        if let Some(m) = &mask {
            TiaError::check_len("device mask", self.solution_size(), m.len())?;
        }
        self.device_mask = mask;
        Ok(())
    }

    // ====== Norms ======

    /// Weighted root-mean-square norm `sqrt(mean((v_i / w_i)^2))`.
    ///
    /// Entries with a zero weight are treated as infinitely weighted and
    /// contribute nothing. An empty vector has norm 0. Both slices must
    /// match the solution length.
    pub fn compute_weighted_norm(&self, v: &[f64], weight: &[f64]) -> Result<f64> {
        TiaError::check_len("norm vector", self.solution_size(), v.len())?;
        TiaError::check_len("norm weights", self.solution_size(), weight.len())?;
        Ok(weighted_norm(&self.partition, v, weight))
    }

    /// Infinity norm of `v` over the partition.
    pub fn inf_norm(&self, v: &[f64]) -> f64 {
        self.partition
            .max_all(|r| v[r].iter().fold(0.0, |m: f64, x| m.max(x.abs())))
    }

    /// Fill the solution and charge error weights.
    ///
    /// Solution weights scale with `curr_solution`, charge weights with the
    /// newest charge history. Masked entries get a huge weight so they
    /// never fail the error test.
    pub fn set_error_weights(&mut self, mode: WeightMode) {
        let scale_all = match mode {
            WeightMode::MaxNorm => Some(self.inf_norm(&self.curr_solution)),
            WeightMode::Absolute => None,
        };
        let q0 = self.q_history.get(0);
        for i in 0..self.err_wt.len() {
            let magnitude = scale_all.unwrap_or_else(|| self.curr_solution[i].abs());
            self.err_wt[i] = self.rel_tol[i] * magnitude + self.abs_tol[i];
            self.q_err_wt[i] = self.rel_tol[i] * q0[i].abs() + self.abs_tol[i];
        }
        if let Some(mask) = &self.device_mask {
            for (i, &keep) in mask.iter().enumerate() {
                if !keep {
                    self.err_wt[i] = MACHINE_BIG;
                    self.q_err_wt[i] = MACHINE_BIG;
                }
            }
        }
    }

    /// Fill every correction vector as `next - predictor`.
    pub fn compute_corrections(&mut self) {
        ops::difference(&mut self.newton_correction, &self.next_solution, &self.xn0);
        ops::difference(&mut self.q_newton_correction, &self.load.q, &self.qn0);
        ops::difference(&mut self.state_correction, &self.next_state, &self.sn0);
        ops::difference(&mut self.store_correction, &self.next_store, &self.store_n0);
        ops::difference(&mut self.lead_q_correction, &self.next_lead_q, &self.lead_qn0);
    }

    /// Norm of the Newton correction, optionally blended with the charge
    /// correction norm.
    pub fn wrms_error_norm(&self, use_q_norm: bool) -> f64 {
        let e = weighted_norm(&self.partition, &self.newton_correction, &self.err_wt);
        if !use_q_norm {
            return e;
        }
        let q = weighted_norm(&self.partition, &self.q_newton_correction, &self.q_err_wt);
        (0.5 * e * e + 0.5 * q * q).sqrt()
    }

    /// Norm of the initial charge derivative, used for the first step.
    ///
    /// With `F` containing the sources, `dQ/dt = -F(x0)` at the initial point.
    pub fn initial_derivative_norm(&self) -> f64 {
        weighted_norm(&self.partition, &self.load.f, &self.q_err_wt)
    }

    // ====== History management ======

    /// Push the accepted `next` vectors into slot 0 of every history ring.
    ///
    /// The charge ring receives the last loader evaluation, which must be
    /// taken at the accepted solution.
    pub fn rotate_history(&mut self) -> Result<()> {
        self.x_history.rotate_in(&self.next_solution)?;
        self.q_history.rotate_in(&self.load.q)?;
        self.state_history.rotate_in(&self.next_state)?;
        self.store_history.rotate_in(&self.next_store)?;
        self.lead_q_history.rotate_in(&self.next_lead_q)?;
        Ok(())
    }

    /// Advance the solution generations after an accepted step.
    ///
    /// `last <- curr <- next` by swapping buffers; `next` is re-seeded from
    /// the new `curr`.
    pub fn update_solution_generations(&mut self) {
        rotate_generations(
            &mut self.last_solution,
            &mut self.curr_solution,
            &mut self.next_solution,
        );
        rotate_generations(&mut self.last_state, &mut self.curr_state, &mut self.next_state);
        rotate_generations(&mut self.last_store, &mut self.curr_store, &mut self.next_store);
        rotate_generations(
            &mut self.last_lead_q,
            &mut self.curr_lead_q,
            &mut self.next_lead_q,
        );
    }

    /// Make the history look as if the current state had held forever.
    ///
    /// Every ring slot receives the current vectors and all derivatives are
    /// zeroed. The charge ring takes the last loader evaluation, which must
    /// be taken at `curr_solution`.
    pub fn set_constant_history(&mut self) -> Result<()> {
        self.x_history.fill_with(&self.curr_solution)?;
        self.q_history.fill_with(&self.load.q)?;
        self.state_history.fill_with(&self.curr_state)?;
        self.store_history.fill_with(&self.curr_store)?;
        self.lead_q_history.fill_with(&self.curr_lead_q)?;
        self.next_solution.copy_from_slice(&self.curr_solution);
        self.last_solution.copy_from_slice(&self.curr_solution);
        self.next_state.copy_from_slice(&self.curr_state);
        self.next_store.copy_from_slice(&self.curr_store);
        self.next_lead_q.copy_from_slice(&self.curr_lead_q);
        self.state_deriv.fill(0.0);
        self.lead_q_deriv.fill(0.0);
        Ok(())
    }

    /// Zero every vector and history slot.
    pub fn set_zero_history(&mut self) {
        for v in [
            &mut self.next_solution,
            &mut self.curr_solution,
            &mut self.last_solution,
            &mut self.next_state,
            &mut self.curr_state,
            &mut self.last_state,
            &mut self.next_store,
            &mut self.curr_store,
            &mut self.last_store,
            &mut self.next_lead_q,
            &mut self.curr_lead_q,
            &mut self.last_lead_q,
            &mut self.state_deriv,
            &mut self.lead_q_deriv,
            &mut self.xn0,
            &mut self.qn0,
            &mut self.sn0,
            &mut self.store_n0,
            &mut self.lead_qn0,
            &mut self.newton_correction,
            &mut self.q_newton_correction,
            &mut self.state_correction,
            &mut self.store_correction,
            &mut self.lead_q_correction,
        ] {
            v.fill(0.0);
        }
        for ring in [
            &mut self.x_history,
            &mut self.q_history,
            &mut self.state_history,
            &mut self.store_history,
            &mut self.lead_q_history,
        ] {
            ring.fill_scalar(0.0);
        }
    }

    /// Save every vector.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            inner: Box::new(self.clone()),
        }
    }

    /// Restore a saved state. The result compares equal to the state at
    /// the time of [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        TiaError::check_len(
            "snapshot solution",
            self.solution_size(),
            snapshot.inner.solution_size(),
        )?;
        self.clone_from(&snapshot.inner);
        Ok(())
    }
}

/// `sqrt(mean((v_i / w_i)^2))` reduced over `partition`.
fn weighted_norm(partition: &Partition, v: &[f64], weight: &[f64]) -> f64 {
    let n = partition.len();
    if n == 0 {
        return 0.0;
    }
    debug_assert_eq!(v.len(), n);
    debug_assert_eq!(weight.len(), n);
    let sum = partition.sum_all(|r| {
        v[r.clone()]
            .iter()
            .zip(&weight[r])
            .filter(|(_, w)| **w != 0.0)
            .map(|(&vi, &wi)| {
                let s = vi / wi;
                s * s
            })
            .sum()
    });
    (sum / n as f64).sqrt()
}

fn rotate_generations(last: &mut Vec<f64>, curr: &mut Vec<f64>, next: &mut Vec<f64>) {
    std::mem::swap(last, curr);
    std::mem::swap(curr, next);
    next.copy_from_slice(curr);
}
