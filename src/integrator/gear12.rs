//! Variable-step Gear method of orders 1 and 2.
//!
//! One attempted step runs
//!
//! ```text
//! update_coefficients -> obtain_predictor -> (load + Newton)
//!     -> estimate_error -> complete_step | reject_step
//! ```
//!
//! The charge derivative is discretised as
//! `dQ/dt ~ (alpha0 Q_{n+1} + alpha1 Q_n + alpha2 Q_{n-1}) / h`.

use log::trace;

use super::interpolate::{interpolate_ring, interpolate_ring_blocks, BlockVectorMut};
use super::{IntegrationContext, IntegrationMethod};
use crate::error::Result;
use crate::store::{ops, HistoryKind};

/// The Gear12 (BDF1-2) integration method.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gear12;

impl Gear12 {
    /// Start an integration interval from `curr_solution`.
    ///
    /// The loader output in the store must have been evaluated at
    /// `curr_solution`. The history is made constant, the stop time is
    /// refreshed and an initial step chosen.
    pub fn initialize(&self, ctx: &mut IntegrationContext) -> Result<()> {
        let weight_mode = ctx.control.params().weight_mode;
        ctx.store.set_constant_history()?;
        ctx.store.set_error_weights(weight_mode);
        let dnorm_q = ctx.store.initial_derivative_norm();
        ctx.control.update_stop_time(&ctx.breakpoints);
        ctx.control.choose_initial_step(dnorm_q);
        Ok(())
    }

    /// Recompute the coefficients for the current step and order.
    pub fn update_coefficients(&self, ctx: &mut IntegrationContext) {
        ctx.control.update_coefficients();
    }

    /// Extrapolate the history to the next time and seed `next_solution`.
    pub fn obtain_predictor(&self, ctx: &mut IntegrationContext) {
        let order = ctx.control.current_order;
        let beta = ctx.control.coeffs.beta;
        let store = &mut ctx.store;

        // Difference form: a constant history predicts itself exactly.
        store.xn0.copy_from_slice(store.x_history.get(0));
        store.qn0.copy_from_slice(store.q_history.get(0));
        for i in 1..=order {
            let x0 = store.x_history.get(0);
            let xi = store.x_history.get(i);
            for ((p, &a), &b) in store.xn0.iter_mut().zip(xi).zip(x0) {
                *p += beta[i] * (a - b);
            }
            let q0 = store.q_history.get(0);
            let qi = store.q_history.get(i);
            for ((p, &a), &b) in store.qn0.iter_mut().zip(qi).zip(q0) {
                *p += beta[i] * (a - b);
            }
        }

        store.sn0.copy_from_slice(store.state_history.get(0));
        store.store_n0.copy_from_slice(store.store_history.get(0));
        store.lead_qn0.copy_from_slice(store.lead_q_history.get(0));

        store.next_solution.copy_from_slice(&store.xn0);
        trace!("predictor order={} beta={:?}", order, beta);
    }

    /// Compute the corrections and the scaled error estimate
    /// `ck * ||x_{n+1} - x_pred||`, storing it in the controller.
    pub fn estimate_error(&self, ctx: &mut IntegrationContext) -> f64 {
        ctx.store.compute_corrections();
        let norm = ctx.store.wrms_error_norm(ctx.control.params().use_q_norm);
        let est = ctx.control.coeffs.ck * norm;
        ctx.control.est_over_tol = est;
        est
    }

    /// Apply the corrector coefficients to the state vector.
    pub fn update_state_deriv(&self, ctx: &mut IntegrationContext) {
        let h = ctx.control.current_step;
        let order = ctx.control.current_order;
        let alpha = ctx.control.coeffs.alpha;
        let store = &mut ctx.store;
        ops::linear_combo(
            &mut store.state_deriv,
            alpha[0],
            &store.next_state,
            alpha[1],
            &store.sn0,
        );
        if order == 2 {
            ops::axpy(&mut store.state_deriv, alpha[2], store.state_history.get(1));
        }
        ops::scale(&mut store.state_deriv, 1.0 / h);
    }

    /// Differentiate the lead-current charges and add them to the store
    /// vector.
    pub fn update_lead_current(&self, ctx: &mut IntegrationContext) {
        let h = ctx.control.current_step;
        let order = ctx.control.current_order;
        let alpha = ctx.control.coeffs.alpha;
        let store = &mut ctx.store;
        ops::linear_combo(
            &mut store.lead_q_deriv,
            alpha[0],
            &store.next_lead_q,
            alpha[1],
            &store.lead_qn0,
        );
        if order == 2 {
            ops::axpy(&mut store.lead_q_deriv, alpha[2], store.lead_q_history.get(1));
        }
        ops::scale(&mut store.lead_q_deriv, 1.0 / h);
        ops::axpy(&mut store.next_store, 1.0, &store.lead_q_deriv);
    }

    /// Commit the accepted vectors into the history.
    pub fn update_history(&self, ctx: &mut IntegrationContext) -> Result<()> {
        ctx.store.rotate_history()?;
        ctx.store.update_solution_generations();
        Ok(())
    }

    /// Undo the step-history shift of a rejected attempt.
    ///
    /// The vector history is only written on acceptance, so the step sizes
    /// are all that needs restoring.
    pub fn restore_history(&self, ctx: &mut IntegrationContext) {
        let order = ctx.control.current_order;
        ctx.control.coeffs.restore_psi(order);
    }

    /// Reject the current attempt and propose a smaller step.
    pub fn reject_step(&self, ctx: &mut IntegrationContext) -> Result<()> {
        self.restore_history(ctx);
        ctx.control.reject_step()
    }

    /// Accept the current attempt: rotate the history, advance the time
    /// and choose the next step and order.
    pub fn complete_step(&self, ctx: &mut IntegrationContext) -> Result<()> {
        self.update_history(ctx)?;
        ctx.control.complete_step();
        Ok(())
    }

    /// Solution at `time` inside the last accepted step.
    pub fn interpolate_solution(
        &self,
        ctx: &IntegrationContext,
        time: f64,
        out: &mut [f64],
    ) -> Result<()> {
        self.interpolate_history(ctx, HistoryKind::Solution, time, out)
    }

    /// Any history at `time` inside the last accepted step.
    pub fn interpolate_history(
        &self,
        ctx: &IntegrationContext,
        kind: HistoryKind,
        time: f64,
        out: &mut [f64],
    ) -> Result<()> {
        interpolate_ring(&ctx.control, ctx.store.history(kind), time, out)
    }

    /// Interpolate block `i` of a block-structured solution at `times[i]`.
    pub fn interpolate_blocks(
        &self,
        ctx: &IntegrationContext,
        times: &[f64],
        out: &mut BlockVectorMut<'_>,
    ) -> Result<()> {
        interpolate_ring_blocks(&ctx.control, ctx.store.history(HistoryKind::Solution), times, out)
    }
}

impl IntegrationMethod for Gear12 {
    fn name(&self) -> &'static str {
        "Gear12"
    }

    /// `-((alpha0 Q + alpha1 Q_n [+ alpha2 Q_{n-1}]) / h + F)`, plus the
    /// limiter correction `(alpha0/h) dQdx dVp + dFdx dVp` when active.
    ///
    /// The limiter term uses the same `alpha0/h` scalar as the Jacobian.
    /// At order 1 this is `1/h`; at order 2 it is larger, so the correction
    /// stays consistent with the matrix Newton actually solves with.
    fn obtain_residual(&self, ctx: &mut IntegrationContext) {
        let h = ctx.control.current_step;
        let order = ctx.control.current_order;
        let alpha = ctx.control.coeffs.alpha;
        let store = &mut ctx.store;
        let load = &store.load;

        ops::linear_combo(&mut store.residual, alpha[0], &load.q, alpha[1], store.q_history.get(0));
        if order == 2 {
            ops::axpy(&mut store.residual, alpha[2], store.q_history.get(1));
        }
        for (r, &f) in store.residual.iter_mut().zip(&load.f) {
            *r = -(*r / h + f);
        }

        if load.limiting {
            ops::axpy(&mut store.residual, alpha[0] / h, &load.dq_dx_dvp);
            ops::axpy(&mut store.residual, 1.0, &load.df_dx_dvp);
        }
    }

    /// `(alpha0 / h) dQ/dx + dF/dx`
    fn obtain_jacobian(&self, ctx: &mut IntegrationContext) -> Result<()> {
        let qscalar = ctx.control.coeffs.alpha[0] / ctx.control.current_step;
        let store = &mut ctx.store;
        store
            .jacobian
            .linear_combo(qscalar, &store.load.dq_dx, 1.0, &store.load.df_dx)
    }
}
