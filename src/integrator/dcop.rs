//! Operating-point assembly (no time integration).

use super::{IntegrationContext, IntegrationMethod};
use crate::error::Result;

/// Steady state: `F(x) = 0`, the charge term is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimeIntegration;

impl IntegrationMethod for NoTimeIntegration {
    fn name(&self) -> &'static str {
        "operating point"
    }

    /// `-F(x)`, plus the `F` part of any limiter correction.
    fn obtain_residual(&self, ctx: &mut IntegrationContext) {
        let store = &mut ctx.store;
        for (r, &f) in store.residual.iter_mut().zip(&store.load.f) {
            *r = -f;
        }
        if store.load.limiting {
            crate::store::ops::axpy(&mut store.residual, 1.0, &store.load.df_dx_dvp);
        }
    }

    /// `dF/dx`
    fn obtain_jacobian(&self, ctx: &mut IntegrationContext) -> Result<()> {
        let store = &mut ctx.store;
        store.jacobian.a.copy_from_slice(&store.load.df_dx.a);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TiaParams;
    use crate::store::Partition;

    #[test]
    fn test_drops_charge_term() {
        let params = TiaParams::new(0.0, 1.0);
        let mut ctx = IntegrationContext::new(&params, 2, 0, 0, Partition::single(2)).unwrap();
        ctx.store.load.q.copy_from_slice(&[5.0, 6.0]);
        ctx.store.load.f.copy_from_slice(&[1.0, -2.0]);
        ctx.store.load.dq_dx.set(0, 0, 7.0);
        ctx.store.load.df_dx.set(1, 1, 3.0);

        let method = NoTimeIntegration;
        method.obtain_residual(&mut ctx);
        method.obtain_jacobian(&mut ctx).unwrap();
        assert_eq!(ctx.store.residual, vec![-1.0, 2.0]);
        assert_eq!(ctx.store.jacobian.a, vec![0.0, 0.0, 0.0, 3.0]);

        ctx.store.load.limiting = true;
        ctx.store.load.df_dx_dvp.copy_from_slice(&[0.5, 0.0]);
        method.obtain_residual(&mut ctx);
        assert_eq!(ctx.store.residual, vec![-0.5, 2.0]);
    }
}
