//! Time integration methods.
//!
//! An [`IntegrationMethod`] turns the loader's `Q`, `F` and Jacobians into
//! the residual and Jacobian handed to the nonlinear solver. [`Gear12`] is
//! the variable-order BDF method used for transient steps and
//! [`NoTimeIntegration`] drops the charge term for operating-point solves.
//!
//! All mutable run state lives in an [`IntegrationContext`] owned by the
//! driver and passed by reference into every operation.

mod dcop;
mod gear12;
mod interpolate;

pub use dcop::NoTimeIntegration;
pub use gear12::Gear12;
pub use interpolate::BlockVectorMut;

use crate::control::{BreakpointSchedule, StepControl};
use crate::error::Result;
use crate::params::TiaParams;
use crate::store::{Partition, VectorStore};

/// Everything an integration method reads or writes during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationContext {
    /// Vectors
    pub store: VectorStore,
    /// Step and order bookkeeping
    pub control: StepControl,
    /// Pending stop times
    pub breakpoints: BreakpointSchedule,
}

impl IntegrationContext {
    /// Allocate a context for a problem of the given sizes.
    pub fn new(
        params: &TiaParams,
        solution_size: usize,
        state_size: usize,
        store_size: usize,
        partition: Partition,
    ) -> Result<Self> {
        let control = StepControl::new(params)?;
        let mut store = VectorStore::new(solution_size, state_size, store_size, partition)?;
        store.set_tolerances(params.rel_tol, params.abs_tol);
        let breakpoints = BreakpointSchedule::new(control.time_tolerance());
        Ok(Self {
            store,
            control,
            breakpoints,
        })
    }
}

/// Assembly of the nonlinear system from a loader evaluation.
pub trait IntegrationMethod {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Fill `store.residual` with the negated residual.
    fn obtain_residual(&self, ctx: &mut IntegrationContext);

    /// Fill `store.jacobian`.
    fn obtain_jacobian(&self, ctx: &mut IntegrationContext) -> Result<()>;
}
