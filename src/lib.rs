//! # TIA Core
//!
//! A variable-order, variable-step Gear (BDF orders 1 and 2) time integrator
//! for circuit-style differential-algebraic equations
//!
//! ```text
//! F(x(t)) + dQ(x(t))/dt = 0
//! ```
//!
//! ## Architecture
//!
//! - [`store`] - Solution generations, history rings, norms and error weights
//! - [`control`] - Step-size/order control, BDF coefficients and breakpoints
//! - [`integrator`] - The Gear12 method, operating-point assembly and interpolation
//! - [`loader`] - Contract for the equation assembler
//! - [`solver`] - Dense LU and Newton-Raphson
//! - [`transient`] - The step loop tying everything together
//! - [`circuit`] - A small MNA circuit loader used by tests and demos
//!
//! ## Usage
//!
//! ```
//! use tia_core::circuit::{Circuit, Waveform};
//! use tia_core::{InitialCondition, TiaParams, Transient};
//!
//! let mut c = Circuit::new();
//! let vin = c.node("in");
//! let out = c.node("out");
//! c.voltage_source("V1", vin, Circuit::GROUND, Waveform::step(0.0, 1.0, 1e-4, 1e-6))
//!     .resistor("R1", vin, out, 1e3)
//!     .capacitor("C1", out, Circuit::GROUND, 1e-7);
//!
//! let params = TiaParams::new(0.0, 1e-3).with_rel_tol(1e-4);
//! let mut tr = Transient::new(c, params).unwrap();
//! tr.initialize(InitialCondition::OperatingPoint).unwrap();
//! let stats = tr.run(&[], |_t, _x| Ok(())).unwrap();
//! assert!(stats.accepted_steps > 0);
//! ```
//!
//! ## Step anatomy
//!
//! Each attempted step predicts the solution from the history, solves the
//! corrector equation with Newton's method and estimates the local error as
//! `ck * ||x - x_pred||`. Accepted steps rotate the history and may raise the
//! order; rejected steps shrink the step and retry.

pub mod circuit;
pub mod control;
pub mod error;
pub mod integrator;
pub mod loader;
pub mod params;
pub mod solver;
pub mod store;
pub mod transient;

#[cfg(feature = "cli")]
pub mod output;

// Re-export main types for convenience
pub use error::{Result, TiaError};
pub use loader::{DaeLoad, Loader, StateLoad};
pub use params::{ErrorAnalysis, StepHeuristics, TiaParams, WeightMode};
pub use transient::{
    Checkpoint, InitialCondition, StepReport, StepStatistics, Transient, TransientConfig,
};

/// Unit roundoff of `f64`.
pub const MACHINE_PRECISION: f64 = f64::EPSILON;

/// Weight given to entries excluded from the error test.
pub const MACHINE_BIG: f64 = f64::MAX;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
