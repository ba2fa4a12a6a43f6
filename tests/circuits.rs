//! Transient runs of the reference circuit loader.

use approx::assert_abs_diff_eq;
use tia_core::circuit::{Circuit, DiodeParams, Waveform};
use tia_core::{InitialCondition, StepReport, TiaParams, Transient};

const TAU: f64 = 1e-4;

/// RC low-pass driven by a 0 -> 1 V step at `t = 1e-4` with a 1 us rise.
fn rc_step() -> Circuit {
    let mut c = Circuit::new();
    let vin = c.node("in");
    let out = c.node("out");
    c.voltage_source("V1", vin, Circuit::GROUND, Waveform::step(0.0, 1.0, 1e-4, 1e-6))
        .resistor("R1", vin, out, 1e3)
        .capacitor("C1", out, Circuit::GROUND, 1e-7);
    c
}

/// Analytic output of the RC low-pass for the ramped step input.
fn rc_exact(t: f64) -> f64 {
    let (t0, rise) = (1e-4, 1e-6);
    let ramp = |s: f64| {
        if s <= 0.0 {
            0.0
        } else {
            (s - TAU * (1.0 - (-s / TAU).exp())) / rise
        }
    };
    ramp(t - t0) - ramp(t - t0 - rise)
}

#[test]
fn test_rc_lands_on_source_breakpoints() {
    let params = TiaParams::new(0.0, 1e-3).with_rel_tol(1e-4).with_abs_tol(1e-8);
    let mut tr = Transient::new(rc_step(), params).unwrap();
    tr.initialize(InitialCondition::OperatingPoint).unwrap();
    assert_eq!(tr.solution(), &[0.0, 0.0, 0.0]);

    let mut reports: Vec<StepReport> = Vec::new();
    while !tr.is_finished() {
        reports.push(tr.step().unwrap());
    }
    let hits: Vec<f64> = reports
        .iter()
        .filter(|r| r.hit_breakpoint)
        .map(|r| r.time)
        .collect();
    assert_eq!(hits, vec![1e-4, 1e-4 + 1e-6, 1e-3]);
    assert_eq!(tr.statistics().breakpoint_restarts, 2);
    // Every restart begins again at order 1.
    for pair in reports.windows(2) {
        if pair[0].hit_breakpoint {
            assert_eq!(pair[1].order, 1);
        }
    }
    assert_abs_diff_eq!(tr.solution()[1], rc_exact(1e-3), epsilon = 1e-3);
}

#[test]
fn test_rc_interpolated_output() {
    let params = TiaParams::new(0.0, 1e-3).with_rel_tol(1e-4).with_abs_tol(1e-8);
    let mut tr = Transient::new(rc_step(), params).unwrap();
    tr.initialize(InitialCondition::OperatingPoint).unwrap();
    let times: Vec<f64> = (1..=20).map(|k| k as f64 * 5e-5).collect();
    let mut rows = Vec::new();
    tr.run(&times, |t, x| {
        rows.push((t, x[1]));
        Ok(())
    })
    .unwrap();
    assert_eq!(rows.len(), 21);
    for (t, v) in rows {
        assert_abs_diff_eq!(v, rc_exact(t), epsilon = 5e-3);
    }
}

#[test]
fn test_checkpoint_rollback_is_idempotent() {
    let params = TiaParams::new(0.0, 1e-3).with_rel_tol(1e-4);
    let mut tr = Transient::new(rc_step(), params).unwrap();
    tr.initialize(InitialCondition::OperatingPoint).unwrap();
    while tr.time() < 1.5e-4 {
        tr.step().unwrap();
    }
    let cp = tr.checkpoint();
    let first: Vec<StepReport> = (0..5).map(|_| tr.step().unwrap()).collect();
    let solution = tr.solution().to_vec();

    tr.rollback(&cp).unwrap();
    assert_eq!(tr.checkpoint(), cp);
    tr.rollback(&cp).unwrap();
    assert_eq!(tr.checkpoint(), cp);

    let second: Vec<StepReport> = (0..5).map(|_| tr.step().unwrap()).collect();
    assert_eq!(first, second);
    assert_eq!(tr.solution(), solution.as_slice());
}

#[test]
fn test_half_wave_rectifier() {
    let mut c = Circuit::new();
    let vin = c.node("in");
    let out = c.node("out");
    let sine = Waveform::Sine {
        offset: 0.0,
        amplitude: 5.0,
        freq: 1e3,
        delay: 0.0,
    };
    c.voltage_source("V1", vin, Circuit::GROUND, sine)
        .diode("D1", vin, out, DiodeParams::default())
        .capacitor("C1", out, Circuit::GROUND, 1e-6)
        .resistor("RL", out, Circuit::GROUND, 1e4);

    let params = TiaParams::new(0.0, 3e-3).with_rel_tol(1e-3);
    let mut tr = Transient::new(c, params).unwrap();
    tr.initialize(InitialCondition::OperatingPoint).unwrap();

    let mut v_max: f64 = 0.0;
    let mut v_min: f64 = 0.0;
    tr.run(&[], |_t, x| {
        v_max = v_max.max(x[1]);
        v_min = v_min.min(x[1]);
        Ok(())
    })
    .unwrap();

    // Peak minus one diode drop, never charged negative.
    assert!(v_max > 3.8 && v_max < 5.0, "peak {v_max}");
    assert!(v_min > -0.01, "minimum {v_min}");
    // Held up by the capacitor at the end of the negative half cycle.
    assert!(tr.solution()[1] > 3.0);
    // Diode state and lead currents are tracked.
    assert_eq!(tr.state().len(), 1);
    assert_eq!(tr.store_values().len(), 2);
}
