//! TIA - Gear12 transient demo driver
//!
//! Runs one of the built-in demo circuits and writes the solution as
//! tab-separated columns to stdout.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info tia rc --tstop 5e-3 --output-step 1e-5 > rc.tsv
//! ```

use std::io;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;
use tia_core::{
    circuit::{Circuit, DiodeParams, Waveform},
    error::Result,
    output::TsvOutput,
    InitialCondition, TiaParams, Transient,
};

/// Built-in demo problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// RC discharge, `dv/dt = -v` from `v(0) = 1`
    Decay,
    /// RC low-pass driven by a pulse train
    Rc,
    /// Half-wave rectifier with a smoothing capacitor
    Rectifier,
}

/// Variable-step Gear12 transient integrator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Demo circuit to simulate
    #[arg(value_enum)]
    demo: Demo,

    /// Final time in seconds
    #[arg(long)]
    tstop: Option<f64>,

    /// Relative error tolerance
    #[arg(long)]
    rel_tol: Option<f64>,

    /// Absolute error tolerance
    #[arg(long)]
    abs_tol: Option<f64>,

    /// Maximum BDF order (1 or 2)
    #[arg(long)]
    max_order: Option<usize>,

    /// Integrate with this constant step
    #[arg(long)]
    fixed_step: Option<f64>,

    /// Interval between output points; every accepted step when omitted
    #[arg(long)]
    output_step: Option<f64>,

    /// YAML file with integration parameters
    #[arg(long, value_name = "PARAMS_FILE")]
    config: Option<PathBuf>,
}

/// Circuit, default final time and initial condition of a demo.
fn build_demo(demo: Demo) -> (Circuit, f64, InitialCondition) {
    let mut c = Circuit::new();
    match demo {
        Demo::Decay => {
            let a = c.node("a");
            c.resistor("R1", a, Circuit::GROUND, 1.0)
                .capacitor("C1", a, Circuit::GROUND, 1.0);
            (c, 1.0, InitialCondition::Given(vec![1.0]))
        }
        Demo::Rc => {
            let vin = c.node("in");
            let out = c.node("out");
            let pulse = Waveform::Pulse {
                v1: 0.0,
                v2: 1.0,
                delay: 1e-4,
                rise: 1e-6,
                fall: 1e-6,
                width: 5e-4,
                period: 1e-3,
            };
            c.voltage_source("V1", vin, Circuit::GROUND, pulse)
                .resistor("R1", vin, out, 1e3)
                .capacitor("C1", out, Circuit::GROUND, 1e-7);
            (c, 3e-3, InitialCondition::OperatingPoint)
        }
        Demo::Rectifier => {
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
            (c, 5e-3, InitialCondition::OperatingPoint)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (circuit, default_tstop, initial) = build_demo(args.demo);
    circuit.validate()?;

    let mut params = match &args.config {
        Some(path) => TiaParams::from_yaml_file(path)?,
        None => TiaParams::new(0.0, default_tstop),
    };
    if args.config.is_none() || args.tstop.is_some() {
        params.final_time = args.tstop.unwrap_or(default_tstop);
    }
    if let Some(r) = args.rel_tol {
        params.rel_tol = r;
    }
    if let Some(a) = args.abs_tol {
        params.abs_tol = a;
    }
    if let Some(k) = args.max_order {
        params.max_order = k;
    }
    if let Some(h) = args.fixed_step {
        params = params.with_fixed_step(h);
    }

    let output_times: Vec<f64> = match args.output_step {
        Some(dt) if dt > 0.0 => {
            let n = ((params.final_time - params.initial_time) / dt).floor() as usize;
            (1..=n).map(|k| params.initial_time + k as f64 * dt).collect()
        }
        _ => Vec::new(),
    };

    let names = circuit.unknown_names();
    let mut transient = Transient::new(circuit, params)?;
    transient.initialize(initial)?;

    let stdout = io::stdout();
    let mut output = TsvOutput::new(stdout.lock(), names.len());
    output.write_header(&names)?;
    let stats = transient.run(&output_times, |t, x| output.write_row(t, x))?;
    output.flush()?;

    info!(
        "{} accepted, {} rejected ({} error test, {} Newton), {} Newton iterations",
        stats.accepted_steps,
        stats.rejected_steps,
        stats.error_test_failures,
        stats.newton_failures,
        stats.newton_iterations
    );
    Ok(())
}
