//! Quiescent demo harness.
//!
//! Builds one of the bundled demo topologies and runs a DC operating
//! point, a transient with CSV export, a connectivity audit, or a
//! warm-started supply sweep. Output here is for humans; nothing about the
//! table formats is contractual.

mod demos;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nalgebra::DVector;
use quiescent_core::{check_dc_paths, units};
use quiescent_solver::{DcOptions, Engine, StepOptions, compute_thd, run_transient};

use demos::{Demo, build};

#[derive(Parser)]
#[command(name = "quiescent")]
#[command(about = "Analog circuit simulator demo harness", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print homotopy progress while solving.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Solve the DC operating point and print the unknowns.
    Op {
        /// Demo circuit to build.
        #[arg(long, value_enum, default_value = "divider")]
        circuit: Demo,
        /// Supply voltage for circuits that take one.
        #[arg(long, default_value_t = 12.0)]
        supply: f64,
    },
    /// Run a fixed-step transient and emit CSV.
    Tran {
        #[arg(long, value_enum, default_value = "clipper")]
        circuit: Demo,
        #[arg(long, default_value_t = 12.0)]
        supply: f64,
        /// Run length; SPICE suffixes accepted (e.g. 10m).
        #[arg(long, default_value = "10m")]
        duration: String,
        /// Time step; SPICE suffixes accepted (e.g. 5u).
        #[arg(long, default_value = "5u")]
        dt: String,
        /// Write CSV here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Report THD of the OUT node at this fundamental (Hz).
        #[arg(long)]
        thd: Option<f64>,
    },
    /// Check that every node has a DC path to ground.
    Audit {
        #[arg(long, value_enum, default_value = "amp")]
        circuit: Demo,
        #[arg(long, default_value_t = 12.0)]
        supply: f64,
    },
    /// Warm-started supply sweep over the amplifier demo.
    Sweep {
        #[arg(long, default_value_t = 12.0)]
        from: f64,
        #[arg(long, default_value_t = 18.0)]
        to: f64,
        #[arg(long, default_value_t = 1.0)]
        step: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Op { circuit, supply } => run_op(circuit, supply, cli.verbose),
        Command::Tran {
            circuit,
            supply,
            duration,
            dt,
            output,
            thd,
        } => run_tran(circuit, supply, &duration, &dt, output, thd, cli.verbose),
        Command::Audit { circuit, supply } => run_audit(circuit, supply),
        Command::Sweep { from, to, step } => run_sweep(from, to, step, cli.verbose),
    }
}

fn dc_options(verbose: bool) -> DcOptions {
    DcOptions {
        verbose,
        ..Default::default()
    }
}

fn run_op(demo: Demo, supply: f64, verbose: bool) -> Result<()> {
    let built = build(demo, supply);
    let mut engine = Engine::new(built.circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &dc_options(verbose));

    if !report.converged && !report.partial {
        if let Some(failure) = &report.failure {
            eprintln!("{failure}");
        }
        bail!("DC operating point did not converge");
    }
    if report.partial {
        eprintln!(
            "warning: partial DC point (gmin stuck at {:.1e})",
            report.stats.final_gmin
        );
    }

    println!(
        "DC operating point ({} iterations, residual {:.2e}, gmin {:.1e})",
        report.stats.total_iterations, report.stats.last_residual, report.stats.final_gmin
    );
    for i in 0..engine.num_unknowns() {
        println!(
            "  {:<16} {}",
            engine.circuit().unknown_meaning(i),
            units::format_value(x[i])
        );
    }
    Ok(())
}

fn run_tran(
    demo: Demo,
    supply: f64,
    duration: &str,
    dt: &str,
    output: Option<PathBuf>,
    thd: Option<f64>,
    verbose: bool,
) -> Result<()> {
    let duration = units::parse_value(duration)
        .with_context(|| format!("bad duration {duration:?}"))?;
    let dt = units::parse_value(dt).with_context(|| format!("bad dt {dt:?}"))?;
    if dt <= 0.0 || duration <= 0.0 {
        bail!("duration and dt must be positive");
    }

    let built = build(demo, supply);
    let mut engine = Engine::new(built.circuit);
    let mut x = DVector::zeros(0);
    let report = engine.solve_dc(&mut x, &dc_options(verbose));
    if !report.converged && !report.partial {
        bail!("DC operating point did not converge");
    }
    engine.initialize_dynamics(&x);

    let trace = run_transient(&mut engine, &mut x, duration, dt, &StepOptions::default());
    if trace.failed_steps > 0 {
        eprintln!("warning: {} transient steps failed to converge", trace.failed_steps);
    }

    let mut sink: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    write!(sink, "time")?;
    for i in 0..engine.num_unknowns() {
        write!(sink, ",{}", engine.circuit().unknown_meaning(i))?;
    }
    writeln!(sink)?;
    for (k, t) in trace.time.iter().enumerate() {
        write!(sink, "{t:.9e}")?;
        for v in trace.samples[k].iter() {
            write!(sink, ",{v:.9e}")?;
        }
        writeln!(sink)?;
    }
    sink.flush()?;

    if let Some(fundamental) = thd {
        let Some(node) = engine.circuit().find_node("OUT") else {
            bail!("this circuit has no OUT node to analyse");
        };
        let samples = trace.unknown(node.index().expect("OUT is not ground"));
        let result = compute_thd(&samples, 1.0 / dt, fundamental, 10);
        eprintln!(
            "THD at {} Hz: {:.3}% (fundamental {:.4})",
            fundamental, result.thd_percent, result.fundamental_magnitude
        );
    }
    Ok(())
}

fn run_audit(demo: Demo, supply: f64) -> Result<()> {
    let built = build(demo, supply);
    let mut circuit = built.circuit;
    circuit.finalize();
    let report = check_dc_paths(&circuit);
    println!("{report}");
    if !report.is_clean() {
        bail!("{} floating nodes", report.floating().len());
    }
    Ok(())
}

fn run_sweep(from: f64, to: f64, step: f64, verbose: bool) -> Result<()> {
    if step <= 0.0 || to < from {
        bail!("sweep needs from <= to and a positive step");
    }

    let built = build(Demo::Amp, from);
    let (h_vcc, h_vee) = built.supplies.expect("amp demo has supply handles");
    let mut engine = Engine::new(built.circuit);
    let opts = dc_options(verbose);
    let mut x = DVector::zeros(0);

    let out = engine
        .circuit()
        .find_node("OUT")
        .expect("amp demo has an OUT node")
        .index()
        .expect("OUT is not ground");

    println!("{:>8} {:>12} {:>8}", "supply", "V(OUT)", "iters");
    let mut supply = from;
    while supply <= to + 1e-9 {
        engine.circuit_mut().device_mut(h_vcc).set_voltage(supply);
        engine.circuit_mut().device_mut(h_vee).set_voltage(-supply);

        let report = engine.solve_dc(&mut x, &opts);
        if !report.converged {
            bail!("sweep failed at +-{supply} V");
        }
        println!(
            "{:>8.1} {:>12} {:>8}",
            supply,
            units::format_value(x[out]),
            report.stats.total_iterations
        );
        supply += step;
    }
    Ok(())
}
