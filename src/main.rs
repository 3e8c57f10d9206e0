//! Runs a delivery scenario against one or all of the causal delivery engines
//! and prints what each process delivered, buffered and still holds.
//!
//! ```bash
//! causal --scenario first-second
//! causal --algorithm matrix --scenario random --processes 4 --sends 12 --seed 7
//! causal --scenario random --seed 3 --print-scenario > scenario.json
//! causal --file scenario.json --flush
//! RUST_LOG=causal=debug causal
//! ```

use anyhow::{bail, Context, Result};
use causal::{CausalClock, DependencyClock, Harness, MatrixClock, Scenario, VectorClock};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Bss,
    Ses,
    Matrix,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BuiltIn {
    FirstSecond,
    ThreeSenders,
    Random,
}

/// CLI arguments for the simulator.
#[derive(Parser, Debug)]
#[command(
    name = "causal",
    about = "Simulate causal message delivery with vector, dependency and matrix clocks",
    version
)]
struct CliArgs {
    /// Delivery algorithm to run.
    #[arg(short, long, value_enum, default_value_t = Algorithm::All)]
    algorithm: Algorithm,

    /// Built-in scenario, ignored when --file is given.
    #[arg(short, long, value_enum, default_value_t = BuiltIn::FirstSecond)]
    scenario: BuiltIn,

    /// JSON scenario file.
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Process count for the random scenario.
    #[arg(long, default_value_t = 3)]
    processes: usize,

    /// Number of sends in the random scenario.
    #[arg(long, default_value_t = 6)]
    sends: usize,

    /// Seed for the random scenario.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Deliver every outstanding copy after the scenario ends.
    #[arg(long)]
    flush: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON log output.
    #[arg(long)]
    json_logs: bool,

    /// Print the scenario as JSON and exit.
    #[arg(long)]
    print_scenario: bool,
}

fn init_tracing(level: &str, json_logs: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log filter")?;

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;
    }
    Ok(())
}

fn load_scenario(args: &CliArgs) -> Result<Scenario> {
    if let Some(path) = &args.file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {:?}", path))?;
        return Scenario::from_json(&raw)
            .with_context(|| format!("Failed to parse scenario {:?}", path));
    }
    Ok(match args.scenario {
        BuiltIn::FirstSecond => Scenario::first_second(),
        BuiltIn::ThreeSenders => Scenario::three_senders(),
        BuiltIn::Random => Scenario::random(args.processes, args.sends, args.seed),
    })
}

/// Returns false if the run broke causal order.
fn run<C: CausalClock>(name: &str, scenario: &Scenario, flush: bool) -> Result<bool> {
    println!("== {name}");
    let mut h = Harness::<C>::new(scenario.processes)
        .with_context(|| format!("Cannot build {} processes", scenario.processes))?;
    h.run(scenario).context("Scenario failed")?;
    if flush {
        let n = h.broadcast_all_pending()?;
        info!(algorithm = name, receives = n, "flushed pending copies");
    }

    for event in h.trace() {
        println!("  {event}");
    }
    for p in h.processes() {
        let delivered: Vec<&str> = p
            .delivered()
            .iter()
            .map(|id| h.label(*id).unwrap_or("?"))
            .collect();
        println!("  P{} clock {} delivered [{}]", p.pid(), p.clock(), delivered.join(", "));
    }
    for (pid, held) in h.stuck() {
        warn!(algorithm = name, pid, held = held.len(), "messages still buffered");
        let held: Vec<String> = held.iter().map(ToString::to_string).collect();
        println!("  P{pid} still holds [{}]", held.join(", "));
    }

    let violations = h.violations();
    for v in &violations {
        println!("  VIOLATION {v}");
    }
    Ok(violations.is_empty())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_level, args.json_logs)?;

    let scenario = load_scenario(&args)?;
    if args.print_scenario {
        println!("{}", serde_json::to_string_pretty(&scenario)?);
        return Ok(());
    }
    info!(
        processes = scenario.processes,
        steps = scenario.steps.len(),
        "scenario loaded"
    );

    let mut ok = true;
    if matches!(args.algorithm, Algorithm::Bss | Algorithm::All) {
        ok &= run::<VectorClock>("BSS", &scenario, args.flush)?;
    }
    if matches!(args.algorithm, Algorithm::Ses | Algorithm::All) {
        ok &= run::<DependencyClock>("SES", &scenario, args.flush)?;
    }
    if matches!(args.algorithm, Algorithm::Matrix | Algorithm::All) {
        ok &= run::<MatrixClock>("Matrix", &scenario, args.flush)?;
    }
    if !ok {
        bail!("causal order violated");
    }
    Ok(())
}
