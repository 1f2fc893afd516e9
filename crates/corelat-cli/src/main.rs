//! corelat entry point.
//!
//! Wires the configuration layer, the pair sampler, and the output
//! renderers into a command-line measurement run.

mod output;
mod sysinfo;

use anyhow::{Context, Result};
use clap::Parser;
use corelat_common::{CorePair, FidelityClass, MeasureConfig};
use corelat_harness::{core_count, MatrixSampler, PairSampler, Timebase};
use corelat_probe::{get_thread_policy, max_importance, set_realtime_policy};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

/// corelat command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "corelat",
    about = "corelat - measure core-to-core latency with hardware counter timestamps",
    version,
    long_about = None
)]
struct Args {
    /// Path to a measurement configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// First core of the measured pair (overrides config, needs --core-b).
    #[arg(long, short = 'a', value_name = "CORE")]
    core_a: Option<usize>,

    /// Second core of the measured pair (overrides config, needs --core-a).
    #[arg(long, short = 'b', value_name = "CORE")]
    core_b: Option<usize>,

    /// Measure every ordered pair of distinct cores instead of one pair.
    #[arg(long, conflicts_with_all = ["core_a", "core_b"])]
    all_pairs: bool,

    /// Samples to collect (overrides config).
    #[arg(long)]
    samples: Option<usize>,

    /// Round trips folded into each sample (overrides config).
    #[arg(long)]
    round_trips: Option<usize>,

    /// Skip the real-time policy request.
    #[arg(long)]
    no_elevate: bool,

    /// Skip pinning threads to their cores.
    #[arg(long)]
    no_pin: bool,

    /// Probe the platform (counter, cores, policy) and exit.
    #[arg(long)]
    check: bool,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting corelat");

    if args.check {
        return run_check();
    }

    let config = apply_overrides(load_config(&args)?, &args)?;
    info!(
        pair = %config.pair,
        samples = config.samples,
        round_trips = config.round_trips,
        "Configuration loaded"
    );

    info!(
        processor = %sysinfo::processor_name(),
        cores = core_count(),
        "Host detected"
    );

    match config.pair {
        CorePair::All => run_matrix(config, args.json),
        _ => run_pair(config, args.json),
    }
}

/// Measure one core pair and render its report.
fn run_pair(config: MeasureConfig, json: bool) -> Result<()> {
    let sampler = PairSampler::new(config);
    let started = Instant::now();
    let report = sampler.run().context("Measurement failed")?;
    let elapsed = started.elapsed();

    if report.fidelity.class() != FidelityClass::Full {
        warn!(
            class = %report.fidelity.class(),
            "running below full fidelity; see the report header for what held"
        );
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        output::write_json(&mut out, &report)?;
    } else {
        output::write_text(&mut out, &report)?;
    }
    out.flush()?;

    info!(
        samples = report.samples.len(),
        wall_time = %humantime::format_duration(elapsed),
        "Measurement complete"
    );

    Ok(())
}

/// Sweep every ordered core pair and render the matrix report.
fn run_matrix(config: MeasureConfig, json: bool) -> Result<()> {
    let sweep = MatrixSampler::new(config);
    let started = Instant::now();
    let report = sweep.run().context("Matrix sweep failed")?;
    let elapsed = started.elapsed();

    if report
        .reports
        .iter()
        .any(|pair| pair.fidelity.class() != FidelityClass::Full)
    {
        warn!("some pairs ran below full fidelity; see the per-pair headers");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        output::write_matrix_json(&mut out, &report)?;
    } else {
        output::write_matrix_text(&mut out, &report)?;
    }
    out.flush()?;

    info!(
        pairs = report.reports.len(),
        wall_time = %humantime::format_duration(elapsed),
        "Matrix sweep complete"
    );

    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "corelat_cli={},corelat_harness={},corelat_probe={},corelat_common={}",
        level, level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `CORELAT_CONFIG_PATH` environment variable
/// 3. `/etc/corelat/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<MeasureConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return MeasureConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("CORELAT_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from CORELAT_CONFIG_PATH");
            return MeasureConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from CORELAT_CONFIG_PATH={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "CORELAT_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/corelat/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return MeasureConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {:?}", system_path));
    }

    // 4. Local development path
    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return MeasureConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(MeasureConfig::default())
}

/// Fold command-line overrides into the loaded configuration and check
/// the result still describes a measurable run.
fn apply_overrides(mut config: MeasureConfig, args: &Args) -> Result<MeasureConfig> {
    match (args.core_a, args.core_b) {
        (Some(a), Some(b)) => config.pair = CorePair::Pair(a, b),
        (None, None) => {}
        _ => anyhow::bail!("--core-a and --core-b must be given together"),
    }
    if args.all_pairs {
        config.pair = CorePair::All;
    }
    if let Some(samples) = args.samples {
        config.samples = samples;
    }
    if let Some(round_trips) = args.round_trips {
        config.round_trips = round_trips;
    }
    if args.no_elevate {
        config.elevate = false;
    }
    if args.no_pin {
        config.pin = false;
    }
    config.validate()?;
    Ok(config)
}

/// Probe the platform and print what a measurement would get.
fn run_check() -> Result<()> {
    let timebase = Timebase::detect();

    println!("processor:         {}", sysinfo::processor_name());
    println!("logical cores:     {}", core_count());
    println!(
        "hardware counter:  {}",
        if timebase.is_hardware() {
            "available"
        } else {
            "unavailable (nanosecond fallback)"
        }
    );
    println!("tick frequency:    {} Hz", timebase.frequency_hz());
    println!("tick period:       {:.3} ns", timebase.tick_period_ns());
    println!("tick resolution:   {} tick(s)", timebase.resolution_ticks());

    // Probe elevation on a scratch thread so the CLI thread itself stays
    // timeshared.
    let (set, state) = std::thread::Builder::new()
        .name("corelat-check".into())
        .spawn(|| (set_realtime_policy(), get_thread_policy()))?
        .join()
        .map_err(|_| anyhow::anyhow!("policy check thread panicked"))?;

    match set {
        Ok(()) => {
            println!("policy elevation:  ok (max importance {})", max_importance());
            if let Ok(state) = state {
                println!(
                    "observed state:    realtime={} importance={}",
                    state.is_realtime, state.importance
                );
            }
        }
        Err(e) => println!("policy elevation:  failed ({e})"),
    }

    Ok(())
}
