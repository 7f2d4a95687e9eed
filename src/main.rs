mod config;
mod event_log;
mod inputs;
mod monitor;
mod notify;
mod supervisor;
mod worker;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Supervises a fixed pool of workers, each streaming a generated input
/// file while watching its own resident memory; threshold and completion
/// events land in a shared append-only log.
#[derive(Parser, Debug)]
#[command(name = "memvisor", version, about)]
pub struct Cli {
    /// Input size in MB for each of the three workers (default: from config)
    #[arg(value_name = "SIZE_MB", num_args = 0..=3, value_parser = clap::value_parser!(u32).range(1..))]
    sizes: Vec<u32>,

    /// Config file path
    #[arg(short, long, default_value = "memvisor.toml")]
    config: PathBuf,

    /// Event log file (overrides config)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory for generated input files (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep the generated input files after the run
    #[arg(long)]
    keep_inputs: bool,

    /// Extra logging (input generation, worker streaming, threshold detail)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings, errors, and the final summary
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    tracing::info!("memvisor starting");
    tracing::debug!(?cli, "parsed CLI arguments");

    let mut cfg = match config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    if !cli.sizes.is_empty() {
        cfg.workers.sizes_mb = cli.sizes;
    }
    if let Some(path) = cli.log_file {
        cfg.log.file = path;
    }
    if let Some(dir) = cli.data_dir {
        cfg.inputs.dir = dir;
    }
    if let Err(e) = cfg.validate() {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    let specs = match inputs::prepare(&cfg.inputs.dir, &cfg.workers.sizes_mb, cfg.inputs.filler_byte)
    {
        Ok(specs) => specs,
        Err(e) => {
            tracing::error!(error = %e, "input generation failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        count = specs.len(),
        dir = %cfg.inputs.dir.display(),
        "input files ready"
    );

    let tuning = worker::WorkerTuning {
        chunk_bytes: cfg.workers.chunk_bytes,
        buffer_bytes: cfg.workers.buffer_bytes,
        threshold_kb: cfg.monitor.threshold_kb,
    };
    let log = event_log::EventLog::new(&cfg.log.file);

    let outcomes = supervisor::run_all(specs.clone(), tuning, log.clone()).await;

    // Failures surface in the final summary even under --quiet; a worker
    // with no completion record is the one that failed.
    for outcome in &outcomes {
        match outcome {
            supervisor::WorkerOutcome::Completed(_) => {}
            supervisor::WorkerOutcome::Failed { id, error } => {
                tracing::warn!(worker = *id, error = %error, "worker failed before completion")
            }
            supervisor::WorkerOutcome::Panicked { id, reason } => {
                tracing::warn!(worker = *id, reason = %reason, "worker panicked")
            }
        }
    }
    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    tracing::info!(
        completed,
        total = outcomes.len(),
        log = %log.path().display(),
        "all workers reaped"
    );

    if !cli.keep_inputs {
        inputs::cleanup(&specs);
    }

    // A worker's fatal local error lives in its own outcome; the run
    // itself succeeded once every unit was reaped.
    ExitCode::SUCCESS
}
