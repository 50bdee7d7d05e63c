use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use sweeper::{
    config::{self, CollectorConfig, SweeperConfig},
    jobs::{JobStatus, SweepJob, SweepJobState, start_sweep_worker},
    observability,
    store::{self, MemoryStore},
    sweep::TracingSink,
};

/// Config file looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "sweeper.toml";

/// CLI arguments for the sweeper
#[derive(Parser, Debug)]
#[command(version, about = "Sweeps stale versioned records", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./sweeper.toml if it exists)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to the JSON record store (overrides store.path)
    #[arg(short, long, global = true)]
    data: Option<String>,

    /// Log what would be processed without deleting anything
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Sweep every configured collector once (default)
    Run,
    /// Sweep one collector as a batch job
    Job {
        /// Collector to sweep
        #[arg(long)]
        collector: String,
        /// Job state file. Resumed from when it exists; the final state is written back.
        #[arg(long)]
        state: Option<String>,
        /// Records per step (defaults to sweep.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Sweep on the configured interval until interrupted
    Worker,
    /// List configured collectors
    Collectors,
    /// Initialize a new configuration file
    Init {
        /// Path to create the config file (defaults to ./sweeper.toml)
        #[arg(short, long)]
        output: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Init { output, force }) => {
            run_init(output, args.data, force);
        }
        command => {
            run(command, args.config.as_deref(), args.data, args.dry_run).await;
        }
    }
}

async fn run(command: Option<Command>, config: Option<&str>, data: Option<String>, dry_run: bool) {
    let mut config = load_config(config);
    if let Some(data) = data {
        config.store.path = Some(PathBuf::from(data));
    }
    if dry_run {
        config.sweep.dry_run = true;
    }

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    match command {
        Some(Command::Job {
            collector,
            state,
            batch_size,
        }) => {
            run_job(&config, &collector, state.as_deref(), batch_size).await;
        }
        Some(Command::Worker) => {
            run_worker(&config).await;
        }
        Some(Command::Collectors) => {
            run_collectors(&config);
        }
        Some(Command::Run) | Some(Command::Init { .. }) | None => {
            run_sweep(&config).await;
        }
    }
}

fn load_config(path: Option<&str>) -> SweeperConfig {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => return SweeperConfig::default(),
    };

    match SweeperConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn load_store(config: &SweeperConfig) -> Arc<MemoryStore> {
    let Some(path) = &config.store.path else {
        tracing::warn!("No store path configured; sweeping an empty in-memory store");
        return Arc::new(MemoryStore::new());
    };

    if !path.exists() {
        tracing::warn!(path = %path.display(), "Store file does not exist; starting empty");
        return Arc::new(MemoryStore::new());
    }

    match MemoryStore::load(path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load store");
            std::process::exit(1);
        }
    }
}

async fn save_store(config: &SweeperConfig, store: &MemoryStore) {
    if config.sweep.dry_run {
        return;
    }
    let Some(path) = &config.store.path else {
        return;
    };

    if let Err(e) = store.save(path).await {
        tracing::error!(error = %e, "Failed to save store");
        std::process::exit(1);
    }
    tracing::debug!(path = %path.display(), "Saved store");
}

/// Sweep every configured collector once.
async fn run_sweep(config: &SweeperConfig) {
    let store = load_store(config).await;
    let sweeper = store::build_sweeper(config, &store, Arc::new(TracingSink));

    if sweeper.enabled().is_empty() {
        tracing::warn!("No collectors enabled; set sweep.collectors in the config file");
        return;
    }

    if let Err(e) = sweeper.run_all().await {
        tracing::error!(error = %e, "Sweep failed");
        std::process::exit(1);
    }

    save_store(config, &store).await;
}

/// Drive one collector through a batch job, checkpointing to `state_path`.
async fn run_job(
    config: &SweeperConfig,
    collector: &str,
    state_path: Option<&str>,
    batch_size: Option<usize>,
) {
    let store = load_store(config).await;
    let collectors = store::collector_registry(config, &store);
    let processors = store::processor_registry(&store);

    let collector = match collectors.resolve(collector) {
        Ok(collector) => collector,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let saved = match state_path {
        Some(path) if Path::new(path).exists() => Some(read_job_state(path).await),
        _ => None,
    };

    // The store is only saved outside dry runs, so a resumed job follows the
    // current flag rather than the one it was checkpointed with.
    let job = match saved {
        Some(state) => SweepJob::resume(state, collector, processors),
        None => SweepJob::new(
            collector,
            processors,
            batch_size.unwrap_or(config.sweep.batch_size),
        ),
    }
    .map(|job| job.with_dry_run(config.sweep.dry_run));
    let mut job = match job {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("{} ({})", job.title(), job.id());

    if job.status() == JobStatus::Created
        && let Err(e) = job.setup().await
    {
        tracing::error!(error = %e, "Sweep job setup failed");
        std::process::exit(1);
    }

    let mut failed = false;
    while !job.is_complete() {
        if let Err(e) = job.process().await {
            tracing::error!(error = %e, "Sweep job step failed");
            failed = true;
            break;
        }
        println!(
            "Step {}/{}: {} records remaining",
            job.current_step(),
            job.total_steps(),
            job.remaining_records()
        );
    }

    for message in job.messages() {
        println!("{}", message);
    }

    if let Some(path) = state_path {
        write_job_state(path, job.state()).await;
    }
    save_store(config, &store).await;

    if failed {
        std::process::exit(1);
    }
}

async fn read_job_state(path: &str) -> SweepJobState {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Failed to read job state {}: {}", path, e);
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&contents) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Invalid job state {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

async fn write_job_state(path: &str, state: &SweepJobState) {
    let contents = match serde_json::to_string_pretty(state) {
        Ok(contents) => contents,
        Err(e) => {
            eprintln!("Failed to serialize job state: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = tokio::fs::write(path, contents).await {
        eprintln!("Failed to write job state {}: {}", path, e);
        std::process::exit(1);
    }
}

/// Sweep on an interval until Ctrl+C, then persist the store.
async fn run_worker(config: &SweeperConfig) {
    let store = load_store(config).await;
    let sweeper = Arc::new(store::build_sweeper(config, &store, Arc::new(TracingSink)));

    let mut sweep_config = config.sweep.clone();
    sweep_config.worker.enabled = true;

    tokio::select! {
        _ = start_sweep_worker(sweeper, sweep_config) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down sweep worker");
        }
    }

    save_store(config, &store).await;
}

/// Print every configured collector.
fn run_collectors(config: &SweeperConfig) {
    if config.collectors.is_empty() {
        println!("No collectors configured.");
        return;
    }

    for (name, collector) in config.collectors.iter() {
        let kind = match collector {
            CollectorConfig::Versioned(_) => "versioned",
            CollectorConfig::ChangeSet(_) => "change_set",
        };
        let enabled = if config.sweep.collectors.iter().any(|c| c == name) {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "{:<20} {:<12} {:<9} processors: {}",
            name,
            kind,
            enabled,
            collector.processors().join(", ")
        );
    }
}

/// Create a default configuration file, and an empty store when `--data` is given.
fn run_init(output: Option<String>, data: Option<String>, force: bool) {
    let output_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if output_path.exists() && !force {
        eprintln!(
            "Config file already exists: {}\nUse --force to overwrite.",
            output_path.display()
        );
        std::process::exit(1);
    }

    // Create parent directories if needed
    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create directory {}: {}", parent.display(), e);
        std::process::exit(1);
    }

    let store_path = data.unwrap_or_else(|| "store.json".to_string());
    let config_content = config::default_config_toml().replace(
        "path = \"store.json\"",
        &format!("path = {:?}", store_path),
    );

    if let Err(e) = std::fs::write(&output_path, config_content) {
        eprintln!("Failed to write config file: {}", e);
        std::process::exit(1);
    }

    if !Path::new(&store_path).exists() {
        let empty = match serde_json::to_string_pretty(&store::StoreData::default()) {
            Ok(empty) => empty,
            Err(e) => {
                eprintln!("Failed to serialize store: {}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(&store_path, empty) {
            eprintln!("Failed to write store file {}: {}", store_path, e);
            std::process::exit(1);
        }
        println!("Created store file: {}", store_path);
    }

    println!("Created config file: {}", output_path.display());
    println!();
    println!("To sweep once, run:");
    println!("  sweeper run --config {}", output_path.display());
}
