//! Periodic sweep worker.
//!
//! Runs every configured collector on a fixed interval, the same way the
//! other background workers loop: one pass, log the outcome, sleep.

use std::{sync::Arc, time::Instant};

use crate::{config::SweepConfig, sweep::Sweeper};

/// Starts the sweep worker as a background task.
///
/// The worker runs in a loop, sweeping at the configured interval.
/// It will run indefinitely until the task is cancelled.
pub async fn start_sweep_worker(sweeper: Arc<Sweeper>, config: SweepConfig) {
    if !config.worker.enabled {
        tracing::info!("Sweep worker disabled by configuration");
        return;
    }

    if sweeper.enabled().is_empty() {
        tracing::info!("Sweep worker enabled but no collectors configured");
        return;
    }

    let dry_run_msg = if config.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        interval_secs = config.worker.interval_secs,
        collectors = ?sweeper.enabled(),
        dry_run = config.dry_run,
        "Starting sweep worker{}",
        dry_run_msg
    );

    let interval = config.worker.interval();

    loop {
        run_once(&sweeper).await;
        tokio::time::sleep(interval).await;
    }
}

/// A single sweep pass. Errors are logged, not returned, so the worker keeps going.
pub(crate) async fn run_once(sweeper: &Sweeper) -> bool {
    let start = Instant::now();

    match sweeper.run_all().await {
        Ok(()) => {
            tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Sweep run complete"
            );
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Error running sweep");
            false
        }
    }
}
