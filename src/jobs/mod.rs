//! Background and batch execution of sweeps.
//!
//! - **Sweep Job**: a resumable, checkpointable sweep of one collector,
//!   driven one step at a time by an external scheduler.
//! - **Sweep Worker**: runs every configured collector on a fixed interval.
//!
//! Jobs follow a consistent pattern:
//! 1. Configuration in `config/sweep.rs`
//! 2. Worker function that runs in a loop with configurable interval
//! 3. Run function that performs a single pass
//! 4. Serializable state for tracking progress
//!
//! # Example
//!
//! ```toml
//! [sweep]
//! collectors = ["versions"]
//! batch_size = 100
//!
//! [sweep.worker]
//! enabled = true
//! interval_secs = 3600
//! ```

mod sweep_job;
mod sweep_worker;

pub use sweep_job::{JobError, JobStatus, SweepJob, SweepJobState};
pub use sweep_worker::start_sweep_worker;
