//! Sweeps stale versioned records out of a datastore.
//!
//! Collectors discover collections of obsolete records, the dispatcher routes
//! each record to the processor registered for its kind, and per-record
//! failures are logged without aborting the run. Sweeps run synchronously
//! through a [`sweep::Sweeper`], periodically through the sweep worker, or as
//! resumable batch jobs ([`jobs::SweepJob`]).

pub mod config;
pub mod jobs;
#[cfg(feature = "cli")]
pub mod observability;
pub mod store;
pub mod sweep;

#[cfg(test)]
mod tests;
