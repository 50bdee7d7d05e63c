//! Observability module providing structured logging.
//!
//! Sweep outcomes reach the log through [`crate::sweep::TracingSink`]; this
//! module installs the subscriber that formats and filters them.

mod tracing_init;

pub use tracing_init::*;
