use async_trait::async_trait;

use super::{
    error::{CollectError, ProcessError},
    record::{Collection, Record, RecordKind},
};

/// Identifier a processor is registered under in the [`ProcessorRegistry`].
///
/// [`ProcessorRegistry`]: super::registry::ProcessorRegistry
pub type ProcessorId = String;

/// Discovers stale records and groups them into collections.
///
/// Collectors are stateless between runs. `collections` may be arbitrarily
/// expensive; it is called once per run (or once per job at setup).
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name used in log messages and job titles.
    fn name(&self) -> &str;

    /// Processors this collector accepts, in registration order.
    fn processors(&self) -> Vec<ProcessorId>;

    /// Produce the collections of candidate records for this run.
    async fn collections(&self) -> Result<Vec<Collection>, CollectError>;
}

/// Removes or archives a single record of one kind.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    /// The record kind this processor handles.
    fn implemented_kind(&self) -> RecordKind;

    /// Process one record, returning the number of affected rows.
    async fn process(&self, record: &Record) -> Result<u64, ProcessError>;
}
