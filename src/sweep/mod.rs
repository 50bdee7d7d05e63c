//! Collector/processor sweep engine.
//!
//! - **Collectors** find stale records and group them into collection trees.
//! - **Processors** remove one record of a given kind and report the number
//!   of affected rows.
//! - The **Dispatcher** routes each leaf record to the processor registered
//!   for its kind, logging an outcome message per record.
//! - The **Sweeper** runs every configured collector through the dispatcher.
//!
//! Per-record failures are logged and never abort a run. Configuration
//! problems (unknown collectors or processors) and failing collectors are
//! returned as [`SweepError`].

mod dispatcher;
mod error;
mod message;
mod record;
mod registry;
mod service;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use dispatcher::Dispatcher;
pub use error::{CollectError, ProcessError, SweepError, SweepResult};
pub use message::{Message, MessageLevel, MessageLog, MessageSink, TracingSink};
pub use record::{Collection, CollectionNode, Leaves, Record, RecordKind, count_records, leaves};
pub use registry::{CollectorRegistry, ProcessorMap, ProcessorRegistry};
pub use service::Sweeper;
pub use traits::{Collector, Processor, ProcessorId};
