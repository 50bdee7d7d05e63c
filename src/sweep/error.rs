use thiserror::Error;

/// Failure raised by a processor for a single record.
///
/// The dispatcher never inspects the variant; it logs the text and moves on.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid record state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Failure raised by a collector while producing its collections.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// Collector-level failures. These are not contained by the dispatcher.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Unknown collector: {0}")]
    UnknownCollector(String),

    #[error("Unknown processor '{processor}' declared by collector {collector}")]
    UnknownProcessor { collector: String, processor: String },

    #[error("Collector {collector} failed: {source}")]
    Collect {
        collector: String,
        #[source]
        source: CollectError,
    },
}

pub type SweepResult<T> = Result<T, SweepError>;
